//! Per-entity serialization — keyed async locks.
//!
//! Stage transitions and message appends for one Show/Conversation must be
//! serialized (single-writer-per-entity discipline). Independent entities
//! proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

/// A map of per-id async locks.
///
/// Callers acquire the lock for an id, hold it across their read-validate-write
/// sequence, and drop it when done. Lock entries are created lazily and kept
/// for the process lifetime — the entity population is small (prospect lists,
/// not event firehoses).
#[derive(Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock for the given id.
    pub fn lock_for(&self, id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        Arc::clone(locks.entry(id).or_default())
    }
}
