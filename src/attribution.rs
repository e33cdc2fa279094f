//! Referral attribution — write-once, time-boxed records.
//!
//! First touch wins: the first referral recorded for a user sticks until it
//! expires; later writes are ignored. Read at conversion time. This replaces
//! cookie-held attribution with a server-side record keyed by user id.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DatabaseError, Result, ValidationError};
use crate::store::traits::Database;

/// One attribution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribution {
    pub user_id: String,
    pub referral_id: String,
    pub recorded_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Attribution ledger over the shared database.
pub struct AttributionLedger {
    db: Arc<dyn Database>,
    ttl_days: i64,
}

impl AttributionLedger {
    pub fn new(db: Arc<dyn Database>, ttl_days: i64) -> Self {
        Self { db, ttl_days }
    }

    /// Record a first-touch attribution. Returns the record that is now in
    /// effect — the new one, or the earlier one if the user was already
    /// attributed (write-once).
    pub async fn record(&self, user_id: &str, referral_id: &str) -> Result<Attribution> {
        if user_id.trim().is_empty() {
            return Err(ValidationError::Empty { field: "user_id" }.into());
        }
        if referral_id.trim().is_empty() {
            return Err(ValidationError::Empty { field: "referral_id" }.into());
        }

        let now = Utc::now();
        let record = Attribution {
            user_id: user_id.to_string(),
            referral_id: referral_id.to_string(),
            recorded_at: now,
            expires_at: now + Duration::days(self.ttl_days),
        };

        let inserted = self.db.put_attribution(&record).await?;
        if inserted {
            debug!(user_id, referral_id, "Attribution recorded");
            return Ok(record);
        }

        // Already attributed — first touch stands, even when it has expired.
        // Read back with the expiry filter disabled so the caller sees the
        // stored record, not a value that was never persisted.
        debug!(user_id, referral_id, "Attribution ignored (already attributed)");
        match self
            .db
            .get_attribution(user_id, DateTime::<Utc>::MIN_UTC)
            .await?
        {
            Some(existing) => Ok(existing),
            None => Err(DatabaseError::NotFound {
                entity: "attribution",
                id: user_id.to_string(),
            }
            .into()),
        }
    }

    /// Look up the attribution in effect for a user, if any and not expired.
    pub async fn lookup(&self, user_id: &str) -> Result<Option<Attribution>> {
        Ok(self.db.get_attribution(user_id, Utc::now()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::libsql_backend::LibSqlBackend;

    async fn ledger() -> AttributionLedger {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        AttributionLedger::new(db, 30)
    }

    #[tokio::test]
    async fn first_touch_wins() {
        let ledger = ledger().await;
        let first = ledger.record("user-1", "ref-a").await.unwrap();
        assert_eq!(first.referral_id, "ref-a");

        let second = ledger.record("user-1", "ref-b").await.unwrap();
        assert_eq!(second.referral_id, "ref-a");

        let effective = ledger.lookup("user-1").await.unwrap().unwrap();
        assert_eq!(effective.referral_id, "ref-a");
    }

    #[tokio::test]
    async fn missing_user_has_no_attribution() {
        let ledger = ledger().await;
        assert!(ledger.lookup("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blank_ids_rejected() {
        let ledger = ledger().await;
        assert!(ledger.record("", "ref-a").await.is_err());
        assert!(ledger.record("user-1", "  ").await.is_err());
    }

    #[tokio::test]
    async fn expired_slot_still_reports_first_touch() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        // Zero TTL: the record expires the moment it is written.
        let ledger = AttributionLedger::new(db, 0);

        let first = ledger.record("user-1", "ref-a").await.unwrap();
        assert_eq!(first.referral_id, "ref-a");

        // The slot is occupied by the expired record; a repeat write neither
        // replaces it nor pretends the new referral took effect.
        let second = ledger.record("user-1", "ref-b").await.unwrap();
        assert_eq!(second.referral_id, "ref-a");

        // Nothing is in effect at lookup time.
        assert!(ledger.lookup("user-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn users_are_independent() {
        let ledger = ledger().await;
        ledger.record("user-1", "ref-a").await.unwrap();
        ledger.record("user-2", "ref-b").await.unwrap();
        assert_eq!(
            ledger.lookup("user-2").await.unwrap().unwrap().referral_id,
            "ref-b"
        );
    }
}
