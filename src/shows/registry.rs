//! Show registry — canonical prospect records and the dashboard aggregate.
//!
//! The registry never mutates a show's stage itself; stage changes go through
//! the pipeline controller exclusively.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::conversations::model::Conversation;
use crate::error::{DatabaseError, Result};
use crate::pipeline::stage::Stage;
use crate::shows::model::{NewShow, Show};
use crate::store::traits::Database;

/// Per-stage show counts — the data source for the pipeline dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub discovered: u64,
    pub qualified: u64,
    pub pitched: u64,
    pub followup: u64,
    pub responded: u64,
    pub booked: u64,
}

impl StageCounts {
    pub fn get(&self, stage: Stage) -> u64 {
        match stage {
            Stage::Discovered => self.discovered,
            Stage::Qualified => self.qualified,
            Stage::Pitched => self.pitched,
            Stage::Followup => self.followup,
            Stage::Responded => self.responded,
            Stage::Booked => self.booked,
        }
    }

    pub fn set(&mut self, stage: Stage, count: u64) {
        match stage {
            Stage::Discovered => self.discovered = count,
            Stage::Qualified => self.qualified = count,
            Stage::Pitched => self.pitched = count,
            Stage::Followup => self.followup = count,
            Stage::Responded => self.responded = count,
            Stage::Booked => self.booked = count,
        }
    }

    /// Sum across all stages — always equals the total show count.
    pub fn total(&self) -> u64 {
        Stage::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

/// Registry of prospect shows.
pub struct ShowRegistry {
    db: Arc<dyn Database>,
}

impl ShowRegistry {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Register a newly discovered show. Creates the show in `discovered`
    /// together with its empty conversation, atomically.
    pub async fn create(&self, new: NewShow) -> Result<Show> {
        let show = Show::from_new(new)?;
        let conversation = Conversation::new(show.id);
        self.db.insert_show(&show, &conversation).await?;
        info!(show_id = %show.id, name = %show.name, platform = %show.platform, "Show discovered");
        Ok(show)
    }

    /// Fetch a show by id.
    pub async fn get(&self, id: Uuid) -> Result<Show> {
        self.db
            .get_show(id)
            .await?
            .ok_or_else(|| {
                DatabaseError::NotFound {
                    entity: "show",
                    id: id.to_string(),
                }
                .into()
            })
    }

    /// List shows, optionally filtered by stage, newest first.
    pub async fn list(&self, stage: Option<Stage>) -> Result<Vec<Show>> {
        Ok(self.db.list_shows(stage).await?)
    }

    /// Per-stage counts, computed in a single pass over all shows.
    pub async fn stage_counts(&self) -> Result<StageCounts> {
        Ok(self.db.stage_counts().await?)
    }
}
