//! Pipeline controller — the only writer of a show's stage.
//!
//! A transition is a compare-and-swap: read the current stage under the
//! per-show lock, validate against the transition table, write the new stage
//! guarded by the expected one. Rejections are surfaced, never swallowed —
//! the stage-count dashboard depends on it.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::conversations::model::Sentiment;
use crate::error::{DatabaseError, Error, PipelineError, Result};
use crate::pipeline::stage::{PipelineEvent, Stage};
use crate::store::traits::Database;
use crate::sync::KeyedLocks;

pub struct PipelineController {
    db: Arc<dyn Database>,
    locks: KeyedLocks,
    max_followups: u32,
}

impl PipelineController {
    pub fn new(db: Arc<dyn Database>, max_followups: u32) -> Self {
        Self {
            db,
            locks: KeyedLocks::new(),
            max_followups,
        }
    }

    /// Apply a pipeline event to a show. Returns the new stage.
    pub async fn apply(&self, show_id: Uuid, event: PipelineEvent) -> Result<Stage> {
        let lock = self.locks.lock_for(show_id);
        let _guard = lock.lock().await;

        let show = self.db.get_show(show_id).await?.ok_or(Error::Database(
            DatabaseError::NotFound {
                entity: "show",
                id: show_id.to_string(),
            },
        ))?;

        // Transition legality first; the follow-up limit only applies to
        // events the table would otherwise allow.
        let next = show.stage.next(event).ok_or_else(|| {
            warn!(
                show_id = %show_id,
                stage = %show.stage,
                event = event.label(),
                "Rejected pipeline transition"
            );
            PipelineError::InvalidTransition {
                stage: show.stage,
                event: event.label(),
            }
        })?;

        if event == PipelineEvent::SendFollowup && show.followup_count >= self.max_followups {
            warn!(
                show_id = %show_id,
                followup_count = show.followup_count,
                max = self.max_followups,
                "Follow-up limit reached"
            );
            return Err(PipelineError::FollowupLimitReached {
                show_id,
                max: self.max_followups,
            }
            .into());
        }

        let bump_followup = event == PipelineEvent::SendFollowup;
        let swapped = self
            .db
            .update_show_stage(show_id, show.stage, next, bump_followup)
            .await?;
        if !swapped {
            // The per-show lock makes this unreachable for in-process callers;
            // it guards against an out-of-band writer on the same database.
            return Err(PipelineError::StageConflict { show_id }.into());
        }

        info!(
            show_id = %show_id,
            from = %show.stage,
            to = %next,
            event = event.label(),
            "Stage transition"
        );
        Ok(next)
    }

    /// `qualify`: discovered → qualified.
    pub async fn qualify(&self, show_id: Uuid) -> Result<Stage> {
        self.apply(show_id, PipelineEvent::Qualify).await
    }

    /// `send_outreach`: qualified | followup → pitched.
    pub async fn send_outreach(&self, show_id: Uuid) -> Result<Stage> {
        self.apply(show_id, PipelineEvent::SendOutreach).await
    }

    /// `send_followup`: pitched → followup, bounded by the follow-up limit.
    pub async fn send_followup(&self, show_id: Uuid) -> Result<Stage> {
        self.apply(show_id, PipelineEvent::SendFollowup).await
    }

    /// `receive_reply`: pitched | followup → responded.
    pub async fn receive_reply(&self, show_id: Uuid, sentiment: Sentiment) -> Result<Stage> {
        self.apply(show_id, PipelineEvent::ReceiveReply(sentiment))
            .await
    }

    /// `confirm_booking`: responded → booked.
    pub async fn confirm_booking(&self, show_id: Uuid) -> Result<Stage> {
        self.apply(show_id, PipelineEvent::ConfirmBooking).await
    }
}
