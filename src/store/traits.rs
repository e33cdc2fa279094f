//! Unified `Database` trait — single async interface for all persistence.
//!
//! The core's contracts assume each call either fully succeeds or fully
//! fails; transient infrastructure retries belong below this trait, not in
//! the domain layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::attribution::Attribution;
use crate::conversations::model::{Conversation, Message, Sentiment};
use crate::error::DatabaseError;
use crate::pipeline::stage::Stage;
use crate::shows::model::Show;
use crate::shows::registry::StageCounts;
use crate::templates::model::EmailTemplate;

/// Backend-agnostic database trait covering shows, conversations, messages,
/// templates, and attribution.
#[async_trait]
pub trait Database: Send + Sync {
    // ── Shows ───────────────────────────────────────────────────────

    /// Insert a new show together with its (empty) conversation, atomically.
    async fn insert_show(
        &self,
        show: &Show,
        conversation: &Conversation,
    ) -> Result<(), DatabaseError>;

    /// Get a show by id.
    async fn get_show(&self, id: Uuid) -> Result<Option<Show>, DatabaseError>;

    /// List shows, optionally filtered by stage, newest first.
    async fn list_shows(&self, stage: Option<Stage>) -> Result<Vec<Show>, DatabaseError>;

    /// Count shows grouped by current stage, in a single pass.
    async fn stage_counts(&self) -> Result<StageCounts, DatabaseError>;

    /// Compare-and-swap the stage of a show: the write applies only if the
    /// stored stage still equals `expected`. Returns false when the guard
    /// failed (concurrent writer). Optionally bumps the follow-up counter in
    /// the same statement.
    async fn update_show_stage(
        &self,
        id: Uuid,
        expected: Stage,
        new: Stage,
        bump_followup: bool,
    ) -> Result<bool, DatabaseError>;

    // ── Conversations ───────────────────────────────────────────────

    /// Get a conversation by id.
    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, DatabaseError>;

    /// Get the conversation belonging to a show.
    async fn get_conversation_by_show(
        &self,
        show_id: Uuid,
    ) -> Result<Option<Conversation>, DatabaseError>;

    /// Append a message and update the conversation's derived fields
    /// (`last_message_at`, and `unread` for inbound) in one transaction.
    async fn append_message(&self, message: &Message) -> Result<(), DatabaseError>;

    /// Clear the unread flag. Returns false if the conversation is missing.
    async fn mark_read(&self, conversation_id: Uuid) -> Result<bool, DatabaseError>;

    /// Overwrite the derived sentiment. Returns false if the conversation is
    /// missing.
    async fn set_sentiment(
        &self,
        conversation_id: Uuid,
        sentiment: Sentiment,
    ) -> Result<bool, DatabaseError>;

    /// Full ordered message history for a conversation (append order).
    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, DatabaseError>;

    // ── Templates ───────────────────────────────────────────────────

    /// Insert a new template. Names are unique.
    async fn insert_template(&self, template: &EmailTemplate) -> Result<(), DatabaseError>;

    /// Get a template by id.
    async fn get_template(&self, id: Uuid) -> Result<Option<EmailTemplate>, DatabaseError>;

    /// List templates, optionally active ones only, newest first.
    async fn list_templates(&self, active_only: bool) -> Result<Vec<EmailTemplate>, DatabaseError>;

    /// Flip a template's active flag. Returns false if missing.
    async fn set_template_active(&self, id: Uuid, active: bool) -> Result<bool, DatabaseError>;

    // ── Attribution ─────────────────────────────────────────────────

    /// Insert a write-once attribution record. Returns false when the user
    /// already has one (the earlier record stands).
    async fn put_attribution(&self, record: &Attribution) -> Result<bool, DatabaseError>;

    /// Get the non-expired attribution for a user, if any.
    async fn get_attribution(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Attribution>, DatabaseError>;
}
