//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Multi-statement writes go
//! through a connection-level write lock so transactions never interleave on
//! the shared connection.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::attribution::Attribution;
use crate::conversations::model::{Conversation, Message, Sentiment};
use crate::error::DatabaseError;
use crate::pipeline::stage::Stage;
use crate::shows::model::{Platform, Show};
use crate::shows::registry::StageCounts;
use crate::store::migrations;
use crate::store::traits::Database;
use crate::templates::model::EmailTemplate;

/// libSQL database backend.
///
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use;
/// `write_lock` serializes only the multi-statement transactions.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    write_lock: tokio::sync::Mutex<()>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Open(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Open(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: tokio::sync::Mutex::new(()),
        };
        migrations::run_migrations(&backend.conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Open(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
            write_lock: tokio::sync::Mutex::new(()),
        };
        migrations::run_migrations(&backend.conn).await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn query_err(op: &str, e: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::Query(format!("{op}: {e}"))
}

/// Convert `Option<String>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert an optional integer to a libsql Value.
fn opt_int(v: Option<i64>) -> libsql::Value {
    match v {
        Some(v) => libsql::Value::Integer(v),
        None => libsql::Value::Null,
    }
}

const SHOW_COLUMNS: &str = "id, name, host_name, platform, contact_email, subscriber_count, \
                            view_count, guest_score, url, thumbnail_url, stage, followup_count, \
                            created_at, updated_at";

fn row_to_show(row: &libsql::Row) -> Result<Show, DatabaseError> {
    let id_str: String = row.get(0).map_err(|e| query_err("show id", e))?;
    let name: String = row.get(1).map_err(|e| query_err("show name", e))?;
    let host_name: Option<String> = row.get::<String>(2).ok();
    let platform_str: String = row.get(3).map_err(|e| query_err("show platform", e))?;
    let contact_email: Option<String> = row.get::<String>(4).ok();
    let subscriber_count = row.get::<i64>(5).ok().map(|v| v.max(0) as u64);
    let view_count = row.get::<i64>(6).ok().map(|v| v.max(0) as u64);
    let guest_score = row.get::<i64>(7).ok().map(|v| v.clamp(0, 100) as u8);
    let url: Option<String> = row.get::<String>(8).ok();
    let thumbnail_url: Option<String> = row.get::<String>(9).ok();
    let stage_str: String = row.get(10).map_err(|e| query_err("show stage", e))?;
    let followup_count: i64 = row.get(11).map_err(|e| query_err("show followup_count", e))?;
    let created_str: String = row.get(12).map_err(|e| query_err("show created_at", e))?;
    let updated_str: String = row.get(13).map_err(|e| query_err("show updated_at", e))?;

    Ok(Show {
        id: Uuid::parse_str(&id_str).map_err(|e| query_err("show id parse", e))?,
        name,
        host_name,
        platform: platform_str
            .parse::<Platform>()
            .map_err(|e| query_err("show platform parse", e))?,
        contact_email,
        subscriber_count,
        view_count,
        guest_score,
        url,
        thumbnail_url,
        stage: stage_str
            .parse::<Stage>()
            .map_err(|e| query_err("show stage parse", e))?,
        followup_count: followup_count.max(0) as u32,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

const CONVERSATION_COLUMNS: &str = "id, show_id, sentiment, unread, last_message_at, created_at";

fn row_to_conversation(row: &libsql::Row) -> Result<Conversation, DatabaseError> {
    let id_str: String = row.get(0).map_err(|e| query_err("conversation id", e))?;
    let show_id_str: String = row.get(1).map_err(|e| query_err("conversation show_id", e))?;
    let sentiment_str: Option<String> = row.get::<String>(2).ok();
    let unread: i64 = row.get(3).map_err(|e| query_err("conversation unread", e))?;
    let last_message_str: Option<String> = row.get::<String>(4).ok();
    let created_str: String = row.get(5).map_err(|e| query_err("conversation created_at", e))?;

    let sentiment = match sentiment_str {
        Some(s) => Some(
            s.parse::<Sentiment>()
                .map_err(|e| query_err("conversation sentiment parse", e))?,
        ),
        None => None,
    };

    Ok(Conversation {
        id: Uuid::parse_str(&id_str).map_err(|e| query_err("conversation id parse", e))?,
        show_id: Uuid::parse_str(&show_id_str)
            .map_err(|e| query_err("conversation show_id parse", e))?,
        sentiment,
        unread: unread != 0,
        last_message_at: last_message_str.as_deref().map(parse_datetime),
        created_at: parse_datetime(&created_str),
    })
}

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_name, sender_email, body, sent_at, is_you";

fn row_to_message(row: &libsql::Row) -> Result<Message, DatabaseError> {
    let id_str: String = row.get(0).map_err(|e| query_err("message id", e))?;
    let conversation_str: String = row
        .get(1)
        .map_err(|e| query_err("message conversation_id", e))?;
    let sender_name: String = row.get(2).map_err(|e| query_err("message sender_name", e))?;
    let sender_email: String = row.get(3).map_err(|e| query_err("message sender_email", e))?;
    let body: String = row.get(4).map_err(|e| query_err("message body", e))?;
    let sent_str: String = row.get(5).map_err(|e| query_err("message sent_at", e))?;
    let is_you: i64 = row.get(6).map_err(|e| query_err("message is_you", e))?;

    Ok(Message {
        id: Uuid::parse_str(&id_str).map_err(|e| query_err("message id parse", e))?,
        conversation_id: Uuid::parse_str(&conversation_str)
            .map_err(|e| query_err("message conversation_id parse", e))?,
        sender_name,
        sender_email,
        body,
        sent_at: parse_datetime(&sent_str),
        is_you: is_you != 0,
    })
}

const TEMPLATE_COLUMNS: &str = "id, name, subject, body, active, created_at, updated_at";

fn row_to_template(row: &libsql::Row) -> Result<EmailTemplate, DatabaseError> {
    let id_str: String = row.get(0).map_err(|e| query_err("template id", e))?;
    let name: String = row.get(1).map_err(|e| query_err("template name", e))?;
    let subject: Option<String> = row.get::<String>(2).ok();
    let body: String = row.get(3).map_err(|e| query_err("template body", e))?;
    let active: i64 = row.get(4).map_err(|e| query_err("template active", e))?;
    let created_str: String = row.get(5).map_err(|e| query_err("template created_at", e))?;
    let updated_str: String = row.get(6).map_err(|e| query_err("template updated_at", e))?;

    Ok(EmailTemplate {
        id: Uuid::parse_str(&id_str).map_err(|e| query_err("template id parse", e))?,
        name,
        subject,
        body,
        active: active != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_attribution(row: &libsql::Row) -> Result<Attribution, DatabaseError> {
    let user_id: String = row.get(0).map_err(|e| query_err("attribution user_id", e))?;
    let referral_id: String = row
        .get(1)
        .map_err(|e| query_err("attribution referral_id", e))?;
    let recorded_str: String = row
        .get(2)
        .map_err(|e| query_err("attribution recorded_at", e))?;
    let expires_str: String = row
        .get(3)
        .map_err(|e| query_err("attribution expires_at", e))?;

    Ok(Attribution {
        user_id,
        referral_id,
        recorded_at: parse_datetime(&recorded_str),
        expires_at: parse_datetime(&expires_str),
    })
}

// ── Database impl ───────────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn insert_show(
        &self,
        show: &Show,
        conversation: &Conversation,
    ) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| query_err("insert_show begin", e))?;

        tx.execute(
            "INSERT INTO shows (id, name, host_name, platform, contact_email, subscriber_count, \
             view_count, guest_score, url, thumbnail_url, stage, followup_count, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                show.id.to_string(),
                show.name.clone(),
                opt_text(show.host_name.as_deref()),
                show.platform.as_str(),
                opt_text(show.contact_email.as_deref()),
                opt_int(show.subscriber_count.map(|v| v as i64)),
                opt_int(show.view_count.map(|v| v as i64)),
                opt_int(show.guest_score.map(i64::from)),
                opt_text(show.url.as_deref()),
                opt_text(show.thumbnail_url.as_deref()),
                show.stage.as_str(),
                show.followup_count as i64,
                show.created_at.to_rfc3339(),
                show.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| query_err("insert_show", e))?;

        tx.execute(
            "INSERT INTO conversations (id, show_id, sentiment, unread, last_message_at, created_at) \
             VALUES (?1, ?2, NULL, 0, NULL, ?3)",
            params![
                conversation.id.to_string(),
                conversation.show_id.to_string(),
                conversation.created_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| query_err("insert_show conversation", e))?;

        tx.commit()
            .await
            .map_err(|e| query_err("insert_show commit", e))?;

        debug!(show_id = %show.id, "Show inserted with conversation");
        Ok(())
    }

    async fn get_show(&self, id: Uuid) -> Result<Option<Show>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {SHOW_COLUMNS} FROM shows WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| query_err("get_show", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_show(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(query_err("get_show", e)),
        }
    }

    async fn list_shows(&self, stage: Option<Stage>) -> Result<Vec<Show>, DatabaseError> {
        let mut rows = match stage {
            Some(stage) => self
                .conn()
                .query(
                    &format!(
                        "SELECT {SHOW_COLUMNS} FROM shows WHERE stage = ?1 ORDER BY created_at DESC"
                    ),
                    params![stage.as_str()],
                )
                .await
                .map_err(|e| query_err("list_shows", e))?,
            None => self
                .conn()
                .query(
                    &format!("SELECT {SHOW_COLUMNS} FROM shows ORDER BY created_at DESC"),
                    (),
                )
                .await
                .map_err(|e| query_err("list_shows", e))?,
        };

        let mut shows = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            shows.push(row_to_show(&row)?);
        }
        Ok(shows)
    }

    async fn stage_counts(&self) -> Result<StageCounts, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT stage, COUNT(*) FROM shows GROUP BY stage", ())
            .await
            .map_err(|e| query_err("stage_counts", e))?;

        let mut counts = StageCounts::default();
        while let Ok(Some(row)) = rows.next().await {
            let stage_str: String = row.get(0).map_err(|e| query_err("stage_counts stage", e))?;
            let count: i64 = row.get(1).map_err(|e| query_err("stage_counts count", e))?;
            let stage = stage_str
                .parse::<Stage>()
                .map_err(|e| query_err("stage_counts parse", e))?;
            counts.set(stage, count.max(0) as u64);
        }
        Ok(counts)
    }

    async fn update_show_stage(
        &self,
        id: Uuid,
        expected: Stage,
        new: Stage,
        bump_followup: bool,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE shows SET stage = ?1, \
                 followup_count = followup_count + ?2, \
                 updated_at = ?3 \
                 WHERE id = ?4 AND stage = ?5",
                params![
                    new.as_str(),
                    if bump_followup { 1i64 } else { 0i64 },
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                    expected.as_str(),
                ],
            )
            .await
            .map_err(|e| query_err("update_show_stage", e))?;

        Ok(affected > 0)
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| query_err("get_conversation", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_conversation(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(query_err("get_conversation", e)),
        }
    }

    async fn get_conversation_by_show(
        &self,
        show_id: Uuid,
    ) -> Result<Option<Conversation>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE show_id = ?1"),
                params![show_id.to_string()],
            )
            .await
            .map_err(|e| query_err("get_conversation_by_show", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_conversation(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(query_err("get_conversation_by_show", e)),
        }
    }

    async fn append_message(&self, message: &Message) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let tx = self
            .conn
            .transaction()
            .await
            .map_err(|e| query_err("append_message begin", e))?;

        tx.execute(
            "INSERT INTO messages (id, conversation_id, sender_name, sender_email, body, sent_at, is_you) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.to_string(),
                message.conversation_id.to_string(),
                message.sender_name.clone(),
                message.sender_email.clone(),
                message.body.clone(),
                message.sent_at.to_rfc3339(),
                if message.is_you { 1i64 } else { 0i64 },
            ],
        )
        .await
        .map_err(|e| query_err("append_message", e))?;

        // Inbound messages flip unread on; outbound sends leave it untouched.
        tx.execute(
            "UPDATE conversations SET last_message_at = ?1, \
             unread = CASE WHEN ?2 = 1 THEN 1 ELSE unread END \
             WHERE id = ?3",
            params![
                message.sent_at.to_rfc3339(),
                if message.is_you { 0i64 } else { 1i64 },
                message.conversation_id.to_string(),
            ],
        )
        .await
        .map_err(|e| query_err("append_message conversation update", e))?;

        tx.commit()
            .await
            .map_err(|e| query_err("append_message commit", e))?;

        debug!(
            message_id = %message.id,
            conversation_id = %message.conversation_id,
            is_you = message.is_you,
            "Message appended"
        );
        Ok(())
    }

    async fn mark_read(&self, conversation_id: Uuid) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE conversations SET unread = 0 WHERE id = ?1",
                params![conversation_id.to_string()],
            )
            .await
            .map_err(|e| query_err("mark_read", e))?;
        Ok(affected > 0)
    }

    async fn set_sentiment(
        &self,
        conversation_id: Uuid,
        sentiment: Sentiment,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE conversations SET sentiment = ?1 WHERE id = ?2",
                params![sentiment.as_str(), conversation_id.to_string()],
            )
            .await
            .map_err(|e| query_err("set_sentiment", e))?;
        Ok(affected > 0)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, DatabaseError> {
        // Messages are append-only and never deleted, so rowid order is
        // insertion order.
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages \
                     WHERE conversation_id = ?1 ORDER BY rowid ASC"
                ),
                params![conversation_id.to_string()],
            )
            .await
            .map_err(|e| query_err("list_messages", e))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }

    async fn insert_template(&self, template: &EmailTemplate) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO templates (id, name, subject, body, active, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    template.id.to_string(),
                    template.name.clone(),
                    opt_text(template.subject.as_deref()),
                    template.body.clone(),
                    if template.active { 1i64 } else { 0i64 },
                    template.created_at.to_rfc3339(),
                    template.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| {
                let text = e.to_string();
                if text.contains("UNIQUE") {
                    DatabaseError::Constraint(format!(
                        "template name '{}' already exists",
                        template.name
                    ))
                } else {
                    query_err("insert_template", text)
                }
            })?;

        debug!(template_id = %template.id, name = %template.name, "Template inserted");
        Ok(())
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<EmailTemplate>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| query_err("get_template", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_template(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(query_err("get_template", e)),
        }
    }

    async fn list_templates(&self, active_only: bool) -> Result<Vec<EmailTemplate>, DatabaseError> {
        let sql = if active_only {
            format!(
                "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE active = 1 ORDER BY created_at DESC"
            )
        } else {
            format!("SELECT {TEMPLATE_COLUMNS} FROM templates ORDER BY created_at DESC")
        };

        let mut rows = self
            .conn()
            .query(&sql, ())
            .await
            .map_err(|e| query_err("list_templates", e))?;

        let mut templates = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            templates.push(row_to_template(&row)?);
        }
        Ok(templates)
    }

    async fn set_template_active(&self, id: Uuid, active: bool) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "UPDATE templates SET active = ?1, updated_at = ?2 WHERE id = ?3",
                params![
                    if active { 1i64 } else { 0i64 },
                    Utc::now().to_rfc3339(),
                    id.to_string(),
                ],
            )
            .await
            .map_err(|e| query_err("set_template_active", e))?;
        Ok(affected > 0)
    }

    async fn put_attribution(&self, record: &Attribution) -> Result<bool, DatabaseError> {
        let affected = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO attributions (user_id, referral_id, recorded_at, expires_at) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.user_id.clone(),
                    record.referral_id.clone(),
                    record.recorded_at.to_rfc3339(),
                    record.expires_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| query_err("put_attribution", e))?;
        Ok(affected > 0)
    }

    async fn get_attribution(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Attribution>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT user_id, referral_id, recorded_at, expires_at \
                 FROM attributions WHERE user_id = ?1 AND expires_at > ?2",
                params![user_id, now.to_rfc3339()],
            )
            .await
            .map_err(|e| query_err("get_attribution", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_attribution(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(query_err("get_attribution", e)),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::model::NewMessage;
    use crate::shows::model::NewShow;

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn sample_show() -> (Show, Conversation) {
        let show = Show::from_new(NewShow {
            name: "The Pod".into(),
            host_name: Some("Sarah".into()),
            platform: Platform::Podcast,
            contact_email: Some("sarah@thepod.fm".into()),
            subscriber_count: Some(12_000),
            view_count: None,
            guest_score: Some(87),
            url: None,
            thumbnail_url: None,
        })
        .unwrap();
        let conversation = Conversation::new(show.id);
        (show, conversation)
    }

    #[tokio::test]
    async fn open_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("nested").join("dir").join("test.db");
        let db = LibSqlBackend::new_local(&db_path).await.unwrap();
        assert!(db_path.exists());
        drop(db);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let db = backend().await;
        migrations::run_migrations(&db.conn).await.unwrap();
    }

    #[tokio::test]
    async fn insert_and_get_show_roundtrip() {
        let db = backend().await;
        let (show, conversation) = sample_show();
        db.insert_show(&show, &conversation).await.unwrap();

        let loaded = db.get_show(show.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "The Pod");
        assert_eq!(loaded.platform, Platform::Podcast);
        assert_eq!(loaded.subscriber_count, Some(12_000));
        assert_eq!(loaded.guest_score, Some(87));
        assert_eq!(loaded.stage, Stage::Discovered);

        let conv = db.get_conversation_by_show(show.id).await.unwrap().unwrap();
        assert_eq!(conv.id, conversation.id);
        assert!(conv.sentiment.is_none());
        assert!(!conv.unread);
    }

    #[tokio::test]
    async fn stage_cas_guards_against_stale_writes() {
        let db = backend().await;
        let (show, conversation) = sample_show();
        db.insert_show(&show, &conversation).await.unwrap();

        let swapped = db
            .update_show_stage(show.id, Stage::Discovered, Stage::Qualified, false)
            .await
            .unwrap();
        assert!(swapped);

        // Stale expectation fails and leaves the stage unchanged.
        let swapped = db
            .update_show_stage(show.id, Stage::Discovered, Stage::Pitched, false)
            .await
            .unwrap();
        assert!(!swapped);
        let loaded = db.get_show(show.id).await.unwrap().unwrap();
        assert_eq!(loaded.stage, Stage::Qualified);
    }

    #[tokio::test]
    async fn followup_bump_is_part_of_the_swap() {
        let db = backend().await;
        let (show, conversation) = sample_show();
        db.insert_show(&show, &conversation).await.unwrap();

        db.update_show_stage(show.id, Stage::Discovered, Stage::Qualified, false)
            .await
            .unwrap();
        db.update_show_stage(show.id, Stage::Qualified, Stage::Pitched, false)
            .await
            .unwrap();
        db.update_show_stage(show.id, Stage::Pitched, Stage::Followup, true)
            .await
            .unwrap();

        let loaded = db.get_show(show.id).await.unwrap().unwrap();
        assert_eq!(loaded.followup_count, 1);
    }

    #[tokio::test]
    async fn message_order_is_append_order() {
        let db = backend().await;
        let (show, conversation) = sample_show();
        db.insert_show(&show, &conversation).await.unwrap();

        for i in 0..5 {
            let msg = NewMessage {
                sender_name: "Alex".into(),
                sender_email: "alex@acme.dev".into(),
                body: format!("message {i}"),
                is_you: true,
            }
            .into_message(conversation.id)
            .unwrap();
            db.append_message(&msg).await.unwrap();
        }

        let thread = db.list_messages(conversation.id).await.unwrap();
        assert_eq!(thread.len(), 5);
        for (i, msg) in thread.iter().enumerate() {
            assert_eq!(msg.body, format!("message {i}"));
        }
    }

    #[tokio::test]
    async fn inbound_sets_unread_outbound_does_not() {
        let db = backend().await;
        let (show, conversation) = sample_show();
        db.insert_show(&show, &conversation).await.unwrap();

        let outbound = NewMessage {
            sender_name: "Alex".into(),
            sender_email: "alex@acme.dev".into(),
            body: "pitch".into(),
            is_you: true,
        }
        .into_message(conversation.id)
        .unwrap();
        db.append_message(&outbound).await.unwrap();
        let conv = db.get_conversation(conversation.id).await.unwrap().unwrap();
        assert!(!conv.unread);
        assert_eq!(conv.last_message_at, Some(outbound.sent_at));

        let inbound = NewMessage {
            sender_name: "Sarah".into(),
            sender_email: "sarah@thepod.fm".into(),
            body: "sounds great".into(),
            is_you: false,
        }
        .into_message(conversation.id)
        .unwrap();
        db.append_message(&inbound).await.unwrap();
        let conv = db.get_conversation(conversation.id).await.unwrap().unwrap();
        assert!(conv.unread);

        assert!(db.mark_read(conversation.id).await.unwrap());
        let conv = db.get_conversation(conversation.id).await.unwrap().unwrap();
        assert!(!conv.unread);
    }

    #[tokio::test]
    async fn template_names_are_unique() {
        let db = backend().await;
        let template = EmailTemplate::from_new(crate::templates::model::NewTemplate {
            name: "cold pitch".into(),
            subject: None,
            body: "Hi {{host_name}}".into(),
            active: true,
        })
        .unwrap();
        db.insert_template(&template).await.unwrap();

        let duplicate = EmailTemplate::from_new(crate::templates::model::NewTemplate {
            name: "cold pitch".into(),
            subject: None,
            body: "Hello again".into(),
            active: true,
        })
        .unwrap();
        let err = db.insert_template(&duplicate).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));
    }

    #[tokio::test]
    async fn attribution_is_write_once_and_expiring() {
        let db = backend().await;
        let now = Utc::now();
        let record = Attribution {
            user_id: "user-1".into(),
            referral_id: "ref-a".into(),
            recorded_at: now,
            expires_at: now + chrono::Duration::days(30),
        };
        assert!(db.put_attribution(&record).await.unwrap());
        assert!(!db.put_attribution(&record).await.unwrap());

        let found = db.get_attribution("user-1", now).await.unwrap();
        assert_eq!(found.unwrap().referral_id, "ref-a");

        // Reads past expiry see nothing.
        let later = now + chrono::Duration::days(31);
        assert!(db.get_attribution("user-1", later).await.unwrap().is_none());
    }
}
