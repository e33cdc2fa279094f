//! Conversation store — ordered message history plus derived state.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::conversations::model::{Conversation, Message, NewMessage, Sentiment};
use crate::error::{DatabaseError, Result};
use crate::store::traits::Database;
use crate::sync::KeyedLocks;

/// Owns the message thread for each show and its derived fields
/// (`unread`, `sentiment`, `last_message_at`).
pub struct ConversationStore {
    db: Arc<dyn Database>,
    locks: KeyedLocks,
}

impl ConversationStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            db,
            locks: KeyedLocks::new(),
        }
    }

    fn not_found(id: Uuid) -> crate::error::Error {
        DatabaseError::NotFound {
            entity: "conversation",
            id: id.to_string(),
        }
        .into()
    }

    /// Fetch a conversation by id.
    pub async fn get(&self, id: Uuid) -> Result<Conversation> {
        self.db
            .get_conversation(id)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    /// Fetch the conversation belonging to a show.
    pub async fn get_by_show(&self, show_id: Uuid) -> Result<Conversation> {
        self.db
            .get_conversation_by_show(show_id)
            .await?
            .ok_or_else(|| {
                DatabaseError::NotFound {
                    entity: "conversation for show",
                    id: show_id.to_string(),
                }
                .into()
            })
    }

    /// Append a message to the thread. Inbound messages (`is_you == false`)
    /// set the unread flag; outbound messages leave it untouched.
    /// Appends for one conversation are serialized.
    pub async fn append_message(
        &self,
        conversation_id: Uuid,
        new: NewMessage,
    ) -> Result<Message> {
        new.validate()?;

        let lock = self.locks.lock_for(conversation_id);
        let _guard = lock.lock().await;

        // Existence check inside the lock so a miss is reported before any write.
        if self.db.get_conversation(conversation_id).await?.is_none() {
            return Err(Self::not_found(conversation_id));
        }

        let message = new.into_message(conversation_id)?;
        self.db.append_message(&message).await?;
        Ok(message)
    }

    /// Clear the unread flag. Idempotent.
    pub async fn mark_read(&self, conversation_id: Uuid) -> Result<()> {
        if !self.db.mark_read(conversation_id).await? {
            return Err(Self::not_found(conversation_id));
        }
        debug!(conversation_id = %conversation_id, "Conversation marked read");
        Ok(())
    }

    /// Overwrite the derived sentiment. Only called in response to an inbound
    /// message — outbound sends never classify.
    pub async fn set_sentiment(&self, conversation_id: Uuid, sentiment: Sentiment) -> Result<()> {
        if !self.db.set_sentiment(conversation_id, sentiment).await? {
            return Err(Self::not_found(conversation_id));
        }
        debug!(conversation_id = %conversation_id, sentiment = %sentiment, "Sentiment set");
        Ok(())
    }

    /// Full message history in append order. Finite and restartable — callers
    /// may re-iterate or layer pagination on top.
    pub async fn thread(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        if self.db.get_conversation(conversation_id).await?.is_none() {
            return Err(Self::not_found(conversation_id));
        }
        Ok(self.db.list_messages(conversation_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversations::model::Conversation;
    use crate::error::Error;
    use crate::shows::model::{NewShow, Platform, Show};
    use crate::store::libsql_backend::LibSqlBackend;

    async fn store_with_conversation() -> (ConversationStore, Uuid) {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let show = Show::from_new(NewShow {
            name: "The Pod".into(),
            host_name: Some("Sarah".into()),
            platform: Platform::Podcast,
            contact_email: None,
            subscriber_count: None,
            view_count: None,
            guest_score: None,
            url: None,
            thumbnail_url: None,
        })
        .unwrap();
        let conversation = Conversation::new(show.id);
        db.insert_show(&show, &conversation).await.unwrap();
        (ConversationStore::new(db), conversation.id)
    }

    fn outbound(body: &str) -> NewMessage {
        NewMessage {
            sender_name: "Alex".into(),
            sender_email: "alex@acme.dev".into(),
            body: body.into(),
            is_you: true,
        }
    }

    fn inbound(body: &str) -> NewMessage {
        NewMessage {
            sender_name: "Sarah".into(),
            sender_email: "sarah@thepod.fm".into(),
            body: body.into(),
            is_you: false,
        }
    }

    #[tokio::test]
    async fn append_is_strictly_ordered() {
        let (store, conversation_id) = store_with_conversation().await;
        for i in 0..6 {
            store
                .append_message(conversation_id, outbound(&format!("m{i}")))
                .await
                .unwrap();
        }
        let thread = store.thread(conversation_id).await.unwrap();
        assert_eq!(thread.len(), 6);
        let bodies: Vec<_> = thread.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["m0", "m1", "m2", "m3", "m4", "m5"]);
    }

    #[tokio::test]
    async fn unread_semantics() {
        let (store, conversation_id) = store_with_conversation().await;

        store
            .append_message(conversation_id, outbound("pitch"))
            .await
            .unwrap();
        assert!(!store.get(conversation_id).await.unwrap().unread);

        store
            .append_message(conversation_id, inbound("sounds fun"))
            .await
            .unwrap();
        assert!(store.get(conversation_id).await.unwrap().unread);

        // Outbound reply does not clear unread; only mark_read does.
        store
            .append_message(conversation_id, outbound("great!"))
            .await
            .unwrap();
        assert!(store.get(conversation_id).await.unwrap().unread);

        store.mark_read(conversation_id).await.unwrap();
        assert!(!store.get(conversation_id).await.unwrap().unread);

        // Idempotent.
        store.mark_read(conversation_id).await.unwrap();
        assert!(!store.get(conversation_id).await.unwrap().unread);
    }

    #[tokio::test]
    async fn last_message_at_tracks_newest() {
        let (store, conversation_id) = store_with_conversation().await;
        let first = store
            .append_message(conversation_id, outbound("one"))
            .await
            .unwrap();
        assert_eq!(
            store.get(conversation_id).await.unwrap().last_message_at,
            Some(first.sent_at)
        );
        let second = store
            .append_message(conversation_id, inbound("two"))
            .await
            .unwrap();
        assert_eq!(
            store.get(conversation_id).await.unwrap().last_message_at,
            Some(second.sent_at)
        );
    }

    #[tokio::test]
    async fn sentiment_set_and_overwritten() {
        let (store, conversation_id) = store_with_conversation().await;
        assert!(store.get(conversation_id).await.unwrap().sentiment.is_none());

        store
            .set_sentiment(conversation_id, Sentiment::Neutral)
            .await
            .unwrap();
        assert_eq!(
            store.get(conversation_id).await.unwrap().sentiment,
            Some(Sentiment::Neutral)
        );

        store
            .set_sentiment(conversation_id, Sentiment::Positive)
            .await
            .unwrap();
        assert_eq!(
            store.get(conversation_id).await.unwrap().sentiment,
            Some(Sentiment::Positive)
        );
    }

    #[tokio::test]
    async fn missing_conversation_is_not_found() {
        let (store, _) = store_with_conversation().await;
        let missing = Uuid::new_v4();

        let err = store
            .append_message(missing, outbound("hello"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Database(DatabaseError::NotFound { .. })
        ));
        assert!(store.mark_read(missing).await.is_err());
        assert!(store
            .set_sentiment(missing, Sentiment::Neutral)
            .await
            .is_err());
        assert!(store.thread(missing).await.is_err());
    }

    #[tokio::test]
    async fn empty_body_rejected_without_write() {
        let (store, conversation_id) = store_with_conversation().await;
        assert!(store
            .append_message(conversation_id, outbound("  "))
            .await
            .is_err());
        assert!(store.thread(conversation_id).await.unwrap().is_empty());
    }
}
