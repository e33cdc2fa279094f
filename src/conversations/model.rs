//! Conversation aggregate — the message thread for one show.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Classification of a host's inbound reply.
///
/// Set only from inbound messages, never from our own outbound sends.
/// Unclassified replies default to `Neutral` at the webhook boundary —
/// an unknown sentiment is never conflated with `Negative`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Sentiment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(ValidationError::OutOfRange {
                field: "sentiment",
                message: format!("unknown sentiment '{other}'"),
            }),
        }
    }
}

/// The 1:1 message aggregate for one show.
///
/// Invariants:
/// - exactly one conversation per show (`show_id` is unique);
/// - `last_message_at` always equals the timestamp of the newest message;
/// - `sentiment` stays `None` until the first inbound reply is classified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub show_id: Uuid,
    pub sentiment: Option<Sentiment>,
    /// True whenever the newest message is inbound and has not been viewed.
    pub unread: bool,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create the (empty) conversation for a newly discovered show.
    pub fn new(show_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            show_id,
            sentiment: None,
            unread: false,
            last_message_at: None,
            created_at: Utc::now(),
        }
    }
}

/// One message in a conversation. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_name: String,
    pub sender_email: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    /// True for outbound (self-authored) messages, false for host replies.
    pub is_you: bool,
}

/// Input for appending a message.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    pub sender_name: String,
    pub sender_email: String,
    pub body: String,
    pub is_you: bool,
}

impl NewMessage {
    /// Reject malformed input before any mutation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.body.trim().is_empty() {
            return Err(ValidationError::Empty { field: "body" });
        }
        if self.sender_name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "sender_name" });
        }
        Ok(())
    }

    /// Materialize into a message for the given conversation, stamped now.
    pub fn into_message(self, conversation_id: Uuid) -> Result<Message, ValidationError> {
        self.validate()?;
        Ok(Message {
            id: Uuid::new_v4(),
            conversation_id,
            sender_name: self.sender_name,
            sender_email: self.sender_email,
            body: self.body,
            sent_at: Utc::now(),
            is_you: self.is_you,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_display_matches_serde() {
        for sentiment in [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative] {
            let json = serde_json::to_string(&sentiment).unwrap();
            assert_eq!(json, format!("\"{sentiment}\""));
        }
    }

    #[test]
    fn sentiment_parse_roundtrip() {
        for sentiment in [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative] {
            let parsed: Sentiment = sentiment.as_str().parse().unwrap();
            assert_eq!(parsed, sentiment);
        }
        assert!("enthusiastic".parse::<Sentiment>().is_err());
    }

    #[test]
    fn new_conversation_starts_clean() {
        let show_id = Uuid::new_v4();
        let conversation = Conversation::new(show_id);
        assert_eq!(conversation.show_id, show_id);
        assert!(conversation.sentiment.is_none());
        assert!(!conversation.unread);
        assert!(conversation.last_message_at.is_none());
    }

    #[test]
    fn empty_body_rejected() {
        let new = NewMessage {
            sender_name: "Sarah".into(),
            sender_email: "sarah@thepod.fm".into(),
            body: "   ".into(),
            is_you: false,
        };
        assert!(matches!(
            new.validate(),
            Err(ValidationError::Empty { field: "body" })
        ));
    }

    #[test]
    fn into_message_stamps_conversation() {
        let conversation_id = Uuid::new_v4();
        let msg = NewMessage {
            sender_name: "Sarah".into(),
            sender_email: "sarah@thepod.fm".into(),
            body: "Love to have you on!".into(),
            is_you: false,
        }
        .into_message(conversation_id)
        .unwrap();
        assert_eq!(msg.conversation_id, conversation_id);
        assert!(!msg.is_you);
    }
}
