//! Show model — a prospect (podcast or YouTube channel) being pitched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::pipeline::stage::Stage;

/// Where the show publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Podcast,
    Youtube,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Podcast => "podcast",
            Self::Youtube => "youtube",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "podcast" => Ok(Self::Podcast),
            "youtube" => Ok(Self::Youtube),
            other => Err(ValidationError::OutOfRange {
                field: "platform",
                message: format!("unknown platform '{other}'"),
            }),
        }
    }
}

/// A prospect entity. Never hard-deleted — only stage-transitioned, and the
/// stage field is mutated exclusively through the pipeline controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Show {
    pub id: Uuid,
    pub name: String,
    pub host_name: Option<String>,
    pub platform: Platform,
    pub contact_email: Option<String>,
    pub subscriber_count: Option<u64>,
    pub view_count: Option<u64>,
    /// Computed guest-fit score, 0–100.
    pub guest_score: Option<u8>,
    pub url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub stage: Stage,
    /// Successful `send_followup` events so far (bounded by config).
    pub followup_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a newly discovered show.
///
/// Counts deserialize into unsigned integers, so a negative count is rejected
/// at the boundary before it ever reaches validation.
#[derive(Debug, Clone, Deserialize)]
pub struct NewShow {
    pub name: String,
    #[serde(default)]
    pub host_name: Option<String>,
    pub platform: Platform,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub subscriber_count: Option<u64>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub guest_score: Option<u8>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

impl NewShow {
    /// Reject malformed input before any mutation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        if let Some(score) = self.guest_score {
            if score > 100 {
                return Err(ValidationError::OutOfRange {
                    field: "guest_score",
                    message: format!("{score} is outside 0–100"),
                });
            }
        }
        if let Some(ref email) = self.contact_email {
            if !email.contains('@') {
                return Err(ValidationError::OutOfRange {
                    field: "contact_email",
                    message: format!("'{email}' is not an email address"),
                });
            }
        }
        Ok(())
    }
}

impl Show {
    /// Build a show in the `discovered` entry stage.
    pub fn from_new(new: NewShow) -> Result<Self, ValidationError> {
        new.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: new.name,
            host_name: new.host_name,
            platform: new.platform,
            contact_email: new.contact_email,
            subscriber_count: new.subscriber_count,
            view_count: new.view_count,
            guest_score: new.guest_score,
            url: new.url,
            thumbnail_url: new.thumbnail_url,
            stage: Stage::Discovered,
            followup_count: 0,
            created_at: now,
            updated_at: now,
        })
    }
}
