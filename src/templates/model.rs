//! Email template model — named, reusable outreach text patterns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// A stored outreach template. The body may contain `{{token}}` placeholders
/// from the recognized set; anything else passes through at render time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailTemplate {
    pub id: Uuid,
    pub name: String,
    pub subject: Option<String>,
    pub body: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a template.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTemplate {
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewTemplate {
    /// Reject malformed input before any mutation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        if self.body.trim().is_empty() {
            return Err(ValidationError::Empty { field: "body" });
        }
        Ok(())
    }
}

impl EmailTemplate {
    pub fn from_new(new: NewTemplate) -> Result<Self, ValidationError> {
        new.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: new.name,
            subject: new.subject,
            body: new.body,
            active: new.active,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_active() {
        let new: NewTemplate = serde_json::from_value(serde_json::json!({
            "name": "cold pitch",
            "body": "Hi {{host_name}}"
        }))
        .unwrap();
        assert!(new.active);
        let template = EmailTemplate::from_new(new).unwrap();
        assert!(template.active);
    }

    #[test]
    fn empty_body_rejected() {
        let new = NewTemplate {
            name: "cold pitch".into(),
            subject: None,
            body: "  \n ".into(),
            active: true,
        };
        assert!(matches!(
            new.validate(),
            Err(ValidationError::Empty { field: "body" })
        ));
    }

    #[test]
    fn empty_name_rejected() {
        let new = NewTemplate {
            name: "".into(),
            subject: Some("Guest idea".into()),
            body: "Hi".into(),
            active: true,
        };
        assert!(matches!(
            new.validate(),
            Err(ValidationError::Empty { field: "name" })
        ));
    }
}
