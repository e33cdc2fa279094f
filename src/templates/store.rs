//! Template store — CRUD over stored outreach templates plus render helpers.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::{DatabaseError, Result, ValidationError};
use crate::store::traits::Database;
use crate::templates::engine::{self, RenderContext};
use crate::templates::model::{EmailTemplate, NewTemplate};

/// A fully rendered outreach message.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RenderedTemplate {
    pub template_id: Uuid,
    pub subject: Option<String>,
    pub body: String,
}

pub struct TemplateStore {
    db: Arc<dyn Database>,
}

impl TemplateStore {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    fn not_found(id: Uuid) -> crate::error::Error {
        DatabaseError::NotFound {
            entity: "template",
            id: id.to_string(),
        }
        .into()
    }

    /// Create a template. Names are unique; name and body must be non-empty.
    pub async fn create(&self, new: NewTemplate) -> Result<EmailTemplate> {
        let template = EmailTemplate::from_new(new)?;
        self.db.insert_template(&template).await?;
        info!(template_id = %template.id, name = %template.name, "Template created");
        Ok(template)
    }

    pub async fn get(&self, id: Uuid) -> Result<EmailTemplate> {
        self.db
            .get_template(id)
            .await?
            .ok_or_else(|| Self::not_found(id))
    }

    pub async fn list(&self, active_only: bool) -> Result<Vec<EmailTemplate>> {
        Ok(self.db.list_templates(active_only).await?)
    }

    /// Flip the active flag.
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<()> {
        if !self.db.set_template_active(id, active).await? {
            return Err(Self::not_found(id));
        }
        Ok(())
    }

    /// Render a stored template against a context. Inactive templates are
    /// rejected — they exist for history, not for new sends.
    pub async fn render(&self, id: Uuid, ctx: &RenderContext) -> Result<RenderedTemplate> {
        let template = self.get(id).await?;
        if !template.active {
            return Err(ValidationError::OutOfRange {
                field: "template",
                message: format!("template '{}' is inactive", template.name),
            }
            .into());
        }
        Ok(RenderedTemplate {
            template_id: template.id,
            subject: template.subject.as_deref().map(|s| engine::render(s, ctx)),
            body: engine::render(&template.body, ctx),
        })
    }
}
