//! Error types for Guestpitch.

use uuid::Uuid;

use crate::pipeline::stage::Stage;

/// Top-level error type for the service core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Pipeline transition errors.
///
/// A rejected transition is always surfaced — never a silent no-op —
/// because the stage-count dashboard depends on every attempt being
/// accounted for.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Event {event} is not legal from stage {stage}")]
    InvalidTransition { stage: Stage, event: &'static str },

    #[error("Follow-up limit reached for show {show_id}: max {max}")]
    FollowupLimitReached { show_id: Uuid, max: u32 },

    #[error("Stage changed concurrently for show {show_id}; re-fetch and retry")]
    StageConflict { show_id: Uuid },
}

/// Input validation errors. Checked before any mutation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Field {field} must not be empty")]
    Empty { field: &'static str },

    #[error("Invalid value for {field}: {message}")]
    OutOfRange { field: &'static str, message: String },
}

/// Result type alias for the service core.
pub type Result<T> = std::result::Result<T, Error>;
