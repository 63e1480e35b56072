//! Application-wide error and result types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for everything the daemon does. Services and repositories
/// return this directly; the admin API flattens it into an HTTP envelope at
/// the edge.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Streaming platform call failed: {0}")]
    Helix(#[from] helix_api::HelixError),

    #[error("Chat connection failed: {0}")]
    Chat(#[from] tmi_client::TmiError),

    /// Discord REST failures that the DTO layer has already flattened.
    #[error("Messaging platform: {0}")]
    Messaging(String),

    #[error("{entity_type} {id} not found")]
    NotFound { entity_type: String, id: String },

    /// The request collides with existing state, e.g. subscribing a guild to
    /// the same streamer twice.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    /// A stored JSON payload (role-menu entries, embed fields) failed to
    /// encode or decode.
    #[error("JSON payload error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration problem: {0}")]
    Configuration(String),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn messaging(msg: impl Into<String>) -> Self {
        Self::Messaging(msg.into())
    }
}
