//! Error types shared across the audit client core.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Workspace-wide error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    /// Local storage is unavailable or a query failed. Fatal for the
    /// in-progress sync cycle.
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Remote host unreachable or the request timed out.
    #[error("network error: {0}")]
    Network(String),

    /// Remote service rejected a payload.
    #[error("validation error: {0}")]
    Validation(String),

    /// Expired or invalid token. Stops the coordinator until
    /// re-authentication.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Payload serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Sync orchestration failure that is none of the above.
    #[error("sync error: {0}")]
    Sync(String),
}

/// Storage-level failure detail, produced by the storage crate.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("migration failed: {0}")]
    MigrationFailed(String),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn sync(message: impl Into<String>) -> Self {
        Self::Sync(message.into())
    }
}
