//! Remote transport contract and its retry taxonomy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::sync::model::{EntityType, RemoteEntityRecord};

/// Result type alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Retry policy classification for remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Permanent,
    ReauthRequired,
}

/// Failures crossing the network seam.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Timeout or unreachable host. The affected push item stays queued;
    /// the affected pull is skipped for the cycle.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success response from the remote service.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Missing or rejected credentials.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify for retry policy. 401/403 demand re-authentication; 408/429
    /// and server errors are transient; remaining 4xx are validation
    /// failures that will not succeed on retry.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Api { status, .. } => match *status {
                401 | 403 => RetryClass::ReauthRequired,
                408 | 409 | 423 | 425 | 429 => RetryClass::Retryable,
                500..=599 => RetryClass::Retryable,
                _ => RetryClass::Permanent,
            },
            Self::Network(_) => RetryClass::Retryable,
            Self::Decode(_) => RetryClass::Permanent,
            Self::Auth(_) => RetryClass::ReauthRequired,
        }
    }
}

/// Thin authenticated transport used by the coordinator to reach the remote
/// audit service. One method per remote call shape.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// `POST /{entity_type}` with the entity payload.
    async fn push_create(
        &self,
        token: &str,
        entity_type: EntityType,
        payload: &serde_json::Value,
    ) -> TransportResult<()>;

    /// `PUT /{entity_type}/{entity_id}` with the entity payload.
    async fn push_update(
        &self,
        token: &str,
        entity_type: EntityType,
        entity_id: &str,
        payload: &serde_json::Value,
    ) -> TransportResult<()>;

    /// `DELETE /{entity_type}/{entity_id}`.
    async fn push_delete(
        &self,
        token: &str,
        entity_type: EntityType,
        entity_id: &str,
    ) -> TransportResult<()>;

    /// `GET /{entity_type}?updated_since=<RFC3339>`; `None` performs a full
    /// pull.
    async fn pull_updated_since(
        &self,
        token: &str,
        entity_type: EntityType,
        updated_since: Option<DateTime<Utc>>,
    ) -> TransportResult<Vec<RemoteEntityRecord>>;
}

/// Source of the bearer token used for remote calls. The token carries an
/// 8-hour expiry; an expired token yields an error here and the coordinator
/// stops rather than retrying indefinitely.
pub trait AccessTokenProvider: Send + Sync {
    fn access_token(&self) -> TransportResult<String>;
}
