//! Sync domain models: entity registry, outbox items, run log, status events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default cadence for periodic sync cycles, in seconds.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Upper bound on queue items pushed in a single cycle.
pub const DEFAULT_PUSH_BATCH_LIMIT: i64 = 500;

/// Retries after which a queue item is surfaced as stuck instead of retried.
pub const DEFAULT_MAX_PUSH_RETRIES: i32 = 5;

/// Bounded timeout for individual remote calls, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Business tables that participate in sync, in pull order.
///
/// This is the schema registry: every entity payload is a JSON document
/// stored under `(entity_type, id)`, and only types listed here ever reach
/// the store or the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Organization,
    Engagement,
    TrialBalance,
    Mapping,
    AnalyticsResult,
}

impl EntityType {
    pub const ALL: [EntityType; 5] = [
        EntityType::Organization,
        EntityType::Engagement,
        EntityType::TrialBalance,
        EntityType::Mapping,
        EntityType::AnalyticsResult,
    ];

    /// Stable wire/table name for this entity type.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Organization => "organization",
            EntityType::Engagement => "engagement",
            EntityType::TrialBalance => "trial_balance",
            EntityType::Mapping => "mapping",
            EntityType::AnalyticsResult => "analytics_result",
        }
    }

    pub fn parse(value: &str) -> Option<EntityType> {
        EntityType::ALL.iter().copied().find(|t| t.as_str() == value)
    }
}

/// Supported outbox operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncOperation::Create => "create",
            SyncOperation::Update => "update",
            SyncOperation::Delete => "delete",
        }
    }
}

/// A locally cached entity row.
///
/// `synced_at` is bookkeeping for the reconciliation loop; it is never part
/// of the payload sent to the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRecord {
    pub entity_type: EntityType,
    pub id: String,
    pub payload: serde_json::Value,
    pub synced_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub deleted: bool,
}

/// Outbox item for one unacknowledged local mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueItem {
    pub id: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub operation: SyncOperation,
    pub payload: serde_json::Value,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Running,
    Completed,
    Failed,
}

impl SyncRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncRunStatus::Running => "running",
            SyncRunStatus::Completed => "completed",
            SyncRunStatus::Failed => "failed",
        }
    }
}

/// One entry per sync cycle; immutable once `completed_at` is set.
///
/// The most recent `completed` entry's `completed_at` is the watermark for
/// incremental pulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub id: String,
    pub sync_type: String,
    pub status: SyncRunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_synced: i32,
    pub errors: i32,
    pub error_message: Option<String>,
}

/// Externally visible sync state, published after every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Active,
    Synced,
    Error,
    Stopped,
}

/// Status event payload delivered to the UI layer. Best-effort, one-way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusEvent {
    pub is_running: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_synced: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncStatusEvent {
    pub fn running() -> Self {
        Self {
            is_running: true,
            last_sync: None,
            status: SyncStatus::Active,
            records_synced: None,
            errors: None,
            error: None,
        }
    }

    pub fn stopped(last_sync: Option<DateTime<Utc>>) -> Self {
        Self {
            is_running: false,
            last_sync,
            status: SyncStatus::Stopped,
            records_synced: None,
            errors: None,
            error: None,
        }
    }
}

/// A remote row from a pull response. The wire shape is a bare entity
/// document; the transport lifts the `id` and server-side `updated_at` out
/// of it and keeps the full document as `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntityRecord {
    pub id: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub payload: serde_json::Value,
}

/// Coordinator configuration, owned by the embedding application.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub base_url: String,
    pub interval_secs: u64,
    pub push_batch_limit: i64,
    pub max_push_retries: i32,
    pub request_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            push_batch_limit: DEFAULT_PUSH_BATCH_LIMIT,
            max_push_retries: DEFAULT_MAX_PUSH_RETRIES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}
