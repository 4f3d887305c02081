//! Persistent store contract: entity rows, mutation outbox, sync run log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::sync::model::{EntityRecord, EntityType, SyncLogEntry, SyncQueueItem, SyncRunStatus};

/// Durable CRUD over cached entity rows plus outbox and run-log bookkeeping.
///
/// Implementations run in-process; the coordinator is the only component
/// that mutates the outbox from the sync side, while local mutation paths
/// (including the computation engine) append to it through `write`/`delete`.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Upserts an entity row and appends a `create` (row absent) or
    /// `update` (row present) outbox item in the same transaction.
    async fn write(
        &self,
        entity_type: EntityType,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<()>;

    /// Tombstones the row and enqueues a `delete` outbox item.
    async fn delete(&self, entity_type: EntityType, id: &str) -> Result<()>;

    fn get(&self, entity_type: EntityType, id: &str) -> Result<Option<EntityRecord>>;

    /// Queue items in FIFO order (oldest first), up to `limit`. Items that
    /// exhausted their retries are excluded; see `stuck_queue_items`.
    fn pending_queue_items(&self, limit: i64) -> Result<Vec<SyncQueueItem>>;

    /// Items that reached the retry maximum and need user attention.
    fn stuck_queue_items(&self) -> Result<Vec<SyncQueueItem>>;

    fn queue_len(&self) -> Result<i64>;

    /// Post-acknowledgment removal. Idempotent: unknown ids are a no-op.
    async fn remove_queue_item(&self, id: &str) -> Result<()>;

    /// Increments `retry_count` and stores the push failure message.
    async fn record_retry(&self, id: &str, error_message: &str) -> Result<()>;

    /// Writes a row arriving from a pull, applying last-write-wins with
    /// pending-deferral: a row with an unacknowledged outbox item is left
    /// untouched and `false` is returned. On apply, `synced_at` is advanced
    /// to `synced_at` (never moved backwards).
    async fn upsert_from_remote(
        &self,
        entity_type: EntityType,
        id: &str,
        payload: serde_json::Value,
        remote_updated_at: Option<DateTime<Utc>>,
        synced_at: DateTime<Utc>,
    ) -> Result<bool>;

    /// Opens a sync log entry with status `running` and returns its id.
    async fn start_sync_log(&self, sync_type: &str) -> Result<String>;

    /// Seals a log entry. The entry is immutable afterwards.
    async fn complete_sync_log(
        &self,
        id: &str,
        status: SyncRunStatus,
        records_synced: i32,
        errors: i32,
        error_message: Option<String>,
    ) -> Result<()>;

    /// Watermark for incremental pulls: `completed_at` of the most recent
    /// `completed` entry, if any.
    fn last_completed_sync(&self) -> Result<Option<DateTime<Utc>>>;

    fn sync_history(&self, limit: i64) -> Result<Vec<SyncLogEntry>>;
}
