//! Repository for the sync tables: entity cache, outbox, run log.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use uuid::Uuid;

use auditdesk_core::errors::{DatabaseError, Error, Result};
use auditdesk_core::sync::{
    EntityRecord, EntityType, SyncLogEntry, SyncOperation, SyncQueueItem, SyncRunStatus, SyncStore,
    DEFAULT_MAX_PUSH_RETRIES,
};

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::{entity_records, sync_log, sync_outbox};

use super::model::{EntityRecordDB, SyncLogEntryDB, SyncOutboxItemDB};

fn enum_to_db<T: serde::Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.trim_matches('"').to_string())
}

fn enum_from_db<T: serde::de::DeserializeOwned>(value: &str) -> Result<T> {
    Ok(serde_json::from_str(&format!("\"{}\"", value))?)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            Error::Database(DatabaseError::Internal(format!(
                "invalid stored timestamp '{}': {}",
                value, e
            )))
        })
}

fn entity_type_from_db(value: &str) -> Result<EntityType> {
    EntityType::parse(value).ok_or_else(|| {
        Error::Database(DatabaseError::Internal(format!(
            "unknown entity type '{}'",
            value
        )))
    })
}

fn to_entity_record(row: EntityRecordDB) -> Result<EntityRecord> {
    Ok(EntityRecord {
        entity_type: entity_type_from_db(&row.entity_type)?,
        id: row.id,
        payload: serde_json::from_str(&row.payload)?,
        synced_at: row.synced_at.as_deref().map(parse_timestamp).transpose()?,
        updated_at: parse_timestamp(&row.updated_at)?,
        deleted: row.deleted != 0,
    })
}

fn to_queue_item(row: SyncOutboxItemDB) -> Result<SyncQueueItem> {
    Ok(SyncQueueItem {
        id: row.id,
        entity_type: entity_type_from_db(&row.entity_type)?,
        entity_id: row.entity_id,
        operation: enum_from_db(&row.operation)?,
        payload: serde_json::from_str(&row.payload)?,
        retry_count: row.retry_count,
        last_error: row.last_error,
        created_at: parse_timestamp(&row.created_at)?,
    })
}

fn to_log_entry(row: SyncLogEntryDB) -> Result<SyncLogEntry> {
    Ok(SyncLogEntry {
        id: row.id,
        sync_type: row.sync_type,
        status: enum_from_db(&row.status)?,
        started_at: parse_timestamp(&row.started_at)?,
        completed_at: row
            .completed_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?,
        records_synced: row.records_synced,
        errors: row.errors,
        error_message: row.error_message,
    })
}

fn enqueue_outbox_item(
    conn: &mut SqliteConnection,
    entity_type: EntityType,
    entity_id: &str,
    operation: SyncOperation,
    payload_json: &str,
    now: &str,
) -> Result<()> {
    let row = SyncOutboxItemDB {
        id: Uuid::now_v7().to_string(),
        entity_type: enum_to_db(&entity_type)?,
        entity_id: entity_id.to_string(),
        operation: enum_to_db(&operation)?,
        payload: payload_json.to_string(),
        retry_count: 0,
        last_error: None,
        created_at: now.to_string(),
    };

    diesel::insert_into(sync_outbox::table)
        .values(&row)
        .execute(conn)
        .map_err(StorageError::from)?;

    Ok(())
}

/// SQLite-backed [`SyncStore`]. Reads go through the pool; every mutation
/// runs on the writer actor so the entity row and its outbox item commit
/// in one transaction.
pub struct SyncStoreRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    max_push_retries: i32,
}

impl SyncStoreRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self {
            pool,
            writer,
            max_push_retries: DEFAULT_MAX_PUSH_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_push_retries: i32) -> Self {
        self.max_push_retries = max_push_retries;
        self
    }
}

#[async_trait]
impl SyncStore for SyncStoreRepository {
    async fn write(
        &self,
        entity_type: EntityType,
        id: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                let type_db = enum_to_db(&entity_type)?;
                let now = Utc::now().to_rfc3339();
                let payload_db = serde_json::to_string(&payload)?;

                let exists = entity_records::table
                    .find((&type_db, &id))
                    .first::<EntityRecordDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?
                    .is_some();
                let operation = if exists {
                    SyncOperation::Update
                } else {
                    SyncOperation::Create
                };

                let row = EntityRecordDB {
                    entity_type: type_db,
                    id: id.clone(),
                    payload: payload_db.clone(),
                    synced_at: None,
                    updated_at: now.clone(),
                    deleted: 0,
                };
                diesel::insert_into(entity_records::table)
                    .values(&row)
                    .on_conflict((entity_records::entity_type, entity_records::id))
                    .do_update()
                    .set((
                        entity_records::payload.eq(&row.payload),
                        entity_records::updated_at.eq(&row.updated_at),
                        entity_records::deleted.eq(0),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                enqueue_outbox_item(conn, entity_type, &id, operation, &payload_db, &now)
            })
            .await
    }

    async fn delete(&self, entity_type: EntityType, id: &str) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                let type_db = enum_to_db(&entity_type)?;
                let now = Utc::now().to_rfc3339();

                // Tombstone rather than remove, so a later pull for this id
                // cannot resurrect the row before the delete is acknowledged.
                diesel::update(entity_records::table.find((&type_db, &id)))
                    .set((
                        entity_records::deleted.eq(1),
                        entity_records::updated_at.eq(&now),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let payload = serde_json::to_string(&serde_json::json!({ "id": id }))?;
                enqueue_outbox_item(conn, entity_type, &id, SyncOperation::Delete, &payload, &now)
            })
            .await
    }

    fn get(&self, entity_type: EntityType, id: &str) -> Result<Option<EntityRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let row = entity_records::table
            .find((enum_to_db(&entity_type)?, id))
            .first::<EntityRecordDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(to_entity_record).transpose()
    }

    fn pending_queue_items(&self, limit: i64) -> Result<Vec<SyncQueueItem>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_outbox::table
            .filter(sync_outbox::retry_count.lt(self.max_push_retries))
            .order((sync_outbox::created_at.asc(), sync_outbox::id.asc()))
            .limit(limit)
            .load::<SyncOutboxItemDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_queue_item).collect()
    }

    fn stuck_queue_items(&self) -> Result<Vec<SyncQueueItem>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_outbox::table
            .filter(sync_outbox::retry_count.ge(self.max_push_retries))
            .order(sync_outbox::created_at.asc())
            .load::<SyncOutboxItemDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_queue_item).collect()
    }

    fn queue_len(&self) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        sync_outbox::table
            .count()
            .get_result(&mut conn)
            .map_err(|e| Error::from(StorageError::from(e)))
    }

    async fn remove_queue_item(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::delete(sync_outbox::table.find(&id))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn record_retry(&self, id: &str, error_message: &str) -> Result<()> {
        let id = id.to_string();
        let error_message = error_message.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(sync_outbox::table.find(&id))
                    .set((
                        sync_outbox::retry_count.eq(sync_outbox::retry_count + 1),
                        sync_outbox::last_error.eq(Some(error_message)),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn upsert_from_remote(
        &self,
        entity_type: EntityType,
        id: &str,
        payload: serde_json::Value,
        remote_updated_at: Option<DateTime<Utc>>,
        synced_at: DateTime<Utc>,
    ) -> Result<bool> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                let type_db = enum_to_db(&entity_type)?;

                let pending: i64 = sync_outbox::table
                    .filter(sync_outbox::entity_type.eq(&type_db))
                    .filter(sync_outbox::entity_id.eq(&id))
                    .count()
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                if pending > 0 {
                    return Ok(false);
                }

                let existing = entity_records::table
                    .find((&type_db, &id))
                    .first::<EntityRecordDB>(conn)
                    .optional()
                    .map_err(StorageError::from)?;

                // synced_at only ever moves forward.
                let synced_at_value = existing
                    .as_ref()
                    .and_then(|row| row.synced_at.as_deref())
                    .map(parse_timestamp)
                    .transpose()?
                    .map(|current| current.max(synced_at))
                    .unwrap_or(synced_at);

                // Last write wins on the server timestamp: an older remote
                // row never overwrites a newer local one.
                let keep_local = match (existing.as_ref(), remote_updated_at) {
                    (Some(row), Some(remote_ts)) => parse_timestamp(&row.updated_at)? > remote_ts,
                    _ => false,
                };
                if keep_local {
                    diesel::update(entity_records::table.find((&type_db, &id)))
                        .set(entity_records::synced_at.eq(Some(synced_at_value.to_rfc3339())))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                    return Ok(true);
                }

                let row = EntityRecordDB {
                    entity_type: type_db,
                    id,
                    payload: serde_json::to_string(&payload)?,
                    synced_at: Some(synced_at_value.to_rfc3339()),
                    updated_at: remote_updated_at.unwrap_or_else(Utc::now).to_rfc3339(),
                    deleted: 0,
                };
                diesel::insert_into(entity_records::table)
                    .values(&row)
                    .on_conflict((entity_records::entity_type, entity_records::id))
                    .do_update()
                    .set((
                        entity_records::payload.eq(&row.payload),
                        entity_records::synced_at.eq(&row.synced_at),
                        entity_records::updated_at.eq(&row.updated_at),
                        entity_records::deleted.eq(0),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(true)
            })
            .await
    }

    async fn start_sync_log(&self, sync_type: &str) -> Result<String> {
        let sync_type = sync_type.to_string();
        self.writer
            .exec(move |conn| {
                let row = SyncLogEntryDB {
                    id: Uuid::now_v7().to_string(),
                    sync_type,
                    status: enum_to_db(&SyncRunStatus::Running)?,
                    started_at: Utc::now().to_rfc3339(),
                    completed_at: None,
                    records_synced: 0,
                    errors: 0,
                    error_message: None,
                };
                diesel::insert_into(sync_log::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(row.id)
            })
            .await
    }

    async fn complete_sync_log(
        &self,
        id: &str,
        status: SyncRunStatus,
        records_synced: i32,
        errors: i32,
        error_message: Option<String>,
    ) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn| {
                diesel::update(sync_log::table.find(&id))
                    .set((
                        sync_log::status.eq(enum_to_db(&status)?),
                        sync_log::completed_at.eq(Some(Utc::now().to_rfc3339())),
                        sync_log::records_synced.eq(records_synced),
                        sync_log::errors.eq(errors),
                        sync_log::error_message.eq(error_message),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    fn last_completed_sync(&self) -> Result<Option<DateTime<Utc>>> {
        let mut conn = get_connection(&self.pool)?;
        let row = sync_log::table
            .filter(sync_log::status.eq(enum_to_db(&SyncRunStatus::Completed)?))
            .filter(sync_log::completed_at.is_not_null())
            .order(sync_log::completed_at.desc())
            .first::<SyncLogEntryDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.and_then(|r| r.completed_at)
            .as_deref()
            .map(parse_timestamp)
            .transpose()
    }

    fn sync_history(&self, limit: i64) -> Result<Vec<SyncLogEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_log::table
            .order(sync_log::started_at.desc())
            .limit(limit)
            .load::<SyncLogEntryDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(to_log_entry).collect()
    }
}
