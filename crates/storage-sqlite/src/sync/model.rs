//! Database models for the sync tables. Timestamps are RFC 3339 strings;
//! parsing to `DateTime<Utc>` happens at the repository boundary.

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(entity_type, id))]
#[diesel(table_name = crate::schema::entity_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct EntityRecordDB {
    pub entity_type: String,
    pub id: String,
    pub payload: String,
    pub synced_at: Option<String>,
    pub updated_at: String,
    pub deleted: i32,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_outbox)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncOutboxItemDB {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub operation: String,
    pub payload: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: String,
}

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = crate::schema::sync_log)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SyncLogEntryDB {
    pub id: String,
    pub sync_type: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub records_synced: i32,
    pub errors: i32,
    pub error_message: Option<String>,
}
