//! Sync coordinator: single-flight push/pull cycles on a timer or on demand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::errors::{Error, Result};
use crate::sync::model::{
    EntityType, SyncConfig, SyncOperation, SyncRunStatus, SyncStatus, SyncStatusEvent,
};
use crate::sync::notifier::StatusNotifier;
use crate::sync::store::SyncStore;
use crate::sync::transport::{AccessTokenProvider, RemoteTransport, RetryClass};

/// Counters accumulated over one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub pushed: usize,
    pub pulled: usize,
    /// Remote rows skipped because a local edit was still unacknowledged.
    pub deferred: usize,
    pub errors: usize,
}

/// Outcome of one requested sync cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed(CycleSummary),
    /// A cycle was already in flight; this request was folded into it.
    Coalesced,
    Failed { reason: String },
}

/// Orchestrates reconciliation cycles: push the outbox, pull per entity
/// type since the watermark, resolve conflicts, record the run log, and
/// publish status transitions.
///
/// Exactly one cycle runs at a time; the timer and `force_sync` share the
/// same guard. Item-local and entity-type-local failures are counted and
/// skipped; only storage and authentication failures abort a cycle, and an
/// authentication failure additionally stops the coordinator until
/// `reset_auth` is called.
pub struct SyncCoordinator {
    config: SyncConfig,
    store: Arc<dyn SyncStore>,
    transport: Arc<dyn RemoteTransport>,
    tokens: Arc<dyn AccessTokenProvider>,
    notifier: Arc<dyn StatusNotifier>,
    cycle_running: AtomicBool,
    auth_blocked: AtomicBool,
    stop_requested: AtomicBool,
    wake: Notify,
    timer_task: Mutex<Option<JoinHandle<()>>>,
}

/// Clears the single-flight flag when the cycle scope exits.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncCoordinator {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn SyncStore>,
        transport: Arc<dyn RemoteTransport>,
        tokens: Arc<dyn AccessTokenProvider>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        Self {
            config,
            store,
            transport,
            tokens,
            notifier,
            cycle_running: AtomicBool::new(false),
            auth_blocked: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            wake: Notify::new(),
            timer_task: Mutex::new(None),
        }
    }

    /// Starts the periodic loop: an immediate cycle, then one per interval.
    /// Calling while already scheduled is a logged no-op. Fails when the
    /// coordinator is blocked on re-authentication.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.auth_blocked.load(Ordering::SeqCst) {
            return Err(Error::auth(
                "re-authentication required before sync can start",
            ));
        }

        let mut guard = self.timer_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                debug!("sync timer already running; start ignored");
                return Ok(());
            }
            guard.take();
        }

        self.stop_requested.store(false, Ordering::SeqCst);
        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let coordinator = Arc::clone(self);
        let handle = tokio::spawn(async move {
            loop {
                if coordinator.stop_requested.load(Ordering::SeqCst) {
                    break;
                }
                let outcome = coordinator.run_cycle().await;
                if let CycleOutcome::Failed { reason } = &outcome {
                    warn!("sync cycle failed: {}", reason);
                }
                if coordinator.auth_blocked.load(Ordering::SeqCst) {
                    info!("sync timer stopped: re-authentication required");
                    break;
                }
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = coordinator.wake.notified() => {}
                }
            }
        });
        *guard = Some(handle);
        Ok(())
    }

    /// Cancels the timer. An in-flight cycle is allowed to finish; only the
    /// next cycle is prevented from starting.
    pub async fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.wake.notify_one();
        self.timer_task.lock().await.take();

        let last_sync = self.store.last_completed_sync().unwrap_or(None);
        self.notifier.notify(SyncStatusEvent::stopped(last_sync));
    }

    /// Runs a cycle now, behaving exactly like a timer fire. A request
    /// issued while a cycle is in flight coalesces into it.
    pub async fn force_sync(&self) -> Result<CycleOutcome> {
        if self.auth_blocked.load(Ordering::SeqCst) {
            return Err(Error::auth(
                "re-authentication required before sync can start",
            ));
        }
        Ok(self.run_cycle().await)
    }

    /// Clears the auth block after the embedding application obtained a
    /// fresh token.
    pub fn reset_auth(&self) {
        self.auth_blocked.store(false, Ordering::SeqCst);
    }

    pub fn is_auth_blocked(&self) -> bool {
        self.auth_blocked.load(Ordering::SeqCst)
    }

    pub fn is_cycle_running(&self) -> bool {
        self.cycle_running.load(Ordering::SeqCst)
    }

    async fn run_cycle(&self) -> CycleOutcome {
        if self
            .cycle_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("sync cycle already in flight; request coalesced");
            return CycleOutcome::Coalesced;
        }
        let _guard = CycleGuard(&self.cycle_running);

        self.notifier.notify(SyncStatusEvent::running());
        let started_at = Utc::now();

        let watermark = match self.store.last_completed_sync() {
            Ok(value) => value,
            Err(err) => {
                return self.fail_cycle(None, CycleSummary::default(), err.to_string(), false).await;
            }
        };
        let sync_type = if watermark.is_some() {
            "incremental"
        } else {
            "full"
        };

        let log_id = match self.store.start_sync_log(sync_type).await {
            Ok(id) => id,
            Err(err) => {
                return self.fail_cycle(None, CycleSummary::default(), err.to_string(), false).await;
            }
        };

        let mut summary = CycleSummary::default();

        let token = match self.tokens.access_token() {
            Ok(token) => token,
            Err(err) => {
                return self.fail_cycle(Some(&log_id), summary, err.to_string(), true).await;
            }
        };

        // Push phase. One bad item never aborts the batch.
        let pending = match self.store.pending_queue_items(self.config.push_batch_limit) {
            Ok(items) => items,
            Err(err) => {
                return self.fail_cycle(Some(&log_id), summary, err.to_string(), false).await;
            }
        };
        debug!("push phase: {} pending queue item(s)", pending.len());

        for item in pending {
            let result = match item.operation {
                SyncOperation::Create => {
                    self.transport
                        .push_create(&token, item.entity_type, &item.payload)
                        .await
                }
                SyncOperation::Update => {
                    self.transport
                        .push_update(&token, item.entity_type, &item.entity_id, &item.payload)
                        .await
                }
                SyncOperation::Delete => {
                    self.transport
                        .push_delete(&token, item.entity_type, &item.entity_id)
                        .await
                }
            };

            match result {
                Ok(()) => {
                    if let Err(err) = self.store.remove_queue_item(&item.id).await {
                        return self.fail_cycle(Some(&log_id), summary, err.to_string(), false).await;
                    }
                    summary.pushed += 1;
                }
                Err(err) if err.retry_class() == RetryClass::ReauthRequired => {
                    return self.fail_cycle(Some(&log_id), summary, err.to_string(), true).await;
                }
                Err(err) => {
                    warn!(
                        "push failed for {} {} ({}): {}",
                        item.entity_type.as_str(),
                        item.entity_id,
                        item.operation.as_str(),
                        err
                    );
                    if let Err(storage_err) =
                        self.store.record_retry(&item.id, &err.to_string()).await
                    {
                        return self.fail_cycle(
                            Some(&log_id),
                            summary,
                            storage_err.to_string(),
                            false,
                        ).await;
                    }
                    summary.errors += 1;
                }
            }
        }

        // Pull phase. A failing entity type is skipped for this cycle only.
        for entity_type in EntityType::ALL {
            let rows = match self
                .transport
                .pull_updated_since(&token, entity_type, watermark)
                .await
            {
                Ok(rows) => rows,
                Err(err) if err.retry_class() == RetryClass::ReauthRequired => {
                    return self.fail_cycle(Some(&log_id), summary, err.to_string(), true).await;
                }
                Err(err) => {
                    warn!(
                        "pull skipped for {} this cycle: {}",
                        entity_type.as_str(),
                        err
                    );
                    summary.errors += 1;
                    continue;
                }
            };

            for row in rows {
                match self
                    .store
                    .upsert_from_remote(
                        entity_type,
                        &row.id,
                        row.payload,
                        row.updated_at,
                        started_at,
                    )
                    .await
                {
                    Ok(true) => summary.pulled += 1,
                    Ok(false) => {
                        debug!(
                            "pull deferred for {} {}: local edit pending acknowledgment",
                            entity_type.as_str(),
                            row.id
                        );
                        summary.deferred += 1;
                    }
                    Err(err) => {
                        return self.fail_cycle(Some(&log_id), summary, err.to_string(), false).await;
                    }
                }
            }
        }

        let records_synced = (summary.pushed + summary.pulled) as i32;
        if let Err(err) = self
            .store
            .complete_sync_log(
                &log_id,
                SyncRunStatus::Completed,
                records_synced,
                summary.errors as i32,
                None,
            )
            .await
        {
            // Re-attempt the seal with `failed` so the entry is never left
            // dangling in `running`.
            return self.fail_cycle(Some(&log_id), summary, err.to_string(), false).await;
        }

        let last_sync = self.store.last_completed_sync().unwrap_or(None);
        self.notifier.notify(SyncStatusEvent {
            is_running: false,
            last_sync,
            status: SyncStatus::Synced,
            records_synced: Some(summary.pushed + summary.pulled),
            errors: Some(summary.errors),
            error: None,
        });
        info!(
            "sync cycle completed: pushed={} pulled={} deferred={} errors={}",
            summary.pushed, summary.pulled, summary.deferred, summary.errors
        );

        CycleOutcome::Completed(summary)
    }

    async fn fail_cycle(
        &self,
        log_id: Option<&str>,
        summary: CycleSummary,
        reason: String,
        auth: bool,
    ) -> CycleOutcome {
        if auth {
            self.auth_blocked.store(true, Ordering::SeqCst);
            self.stop_requested.store(true, Ordering::SeqCst);
            self.wake.notify_one();
        }

        if let Some(log_id) = log_id {
            if let Err(err) = self
                .store
                .complete_sync_log(
                    log_id,
                    SyncRunStatus::Failed,
                    (summary.pushed + summary.pulled) as i32,
                    summary.errors as i32 + 1,
                    Some(reason.clone()),
                )
                .await
            {
                warn!("failed to seal sync log entry {}: {}", log_id, err);
            }
        }

        self.notifier.notify(SyncStatusEvent {
            is_running: false,
            last_sync: self.store.last_completed_sync().unwrap_or(None),
            status: SyncStatus::Error,
            records_synced: Some(summary.pushed + summary.pulled),
            errors: Some(summary.errors + 1),
            error: Some(reason.clone()),
        });

        CycleOutcome::Failed { reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DatabaseError;
    use crate::sync::model::{EntityRecord, RemoteEntityRecord, SyncLogEntry, SyncQueueItem};
    use crate::sync::notifier::StatusNotifier;
    use crate::sync::transport::{TransportError, TransportResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct StoreState {
        entities: HashMap<(EntityType, String), EntityRecord>,
        queue: Vec<SyncQueueItem>,
        logs: Vec<SyncLogEntry>,
    }

    #[derive(Default)]
    struct MemoryStore {
        state: StdMutex<StoreState>,
        max_retries: i32,
        fail_pending_reads: AtomicBool,
        fail_next_complete: AtomicBool,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                state: StdMutex::new(StoreState::default()),
                max_retries: 5,
                fail_pending_reads: AtomicBool::new(false),
                fail_next_complete: AtomicBool::new(false),
            }
        }

        fn queue_snapshot(&self) -> Vec<SyncQueueItem> {
            self.state.lock().unwrap().queue.clone()
        }

        fn logs_snapshot(&self) -> Vec<SyncLogEntry> {
            self.state.lock().unwrap().logs.clone()
        }

        fn entity(&self, entity_type: EntityType, id: &str) -> Option<EntityRecord> {
            self.state
                .lock()
                .unwrap()
                .entities
                .get(&(entity_type, id.to_string()))
                .cloned()
        }
    }

    #[async_trait]
    impl SyncStore for MemoryStore {
        async fn write(
            &self,
            entity_type: EntityType,
            id: &str,
            payload: serde_json::Value,
        ) -> crate::errors::Result<()> {
            let mut state = self.state.lock().unwrap();
            let key = (entity_type, id.to_string());
            let operation = if state.entities.contains_key(&key) {
                SyncOperation::Update
            } else {
                SyncOperation::Create
            };
            state.entities.insert(
                key,
                EntityRecord {
                    entity_type,
                    id: id.to_string(),
                    payload: payload.clone(),
                    synced_at: None,
                    updated_at: Utc::now(),
                    deleted: false,
                },
            );
            state.queue.push(SyncQueueItem {
                id: Uuid::now_v7().to_string(),
                entity_type,
                entity_id: id.to_string(),
                operation,
                payload,
                retry_count: 0,
                last_error: None,
                created_at: Utc::now(),
            });
            Ok(())
        }

        async fn delete(&self, entity_type: EntityType, id: &str) -> crate::errors::Result<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(record) = state.entities.get_mut(&(entity_type, id.to_string())) {
                record.deleted = true;
            }
            state.queue.push(SyncQueueItem {
                id: Uuid::now_v7().to_string(),
                entity_type,
                entity_id: id.to_string(),
                operation: SyncOperation::Delete,
                payload: json!({ "id": id }),
                retry_count: 0,
                last_error: None,
                created_at: Utc::now(),
            });
            Ok(())
        }

        fn get(
            &self,
            entity_type: EntityType,
            id: &str,
        ) -> crate::errors::Result<Option<EntityRecord>> {
            Ok(self.entity(entity_type, id))
        }

        fn pending_queue_items(&self, limit: i64) -> crate::errors::Result<Vec<SyncQueueItem>> {
            if self.fail_pending_reads.load(Ordering::SeqCst) {
                return Err(Error::Database(DatabaseError::QueryFailed(
                    "disk I/O error".to_string(),
                )));
            }
            let state = self.state.lock().unwrap();
            Ok(state
                .queue
                .iter()
                .filter(|item| item.retry_count < self.max_retries)
                .take(limit as usize)
                .cloned()
                .collect())
        }

        fn stuck_queue_items(&self) -> crate::errors::Result<Vec<SyncQueueItem>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .queue
                .iter()
                .filter(|item| item.retry_count >= self.max_retries)
                .cloned()
                .collect())
        }

        fn queue_len(&self) -> crate::errors::Result<i64> {
            Ok(self.state.lock().unwrap().queue.len() as i64)
        }

        async fn remove_queue_item(&self, id: &str) -> crate::errors::Result<()> {
            let mut state = self.state.lock().unwrap();
            state.queue.retain(|item| item.id != id);
            Ok(())
        }

        async fn record_retry(&self, id: &str, error_message: &str) -> crate::errors::Result<()> {
            let mut state = self.state.lock().unwrap();
            if let Some(item) = state.queue.iter_mut().find(|item| item.id == id) {
                item.retry_count += 1;
                item.last_error = Some(error_message.to_string());
            }
            Ok(())
        }

        async fn upsert_from_remote(
            &self,
            entity_type: EntityType,
            id: &str,
            payload: serde_json::Value,
            _remote_updated_at: Option<DateTime<Utc>>,
            synced_at: DateTime<Utc>,
        ) -> crate::errors::Result<bool> {
            let mut state = self.state.lock().unwrap();
            let pending = state
                .queue
                .iter()
                .any(|item| item.entity_type == entity_type && item.entity_id == id);
            if pending {
                return Ok(false);
            }
            let key = (entity_type, id.to_string());
            let synced_at = state
                .entities
                .get(&key)
                .and_then(|record| record.synced_at)
                .map(|existing| existing.max(synced_at))
                .unwrap_or(synced_at);
            state.entities.insert(
                key,
                EntityRecord {
                    entity_type,
                    id: id.to_string(),
                    payload,
                    synced_at: Some(synced_at),
                    updated_at: Utc::now(),
                    deleted: false,
                },
            );
            Ok(true)
        }

        async fn start_sync_log(&self, sync_type: &str) -> crate::errors::Result<String> {
            let mut state = self.state.lock().unwrap();
            let id = Uuid::now_v7().to_string();
            state.logs.push(SyncLogEntry {
                id: id.clone(),
                sync_type: sync_type.to_string(),
                status: SyncRunStatus::Running,
                started_at: Utc::now(),
                completed_at: None,
                records_synced: 0,
                errors: 0,
                error_message: None,
            });
            Ok(id)
        }

        async fn complete_sync_log(
            &self,
            id: &str,
            status: SyncRunStatus,
            records_synced: i32,
            errors: i32,
            error_message: Option<String>,
        ) -> crate::errors::Result<()> {
            if self.fail_next_complete.swap(false, Ordering::SeqCst) {
                return Err(Error::Database(DatabaseError::QueryFailed(
                    "disk I/O error".to_string(),
                )));
            }
            let mut state = self.state.lock().unwrap();
            if let Some(entry) = state.logs.iter_mut().find(|entry| entry.id == id) {
                entry.status = status;
                entry.completed_at = Some(Utc::now());
                entry.records_synced = records_synced;
                entry.errors = errors;
                entry.error_message = error_message;
            }
            Ok(())
        }

        fn last_completed_sync(&self) -> crate::errors::Result<Option<DateTime<Utc>>> {
            let state = self.state.lock().unwrap();
            Ok(state
                .logs
                .iter()
                .filter(|entry| entry.status == SyncRunStatus::Completed)
                .filter_map(|entry| entry.completed_at)
                .max())
        }

        fn sync_history(&self, limit: i64) -> crate::errors::Result<Vec<SyncLogEntry>> {
            let state = self.state.lock().unwrap();
            Ok(state.logs.iter().rev().take(limit as usize).cloned().collect())
        }
    }

    #[derive(Default)]
    struct FakeTransport {
        fail_entity_ids: StdMutex<HashSet<String>>,
        fail_status: StdMutex<u16>,
        fail_pull_types: StdMutex<HashSet<EntityType>>,
        pull_rows: StdMutex<HashMap<EntityType, Vec<RemoteEntityRecord>>>,
        pulls_seen: StdMutex<Vec<(EntityType, Option<DateTime<Utc>>)>>,
        pushed: StdMutex<Vec<(SyncOperation, String)>>,
        delay_ms: u64,
    }

    impl FakeTransport {
        fn new() -> Self {
            let transport = Self::default();
            *transport.fail_status.lock().unwrap() = 500;
            transport
        }

        fn fail_push_for(&self, entity_id: &str, status: u16) {
            self.fail_entity_ids
                .lock()
                .unwrap()
                .insert(entity_id.to_string());
            *self.fail_status.lock().unwrap() = status;
        }

        fn serve_pull(&self, entity_type: EntityType, rows: Vec<RemoteEntityRecord>) {
            self.pull_rows.lock().unwrap().insert(entity_type, rows);
        }

        fn push_failure(&self, entity_id: &str) -> TransportResult<()> {
            if self.fail_entity_ids.lock().unwrap().contains(entity_id) {
                let status = *self.fail_status.lock().unwrap();
                return Err(TransportError::api(status, "remote rejected"));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteTransport for FakeTransport {
        async fn push_create(
            &self,
            _token: &str,
            _entity_type: EntityType,
            payload: &serde_json::Value,
        ) -> TransportResult<()> {
            let entity_id = payload["id"].as_str().unwrap_or_default().to_string();
            self.push_failure(&entity_id)?;
            self.pushed
                .lock()
                .unwrap()
                .push((SyncOperation::Create, entity_id));
            Ok(())
        }

        async fn push_update(
            &self,
            _token: &str,
            _entity_type: EntityType,
            entity_id: &str,
            _payload: &serde_json::Value,
        ) -> TransportResult<()> {
            self.push_failure(entity_id)?;
            self.pushed
                .lock()
                .unwrap()
                .push((SyncOperation::Update, entity_id.to_string()));
            Ok(())
        }

        async fn push_delete(
            &self,
            _token: &str,
            _entity_type: EntityType,
            entity_id: &str,
        ) -> TransportResult<()> {
            self.push_failure(entity_id)?;
            self.pushed
                .lock()
                .unwrap()
                .push((SyncOperation::Delete, entity_id.to_string()));
            Ok(())
        }

        async fn pull_updated_since(
            &self,
            _token: &str,
            entity_type: EntityType,
            updated_since: Option<DateTime<Utc>>,
        ) -> TransportResult<Vec<RemoteEntityRecord>> {
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            self.pulls_seen
                .lock()
                .unwrap()
                .push((entity_type, updated_since));
            if self.fail_pull_types.lock().unwrap().contains(&entity_type) {
                return Err(TransportError::Network("connection refused".to_string()));
            }
            Ok(self
                .pull_rows
                .lock()
                .unwrap()
                .get(&entity_type)
                .cloned()
                .unwrap_or_default())
        }
    }

    struct FixedToken {
        expired: bool,
    }

    impl AccessTokenProvider for FixedToken {
        fn access_token(&self) -> TransportResult<String> {
            if self.expired {
                Err(TransportError::Auth("access token expired".to_string()))
            } else {
                Ok("test-token".to_string())
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: StdMutex<Vec<SyncStatusEvent>>,
    }

    impl StatusNotifier for RecordingNotifier {
        fn notify(&self, event: SyncStatusEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        transport: Arc<FakeTransport>,
        notifier: Arc<RecordingNotifier>,
        coordinator: Arc<SyncCoordinator>,
    }

    fn harness_with(transport: FakeTransport, expired_token: bool) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let transport = Arc::new(transport);
        let notifier = Arc::new(RecordingNotifier::default());
        let coordinator = Arc::new(SyncCoordinator::new(
            SyncConfig::default(),
            Arc::clone(&store) as Arc<dyn SyncStore>,
            Arc::clone(&transport) as Arc<dyn RemoteTransport>,
            Arc::new(FixedToken {
                expired: expired_token,
            }),
            Arc::clone(&notifier) as Arc<dyn StatusNotifier>,
        ));
        Harness {
            store,
            transport,
            notifier,
            coordinator,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeTransport::new(), false)
    }

    fn remote_row(id: &str, payload: serde_json::Value) -> RemoteEntityRecord {
        RemoteEntityRecord {
            id: id.to_string(),
            updated_at: Some(Utc::now()),
            payload,
        }
    }

    #[tokio::test]
    async fn offline_create_converges_after_one_cycle() {
        let h = harness();
        h.store
            .write(
                EntityType::Engagement,
                "e1",
                json!({ "id": "e1", "name": "FY26 audit" }),
            )
            .await
            .unwrap();
        assert_eq!(h.store.queue_len().unwrap(), 1);

        h.transport.serve_pull(
            EntityType::Engagement,
            vec![remote_row("e1", json!({ "id": "e1", "name": "FY26 audit" }))],
        );

        let outcome = h.coordinator.force_sync().await.unwrap();
        let summary = match outcome {
            CycleOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome: {:?}", other),
        };

        assert_eq!(summary.pushed, 1);
        assert_eq!(h.store.queue_len().unwrap(), 0);
        let record = h.store.entity(EntityType::Engagement, "e1").unwrap();
        assert!(record.synced_at.is_some());
    }

    #[tokio::test]
    async fn push_failure_records_retry_and_keeps_item() {
        let h = harness();
        h.store
            .write(EntityType::Engagement, "e2", json!({ "id": "e2" }))
            .await
            .unwrap();
        h.transport.fail_push_for("e2", 500);

        let outcome = h.coordinator.force_sync().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Completed(_)));

        let queue = h.store.queue_snapshot();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].retry_count, 1);
        assert!(queue[0].last_error.as_deref().unwrap().contains("500"));

        let logs = h.store.logs_snapshot();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncRunStatus::Completed);
        assert_eq!(logs[0].errors, 1);
    }

    #[tokio::test]
    async fn one_failing_item_does_not_abort_batch() {
        let h = harness();
        h.store
            .write(EntityType::Engagement, "bad", json!({ "id": "bad" }))
            .await
            .unwrap();
        h.store
            .write(EntityType::Engagement, "good", json!({ "id": "good" }))
            .await
            .unwrap();
        h.transport.fail_push_for("bad", 422);

        let outcome = h.coordinator.force_sync().await.unwrap();
        let summary = match outcome {
            CycleOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome: {:?}", other),
        };

        assert_eq!(summary.pushed, 1);
        assert_eq!(summary.errors, 1);
        let remaining = h.store.queue_snapshot();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].entity_id, "bad");
    }

    #[tokio::test]
    async fn pending_push_defers_remote_overwrite() {
        let h = harness();
        let local_payload = json!({ "id": "tb1", "name": "local edit" });
        h.store
            .write(EntityType::TrialBalance, "tb1", local_payload.clone())
            .await
            .unwrap();
        h.transport.fail_push_for("tb1", 503);
        h.transport.serve_pull(
            EntityType::TrialBalance,
            vec![remote_row("tb1", json!({ "id": "tb1", "name": "stale remote" }))],
        );

        let outcome = h.coordinator.force_sync().await.unwrap();
        let summary = match outcome {
            CycleOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome: {:?}", other),
        };

        assert_eq!(summary.deferred, 1);
        assert_eq!(summary.pulled, 0);
        let record = h.store.entity(EntityType::TrialBalance, "tb1").unwrap();
        assert_eq!(record.payload, local_payload);
    }

    #[tokio::test]
    async fn concurrent_force_sync_coalesces_into_one_cycle() {
        let mut transport = FakeTransport::new();
        transport.delay_ms = 50;
        let h = harness_with(transport, false);

        let (first, second) = tokio::join!(h.coordinator.force_sync(), h.coordinator.force_sync());
        let outcomes = [first.unwrap(), second.unwrap()];

        assert!(outcomes
            .iter()
            .any(|o| matches!(o, CycleOutcome::Completed(_))));
        assert!(outcomes.iter().any(|o| matches!(o, CycleOutcome::Coalesced)));
        assert_eq!(h.store.logs_snapshot().len(), 1);
    }

    #[tokio::test]
    async fn expired_token_stops_coordinator_until_reset() {
        let h = harness_with(FakeTransport::new(), true);

        let outcome = h.coordinator.force_sync().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Failed { .. }));
        assert!(h.coordinator.is_auth_blocked());

        let logs = h.store.logs_snapshot();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncRunStatus::Failed);

        assert!(matches!(
            h.coordinator.force_sync().await,
            Err(Error::Auth(_))
        ));
        assert!(matches!(h.coordinator.start().await, Err(Error::Auth(_))));

        h.coordinator.reset_auth();
        assert!(h.coordinator.force_sync().await.is_ok());
    }

    #[tokio::test]
    async fn remote_auth_rejection_during_push_stops_coordinator() {
        let h = harness();
        h.store
            .write(EntityType::Mapping, "m1", json!({ "id": "m1" }))
            .await
            .unwrap();
        h.transport.fail_push_for("m1", 401);

        let outcome = h.coordinator.force_sync().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Failed { .. }));
        assert!(h.coordinator.is_auth_blocked());
        // The unacknowledged mutation stays queued for after re-auth.
        assert_eq!(h.store.queue_len().unwrap(), 1);
    }

    #[tokio::test]
    async fn incremental_pull_uses_completed_watermark() {
        let h = harness();

        h.coordinator.force_sync().await.unwrap();
        let first_completed = h.store.logs_snapshot()[0].completed_at.unwrap();
        h.coordinator.force_sync().await.unwrap();

        let pulls = h.transport.pulls_seen.lock().unwrap().clone();
        let type_count = EntityType::ALL.len();
        assert_eq!(pulls.len(), type_count * 2);
        // First cycle has no watermark: full pull.
        assert!(pulls[..type_count].iter().all(|(_, since)| since.is_none()));
        assert!(pulls[type_count..]
            .iter()
            .all(|(_, since)| *since == Some(first_completed)));

        let logs = h.store.logs_snapshot();
        assert_eq!(logs[0].sync_type, "full");
        assert_eq!(logs[1].sync_type, "incremental");
    }

    #[tokio::test]
    async fn pull_twice_against_unchanged_remote_is_idempotent() {
        let h = harness();
        let payload = json!({ "id": "org1", "name": "Acme Holdings" });
        h.transport
            .serve_pull(EntityType::Organization, vec![remote_row("org1", payload.clone())]);

        h.coordinator.force_sync().await.unwrap();
        let first = h.store.entity(EntityType::Organization, "org1").unwrap();
        h.coordinator.force_sync().await.unwrap();
        let second = h.store.entity(EntityType::Organization, "org1").unwrap();

        assert_eq!(first.payload, second.payload);
        assert_eq!(second.payload, payload);
        assert!(second.synced_at.unwrap() >= first.synced_at.unwrap());
    }

    #[tokio::test]
    async fn network_failure_skips_entity_type_for_cycle_only() {
        let h = harness();
        h.transport
            .fail_pull_types
            .lock()
            .unwrap()
            .insert(EntityType::TrialBalance);
        h.transport.serve_pull(
            EntityType::Organization,
            vec![remote_row("org1", json!({ "id": "org1" }))],
        );

        let outcome = h.coordinator.force_sync().await.unwrap();
        let summary = match outcome {
            CycleOutcome::Completed(summary) => summary,
            other => panic!("unexpected outcome: {:?}", other),
        };

        assert_eq!(summary.pulled, 1);
        assert_eq!(summary.errors, 1);
        let logs = h.store.logs_snapshot();
        assert_eq!(logs[0].status, SyncRunStatus::Completed);
    }

    #[tokio::test]
    async fn storage_failure_aborts_cycle_and_seals_log_as_failed() {
        let h = harness();
        h.store.fail_pending_reads.store(true, Ordering::SeqCst);

        let outcome = h.coordinator.force_sync().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Failed { .. }));
        // Storage failure is not an auth failure: no re-auth gate.
        assert!(!h.coordinator.is_auth_blocked());

        let logs = h.store.logs_snapshot();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncRunStatus::Failed);
        assert!(logs[0].completed_at.is_some());
        assert!(logs[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("disk I/O error"));

        let events = h.notifier.events.lock().unwrap().clone();
        assert_eq!(events.last().unwrap().status, SyncStatus::Error);

        // The next cycle after the storage recovers runs normally.
        h.store.fail_pending_reads.store(false, Ordering::SeqCst);
        assert!(matches!(
            h.coordinator.force_sync().await.unwrap(),
            CycleOutcome::Completed(_)
        ));
    }

    #[tokio::test]
    async fn failed_completion_write_still_seals_log_entry() {
        let h = harness();
        h.store.fail_next_complete.store(true, Ordering::SeqCst);

        let outcome = h.coordinator.force_sync().await.unwrap();
        assert!(matches!(outcome, CycleOutcome::Failed { .. }));

        // The entry must not stay `running` forever when the completion
        // write itself fails.
        let logs = h.store.logs_snapshot();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, SyncRunStatus::Failed);
        assert!(logs[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn status_events_bracket_the_cycle() {
        let h = harness();
        h.coordinator.force_sync().await.unwrap();

        let events = h.notifier.events.lock().unwrap().clone();
        assert_eq!(events.first().unwrap().status, SyncStatus::Active);
        assert!(events.first().unwrap().is_running);
        let last = events.last().unwrap();
        assert_eq!(last.status, SyncStatus::Synced);
        assert!(!last.is_running);
        assert!(last.last_sync.is_some());
    }

    #[tokio::test]
    async fn stop_emits_stopped_status_and_start_is_reentrant() {
        let h = harness();
        h.coordinator.start().await.unwrap();
        // Second start is a no-op, not an error.
        h.coordinator.start().await.unwrap();
        h.coordinator.stop().await;

        let events = h.notifier.events.lock().unwrap().clone();
        assert_eq!(events.last().unwrap().status, SyncStatus::Stopped);
    }
}
