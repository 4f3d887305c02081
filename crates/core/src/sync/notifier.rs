//! Status notification: one-way publish of sync state transitions.

use log::debug;
use tokio::sync::broadcast;

use crate::sync::model::SyncStatusEvent;

/// Publishes sync-cycle state transitions to external observers.
///
/// Delivery is best-effort: implementations must never fail, and a missing
/// or slow observer must never abort a sync cycle.
pub trait StatusNotifier: Send + Sync {
    fn notify(&self, event: SyncStatusEvent);
}

/// Broadcast-channel notifier. Subscribers get their own receiver; lagged or
/// dropped receivers are ignored on send.
pub struct ChannelNotifier {
    sender: broadcast::Sender<SyncStatusEvent>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncStatusEvent> {
        self.sender.subscribe()
    }
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new(16)
    }
}

impl StatusNotifier for ChannelNotifier {
    fn notify(&self, event: SyncStatusEvent) {
        // send() errors only when no receiver exists; that is fine here.
        let _ = self.sender.send(event);
    }
}

/// Log-only notifier for headless embedding and tests.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl StatusNotifier for LogNotifier {
    fn notify(&self, event: SyncStatusEvent) {
        debug!(
            "sync status: {:?} running={} records={:?} errors={:?}",
            event.status, event.is_running, event.records_synced, event.errors
        );
    }
}
