//! Explicit service wiring: one context object constructed at startup and
//! passed by reference to all consumers.

use std::sync::Arc;

use crate::analytics::{AnalyticsService, AnalyticsServiceTrait};
use crate::sync::{
    AccessTokenProvider, RemoteTransport, StatusNotifier, SyncConfig, SyncCoordinator, SyncStore,
};

/// Holds every long-lived service of the data core. No module-level
/// globals: the embedding application builds exactly one of these and
/// shares it.
pub struct SyncContext {
    store: Arc<dyn SyncStore>,
    transport: Arc<dyn RemoteTransport>,
    tokens: Arc<dyn AccessTokenProvider>,
    notifier: Arc<dyn StatusNotifier>,
    coordinator: Arc<SyncCoordinator>,
    analytics_service: Arc<dyn AnalyticsServiceTrait>,
}

impl SyncContext {
    pub fn new(
        config: SyncConfig,
        store: Arc<dyn SyncStore>,
        transport: Arc<dyn RemoteTransport>,
        tokens: Arc<dyn AccessTokenProvider>,
        notifier: Arc<dyn StatusNotifier>,
    ) -> Self {
        let coordinator = Arc::new(SyncCoordinator::new(
            config,
            Arc::clone(&store),
            Arc::clone(&transport),
            Arc::clone(&tokens),
            Arc::clone(&notifier),
        ));
        let analytics_service = Arc::new(AnalyticsService::new(Arc::clone(&store)));
        Self {
            store,
            transport,
            tokens,
            notifier,
            coordinator,
            analytics_service,
        }
    }

    pub fn store(&self) -> Arc<dyn SyncStore> {
        Arc::clone(&self.store)
    }

    pub fn transport(&self) -> Arc<dyn RemoteTransport> {
        Arc::clone(&self.transport)
    }

    pub fn tokens(&self) -> Arc<dyn AccessTokenProvider> {
        Arc::clone(&self.tokens)
    }

    pub fn notifier(&self) -> Arc<dyn StatusNotifier> {
        Arc::clone(&self.notifier)
    }

    pub fn coordinator(&self) -> Arc<SyncCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn analytics_service(&self) -> Arc<dyn AnalyticsServiceTrait> {
        Arc::clone(&self.analytics_service)
    }
}
