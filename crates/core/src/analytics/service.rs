//! Analytics service: computes derived artifacts and persists them through
//! the store, which enqueues them for outbound sync.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use uuid::Uuid;

use crate::analytics::anomalies::detect_anomalies;
use crate::analytics::je_tests::perform_journal_entry_tests;
use crate::analytics::materiality::compute_materiality;
use crate::analytics::model::{AnalyticsResult, TrialBalance};
use crate::analytics::ratios::compute_ratios;
use crate::errors::Result;
use crate::sync::{EntityType, SyncStore};

#[async_trait]
pub trait AnalyticsServiceTrait: Send + Sync {
    /// Runs all analytics procedures over a cached trial balance and persists
    /// the combined result as an `analytics_result` entity. Requires no
    /// network access; the result reaches the remote service through the
    /// outbox on a later sync cycle.
    async fn process_engagement(
        &self,
        engagement_id: &str,
        trial_balance: &TrialBalance,
    ) -> Result<AnalyticsResult>;
}

pub struct AnalyticsService {
    store: Arc<dyn SyncStore>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store }
    }

    /// Pure combination of the four procedures; no persistence.
    pub fn compute(engagement_id: &str, trial_balance: &TrialBalance) -> AnalyticsResult {
        AnalyticsResult {
            id: Uuid::now_v7().to_string(),
            engagement_id: engagement_id.to_string(),
            processed_at: Utc::now(),
            ratios: compute_ratios(trial_balance),
            anomalies: detect_anomalies(trial_balance),
            je_tests: perform_journal_entry_tests(trial_balance),
            materiality: compute_materiality(trial_balance),
        }
    }
}

#[async_trait]
impl AnalyticsServiceTrait for AnalyticsService {
    async fn process_engagement(
        &self,
        engagement_id: &str,
        trial_balance: &TrialBalance,
    ) -> Result<AnalyticsResult> {
        let result = Self::compute(engagement_id, trial_balance);
        debug!(
            "analytics for engagement {}: {} anomalies, {} flagged entries",
            engagement_id,
            result.anomalies.len(),
            result.je_tests.round_dollar_testing.len()
                + result.je_tests.large_adjustments.len()
                + result.je_tests.unusual_timing.len()
        );

        let payload = serde_json::to_value(&result)?;
        self.store
            .write(EntityType::AnalyticsResult, &result.id, payload)
            .await?;
        Ok(result)
    }
}
