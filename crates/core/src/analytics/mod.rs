//! Local computation engine: audit analytics over cached entity data.
//!
//! Everything here is pure over its inputs and never touches the network;
//! the service wrapper persists results through the store, which also
//! enqueues them for outbound sync.

mod anomalies;
mod materiality;
mod model;
mod ratios;
mod service;

pub use anomalies::detect_anomalies;
pub use je_tests::perform_journal_entry_tests;
pub use materiality::compute_materiality;
pub use model::*;
pub use ratios::compute_ratios;
pub use service::{AnalyticsService, AnalyticsServiceTrait};
