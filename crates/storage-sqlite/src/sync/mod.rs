//! SQLite-backed sync store: entity cache, mutation outbox, run log.

pub mod model;
pub mod repository;

pub use repository::SyncStoreRepository;
