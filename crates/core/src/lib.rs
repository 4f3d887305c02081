//! Local-first data and synchronization core for the desktop audit client.
//!
//! Keeps a full working copy of engagement data on the local machine, runs
//! audit analytics with no network connection, and reconciles local changes
//! with the central service through an outbox-based sync coordinator.

pub mod analytics;
pub mod context;
pub mod errors;
pub mod sync;

pub use errors::{DatabaseError, Error, Result};
