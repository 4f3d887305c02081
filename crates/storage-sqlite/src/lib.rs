//! SQLite persistence for the audit client: connection pool, writer actor,
//! embedded migrations and the [`sync::SyncStoreRepository`] backing the
//! local-first store.

pub mod db;
pub mod errors;
pub mod schema;
pub mod sync;

pub use db::{create_pool, get_connection, init, run_migrations, spawn_writer, WriteHandle};
pub use errors::StorageError;
pub use sync::SyncStoreRepository;
