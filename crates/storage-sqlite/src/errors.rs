//! Storage-level errors, mapped into the core taxonomy at the crate boundary.

use thiserror::Error;

use auditdesk_core::errors::{DatabaseError, Error};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("{0}")]
    Internal(String),
}

impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        StorageError::Connection(err.to_string())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Connection(message) => {
                Error::Database(DatabaseError::ConnectionFailed(message))
            }
            StorageError::Query(inner) => {
                Error::Database(DatabaseError::QueryFailed(inner.to_string()))
            }
            StorageError::Migration(message) => {
                Error::Database(DatabaseError::MigrationFailed(message))
            }
            StorageError::Internal(message) => Error::Database(DatabaseError::Internal(message)),
        }
    }
}
