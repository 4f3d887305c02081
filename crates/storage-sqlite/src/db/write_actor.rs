//! Dedicated writer actor. SQLite allows one writer at a time; funneling
//! every mutation through a single connection on its own thread avoids
//! SQLITE_BUSY contention under WAL and gives each job an immediate
//! transaction.

use std::thread;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tokio::sync::{mpsc, oneshot};

use auditdesk_core::errors::{DatabaseError, Error, Result};

use crate::db::DbPool;
use crate::errors::StorageError;

type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Errors surfaced out of a writer transaction: either the job's own
/// failure or a BEGIN/COMMIT failure from the connection.
enum TxError {
    App(Error),
    Db(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Db(err)
    }
}

/// Cloneable handle submitting jobs to the writer thread.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<WriteJob>,
}

impl WriteHandle {
    /// Runs `job` inside an immediate transaction on the writer connection
    /// and awaits its result. The transaction rolls back if `job` errors.
    pub async fn exec<T, F>(&self, job: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let wrapped: WriteJob = Box::new(move |conn| {
            let outcome = conn
                .immediate_transaction::<T, TxError, _>(|tx| job(tx).map_err(TxError::App))
                .map_err(|err| match err {
                    TxError::App(inner) => inner,
                    TxError::Db(inner) => Error::from(StorageError::from(inner)),
                });
            let _ = reply_tx.send(outcome);
        });

        self.tx.send(wrapped).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "writer thread is no longer running".to_string(),
            ))
        })?;

        reply_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "writer thread dropped the reply channel".to_string(),
            ))
        })?
    }
}

/// Spawns the writer thread with a connection held for its lifetime.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<WriteJob>();

    thread::spawn(move || {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(err) => {
                log::error!("writer thread could not acquire a connection: {err}");
                return;
            }
        };
        while let Some(job) = rx.blocking_recv() {
            job(&mut conn);
        }
    });

    WriteHandle { tx }
}
