// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All access is serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use postblend_core::{FieldValue, PostblendError, Record};
use tracing::{debug, info};

use crate::migrations::run_migrations;
use crate::schema::query_records;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the single long-lived store connection.
///
/// Cheap to clone; every clone talks to the same background thread.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
    path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs and provision
    /// the reserved system tables.
    pub async fn open(path: impl AsRef<Path>, wal_mode: bool) -> Result<Self, PostblendError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| PostblendError::Storage {
                source: Box::new(e),
            })?;
        }

        let conn = tokio_rusqlite::Connection::open(&path)
            .await
            .map_err(|e| PostblendError::Storage {
                source: Box::new(e),
            })?;
        let db = Self {
            conn,
            path: Some(path),
        };
        db.prepare(wal_mode).await?;
        Ok(db)
    }

    /// Open a private in-memory database. Used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, PostblendError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| PostblendError::Storage {
                source: Box::new(e),
            })?;
        let db = Self { conn, path: None };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), PostblendError> {
        let journal_mode = self
            .conn
            .call(move |conn| -> Result<String, rusqlite::Error> {
                conn.busy_timeout(BUSY_TIMEOUT)?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                if wal_mode {
                    conn.pragma_update(None, "synchronous", "NORMAL")?;
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
                } else {
                    conn.pragma_query_value(None, "journal_mode", |row| row.get(0))
                }
            })
            .await
            .map_err(map_tr_err)?;
        debug!(journal_mode = %journal_mode, "database pragmas applied");

        let applied = self
            .conn
            .call(|conn| run_migrations(conn))
            .await
            .map_err(map_call_err)?;
        if applied > 0 {
            info!(applied, path = ?self.path, "provisioned new store");
        } else {
            debug!(path = ?self.path, "store already provisioned");
        }
        Ok(())
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Backing file, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Run a parameterized statement inside its own transaction and return
    /// every produced row.
    pub async fn execute(
        &self,
        sql: &str,
        params: Vec<FieldValue>,
    ) -> Result<Vec<Record>, PostblendError> {
        let sql = sql.to_string();
        self.write(move |tx| query_records(tx, &sql, &params)).await
    }

    /// Commit boundary: `f` runs inside exactly one transaction, which is
    /// committed before this returns. An error rolls the transaction back.
    pub async fn write<F, T>(&self, f: F) -> Result<T, PostblendError>
    where
        F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| -> Result<T, rusqlite::Error> {
                let tx = conn.transaction()?;
                let out = f(&tx)?;
                tx.commit()?;
                Ok(out)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Run a read-only closure on the connection thread.
    pub async fn read<F, T>(&self, f: F) -> Result<T, PostblendError>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error> + Send + 'static,
        T: Send + 'static,
    {
        self.conn
            .call(move |conn| f(conn))
            .await
            .map_err(map_tr_err)
    }

    /// Checkpoint the WAL so the database file is self-contained.
    pub async fn close(&self) -> Result<(), PostblendError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// Convert a tokio-rusqlite error into PostblendError::Storage.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> PostblendError {
    PostblendError::Storage {
        source: Box::new(e),
    }
}

/// Unwrap a closure's own error, or report the connection failure.
fn map_call_err(e: tokio_rusqlite::Error<PostblendError>) -> PostblendError {
    match e {
        tokio_rusqlite::Error::Error(inner) => inner,
        _ => PostblendError::Storage {
            source: "database connection closed".into(),
        },
    }
}
