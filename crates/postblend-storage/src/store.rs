// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide store handle, initialized exactly once.

use postblend_config::model::StorageConfig;
use postblend_core::PostblendError;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::database::Database;
use crate::tables::DynamicTables;

/// Lazily opened store.
///
/// The first call to [`Store::initialize`] opens the database; later calls
/// are accepted and ignored, even when they name a different path.
#[derive(Default)]
pub struct Store {
    db: OnceCell<Database>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the configured database if this store has not been opened yet.
    pub async fn initialize(&self, config: &StorageConfig) -> Result<(), PostblendError> {
        if let Some(db) = self.db.get() {
            warn!(
                requested = %config.database_path,
                current = ?db.path(),
                "store already initialized, ignoring repeated initialization"
            );
            return Ok(());
        }

        let path = config.database_path.clone();
        let wal_mode = config.wal_mode;
        self.db
            .get_or_try_init(|| async move { Database::open(&path, wal_mode).await })
            .await?;
        debug!(path = %config.database_path, "SQLite store initialized");
        Ok(())
    }

    /// Adopt an already opened database. Ignored if the store is initialized.
    pub fn initialize_with(&self, db: Database) {
        if self.db.set(db).is_err() {
            warn!("store already initialized, ignoring repeated initialization");
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.db.initialized()
    }

    /// Returns the underlying Database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, PostblendError> {
        self.db.get().ok_or_else(|| PostblendError::Storage {
            source: "store not initialized -- call initialize() first".into(),
        })
    }

    /// Dynamic table manager bound to this store.
    pub fn tables(&self) -> Result<DynamicTables, PostblendError> {
        Ok(DynamicTables::new(self.database()?.clone()))
    }

    /// Checkpoint the WAL if the store was ever opened.
    pub async fn close(&self) -> Result<(), PostblendError> {
        match self.db.get() {
            Some(db) => db.close().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config(path: &std::path::Path) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string_lossy().into_owned(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn database_before_initialize_is_an_error() {
        let store = Store::new();
        assert!(!store.is_initialized());
        assert!(store.database().is_err());
        store.close().await.unwrap();
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn second_initialize_is_ignored() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first.db");
        let second = dir.path().join("second.db");

        let store = Store::new();
        store.initialize(&config(&first)).await.unwrap();
        store.initialize(&config(&second)).await.unwrap();

        assert!(first.exists());
        assert!(!second.exists());
        assert_eq!(store.database().unwrap().path(), Some(first.as_path()));
        assert!(logs_contain("ignoring repeated initialization"));
    }
}
