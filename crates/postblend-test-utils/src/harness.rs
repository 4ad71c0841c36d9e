// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles a store in a temp directory, a plugin root with
//! the requested manifests, and a registry holding the built-in factories
//! plus any extra factories the test registers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use postblend_config::PostblendConfig;
use postblend_config::model::StorageConfig;
use postblend_core::PostblendError;
use postblend_plugin::{PluginContext, PluginFactory, PluginRegistry, builtin_factories};
use postblend_storage::{DynamicTables, Store};

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    factories: Vec<Arc<dyn PluginFactory>>,
    manifests: Vec<(PathBuf, String)>,
    max_concurrency: usize,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            factories: builtin_factories(),
            manifests: Vec::new(),
            max_concurrency: 8,
        }
    }

    /// Register an extra factory ahead of discovery.
    pub fn with_factory(mut self, factory: Arc<dyn PluginFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Write `content` to `relative_path` under the plugin root.
    pub fn with_manifest(mut self, relative_path: impl Into<PathBuf>, content: &str) -> Self {
        self.manifests.push((relative_path.into(), content.to_string()));
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Build the harness and run discovery once.
    pub async fn build(self) -> Result<TestHarness, PostblendError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| PostblendError::Storage {
            source: e.into(),
        })?;
        let plugin_root = temp_dir.path().join("plugins");
        for (relative, content) in &self.manifests {
            write_file(&plugin_root.join(relative), content)?;
        }

        let mut config = PostblendConfig::default();
        config.storage = StorageConfig {
            database_path: temp_dir.path().join("test.db").to_string_lossy().into_owned(),
            wal_mode: true,
        };
        config.plugins.root = plugin_root.to_string_lossy().into_owned();
        config.dispatch.max_concurrency = self.max_concurrency;

        let store = Store::new();
        store.initialize(&config.storage).await?;
        let tables = store.tables()?;

        let registry = self
            .factories
            .into_iter()
            .fold(PluginRegistry::new(), |r, f| r.with_factory(f));
        let harness = TestHarness {
            config,
            store,
            ctx: PluginContext::new(tables.clone()),
            tables,
            registry: Arc::new(registry),
            plugin_root,
            _temp_dir: temp_dir,
        };
        harness.discover().await?;
        Ok(harness)
    }
}

/// A complete test environment with temp storage and a populated registry.
pub struct TestHarness {
    pub config: PostblendConfig,
    pub store: Store,
    pub tables: DynamicTables,
    pub registry: Arc<PluginRegistry>,
    ctx: PluginContext,
    plugin_root: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn plugin_root(&self) -> &Path {
        &self.plugin_root
    }

    /// Add or overwrite a manifest under the plugin root.
    pub fn write_manifest(
        &self,
        relative_path: impl AsRef<Path>,
        content: &str,
    ) -> Result<(), PostblendError> {
        write_file(&self.plugin_root.join(relative_path), content)
    }

    /// Re-run discovery over the plugin root.
    pub async fn discover(&self) -> Result<usize, PostblendError> {
        self.registry.discover(&self.plugin_root, &self.ctx).await
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), PostblendError> {
    let io = |e: std::io::Error| PostblendError::Storage { source: e.into() };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io)?;
    }
    std::fs::write(path, content).map_err(io)
}

#[cfg(test)]
mod tests {
    use postblend_plugin::ECHO_MANIFEST;

    use super::*;

    #[tokio::test]
    async fn harness_discovers_manifests() {
        let harness = TestHarness::builder()
            .with_manifest("echo.toml", ECHO_MANIFEST)
            .build()
            .await
            .unwrap();
        assert_eq!(harness.registry.list().len(), 1);
        assert!(harness.tables.exists("echo").await.unwrap());
        assert!(harness.store.is_initialized());
    }

    #[tokio::test]
    async fn empty_harness_has_no_plugins() {
        let harness = TestHarness::builder().build().await.unwrap();
        assert!(harness.registry.list().is_empty());
        assert_eq!(harness.config.dispatch.max_concurrency, 8);
    }
}
