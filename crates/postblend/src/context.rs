// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-lived application context.
//!
//! [`Postblend`] is built once at startup and passed by handle to every
//! command. It owns the store, the plugin registry and the dispatcher.

use std::path::Path;
use std::sync::Arc;

use postblend_config::PostblendConfig;
use postblend_core::{PlatformPlugin, PostblendError};
use postblend_dispatch::Dispatcher;
use postblend_plugin::{PluginContext, PluginFactory, PluginRegistry, builtin_factories};
use postblend_storage::{DynamicTables, Store};
use tracing::info;

pub struct Postblend {
    config: PostblendConfig,
    store: Store,
    tables: DynamicTables,
    registry: Arc<PluginRegistry>,
    dispatcher: Dispatcher,
}

impl Postblend {
    /// Open the store and discover plugins using the built-in factories.
    pub async fn open(config: PostblendConfig) -> Result<Self, PostblendError> {
        Self::open_with(config, builtin_factories()).await
    }

    /// Open the store and discover plugins using exactly `factories`.
    pub async fn open_with(
        config: PostblendConfig,
        factories: Vec<Arc<dyn PluginFactory>>,
    ) -> Result<Self, PostblendError> {
        let store = Store::new();
        store.initialize(&config.storage).await?;
        let tables = store.tables()?;

        let registry = factories
            .into_iter()
            .fold(PluginRegistry::new(), |r, f| r.with_factory(f));
        let registry = Arc::new(registry);
        let dispatcher = Dispatcher::new(Arc::clone(&registry), config.dispatch.max_concurrency);

        let app = Self {
            config,
            store,
            tables,
            registry,
            dispatcher,
        };
        app.discover().await?;
        info!(
            database = %app.config.storage.database_path,
            plugins = app.registry.list().len(),
            "postblend ready"
        );
        Ok(app)
    }

    /// Re-scan the plugin root and replace the loaded plugin set.
    pub async fn discover(&self) -> Result<usize, PostblendError> {
        let ctx = PluginContext::new(self.tables.clone());
        self.registry
            .discover(Path::new(&self.config.plugins.root), &ctx)
            .await
    }

    pub fn config(&self) -> &PostblendConfig {
        &self.config
    }

    pub fn tables(&self) -> &DynamicTables {
        &self.tables
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Shorthand for [`PluginRegistry::platform`].
    pub fn platform(&self, plugin_id: &str) -> Result<Arc<dyn PlatformPlugin>, PostblendError> {
        self.registry.platform(plugin_id)
    }

    /// Checkpoint the store before exit.
    pub async fn close(&self) -> Result<(), PostblendError> {
        self.store.close().await
    }
}
