// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base plugin trait and the loaded-instance handle held by the registry.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::PostblendError;
use crate::traits::platform::PlatformPlugin;
use crate::types::{Capability, PluginDescriptor};

/// The base trait for all Postblend plugins.
#[async_trait]
pub trait Plugin: Send + Sync + 'static {
    /// Metadata the plugin was loaded with.
    fn descriptor(&self) -> &PluginDescriptor;

    /// Unique plugin id. Also names the plugin's data table.
    fn id(&self) -> &str {
        &self.descriptor().id
    }

    /// One-time setup run by the registry right after construction
    /// (creating the plugin's table, warming caches, ...).
    ///
    /// An error here aborts the whole discovery call.
    async fn initialize(&self) -> Result<(), PostblendError> {
        Ok(())
    }
}

/// A constructed plugin, tagged with the contract it satisfies.
#[derive(Clone)]
pub enum PluginInstance {
    Platform(Arc<dyn PlatformPlugin>),
    Generic(Arc<dyn Plugin>),
}

impl PluginInstance {
    pub fn descriptor(&self) -> &PluginDescriptor {
        match self {
            PluginInstance::Platform(p) => p.descriptor(),
            PluginInstance::Generic(p) => p.descriptor(),
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor().id
    }

    pub fn capability(&self) -> Capability {
        match self {
            PluginInstance::Platform(_) => Capability::Platform,
            PluginInstance::Generic(_) => Capability::Generic,
        }
    }

    /// The platform contract, if this plugin implements it.
    pub fn as_platform(&self) -> Option<&Arc<dyn PlatformPlugin>> {
        match self {
            PluginInstance::Platform(p) => Some(p),
            PluginInstance::Generic(_) => None,
        }
    }

    pub async fn initialize(&self) -> Result<(), PostblendError> {
        match self {
            PluginInstance::Platform(p) => p.initialize().await,
            PluginInstance::Generic(p) => p.initialize().await,
        }
    }
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("id", &self.id())
            .field("capability", &self.capability())
            .finish()
    }
}
