// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Statically registered plugin constructors.

use postblend_core::{Capability, PluginDescriptor, PluginInstance, PostblendError};
use postblend_storage::DynamicTables;

/// Shared services handed to every factory.
#[derive(Clone)]
pub struct PluginContext {
    /// Dynamic table manager plugins persist their accounts through.
    pub tables: DynamicTables,
}

impl PluginContext {
    pub fn new(tables: DynamicTables) -> Self {
        Self { tables }
    }
}

/// Factory trait for creating plugin instances named by manifest entries.
///
/// Factories are registered with the [`crate::PluginRegistry`] before
/// discovery; a manifest entry qualifies only if its `factory` key names one.
pub trait PluginFactory: Send + Sync {
    /// Name manifests refer to through their `factory` key.
    fn name(&self) -> &str;

    /// The contract instances built by this factory satisfy.
    fn capability(&self) -> Capability;

    /// Build a plugin from its manifest metadata.
    fn create(
        &self,
        descriptor: PluginDescriptor,
        ctx: &PluginContext,
    ) -> Result<PluginInstance, PostblendError>;
}
