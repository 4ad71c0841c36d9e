// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Postblend integration tests.
//!
//! Provides mock plugins and test harness infrastructure for fast,
//! deterministic tests without external platforms.
//!
//! # Components
//!
//! - [`MockPlatformPlugin`] - In-memory platform plugin with fault injection
//! - [`MockFactory`] - Factory producing mock plugins from manifests
//! - [`TestHarness`] - Temp store, plugin root and registry in one place

pub mod harness;
pub mod mock_platform;

use postblend_core::PluginInstance;
use postblend_plugin::PluginRegistry;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_platform::{MockFactory, MockPlatformPlugin};

/// Registry already holding `plugins`, bypassing discovery.
///
/// # Panics
///
/// Panics if two plugins share an id.
pub fn registry_with(plugins: Vec<PluginInstance>) -> PluginRegistry {
    let registry = PluginRegistry::new();
    registry
        .replace_all(plugins)
        .expect("plugin ids must be unique");
    registry
}
