// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin discovery, manifest parser, and registry.
//!
//! Plugins are described by `*.toml` manifests under the configured plugin
//! root and constructed through factories registered ahead of discovery.
//! The registry holds the resulting set and swaps it wholesale on every
//! discovery call.

pub mod builtin;
pub mod discovery;
pub mod factory;
pub mod manifest;
pub mod registry;

pub use builtin::{ECHO_MANIFEST, builtin_factories};
pub use factory::{PluginContext, PluginFactory};
pub use manifest::{ManifestEntry, parse_manifest};
pub use registry::{PluginRegistry, PluginSet};
