// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Postblend plugin host.
//!
//! This crate provides the plugin contract traits, the error type, and the
//! common types (posts, results, records, schema declarations) shared by the
//! store, the plugin registry, and the dispatcher. Every plugin implements
//! traits defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::PostblendError;
pub use traits::{PlatformPlugin, Plugin, PluginInstance};
pub use types::{
    AccountId, AccountResults, Capability, FieldConstraint, FieldDefinition, FieldType,
    FieldValue, PlatformAccount, PluginDescriptor, PluginId, PluginVersion, Post, PostResult,
    PostResultStatus, PublishResults, Record, RowId, Targets,
};
