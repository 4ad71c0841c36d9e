// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Postblend plugin host.

use thiserror::Error;

/// The primary error type used across all Postblend crates and the plugin contract.
#[derive(Debug, Error)]
pub enum PostblendError {
    /// Configuration errors (invalid TOML, conflicting settings, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection, query failure, migration failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A plugin-declared schema was rejected (bad identifier, type or constraint).
    #[error("schema error: {0}")]
    Schema(String),

    /// An operation tried to touch the reserved system table.
    #[error("refusing to modify reserved table `{0}`")]
    ReservedTable(String),

    /// Requested plugin is not present in the registry.
    #[error("plugin not found: {0}")]
    PluginNotFound(String),

    /// Plugin discovery was aborted.
    #[error("plugin discovery failed: {0}")]
    Discovery(String),

    /// Fault raised from inside a plugin's own logic.
    #[error("plugin `{plugin_id}` failed: {message}")]
    Plugin {
        plugin_id: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PostblendError {
    /// Shorthand for a plugin fault without an underlying source.
    pub fn plugin(plugin_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin_id: plugin_id.into(),
            message: message.into(),
            source: None,
        }
    }
}
