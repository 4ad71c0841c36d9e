// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Postblend plugin host.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Postblend configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PostblendConfig {
    /// Store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Plugin discovery settings.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Publish fan-out settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("postblend").join("postblend.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("postblend.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Plugin discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginsConfig {
    /// Root directory scanned recursively for plugin manifests.
    #[serde(default = "default_plugins_root")]
    pub root: String,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            root: default_plugins_root(),
        }
    }
}

fn default_plugins_root() -> String {
    dirs::config_dir()
        .map(|p| p.join("postblend").join("plugins"))
        .unwrap_or_else(|| std::path::PathBuf::from("plugins"))
        .to_string_lossy()
        .into_owned()
}

/// Publish fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum number of (plugin, account) publish tasks running at once.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

fn default_max_concurrency() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
