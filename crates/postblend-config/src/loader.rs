// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./postblend.toml` > `~/.config/postblend/postblend.toml`
//! > `/etc/postblend/postblend.toml` with environment variable overrides via
//! the `POSTBLEND_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::PostblendConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/postblend/postblend.toml` (system-wide)
/// 3. `~/.config/postblend/postblend.toml` (user XDG config)
/// 4. `./postblend.toml` (local directory)
/// 5. `POSTBLEND_*` environment variables
pub fn load_config() -> Result<PostblendConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PostblendConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PostblendConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PostblendConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PostblendConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PostblendConfig::default()))
        .merge(Toml::file("/etc/postblend/postblend.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("postblend/postblend.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("postblend.toml"))
        .merge(env_provider())
}

/// Environment provider mapping `POSTBLEND_<SECTION>_<KEY>` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")` so keys containing
/// underscores (`database_path`, `max_concurrency`) stay intact.
fn env_provider() -> Env {
    Env::prefixed("POSTBLEND_").map(|key| {
        let mapped = key
            .as_str()
            .to_ascii_lowercase()
            .replacen("storage_", "storage.", 1)
            .replacen("plugins_", "plugins.", 1)
            .replacen("dispatch_", "dispatch.", 1)
            .replacen("logging_", "logging.", 1);
        mapped.into()
    })
}
