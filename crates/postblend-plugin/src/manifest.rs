// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin manifest parsing from `*.toml` files.
//!
//! A manifest file may export any number of plugins as `[[plugin]]` entries.
//! Each entry names the factory that constructs it; `factory` defaults to the
//! entry's `id`.

use chrono::NaiveDate;
use postblend_core::{Capability, PluginDescriptor, PluginVersion, PostblendError};
use serde::Deserialize;

/// One `[[plugin]]` entry of a manifest file.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub id: String,
    /// Name of the registered factory that builds this plugin.
    pub factory: String,
    pub name: String,
    pub description: String,
    pub author: Option<String>,
    pub author_url: Option<String>,
    pub plugin_url: Option<String>,
    pub version: PluginVersion,
    pub release_date: Option<NaiveDate>,
}

impl ManifestEntry {
    /// Descriptor for the loaded plugin, tagged with what its factory builds.
    pub fn descriptor(&self, capability: Capability) -> PluginDescriptor {
        PluginDescriptor {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            author: self.author.clone(),
            author_url: self.author_url.clone(),
            plugin_url: self.plugin_url.clone(),
            version: self.version,
            release_date: self.release_date,
            capability,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestFile {
    #[serde(default)]
    plugin: Vec<PluginSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PluginSection {
    id: String,
    factory: Option<String>,
    name: Option<String>,
    #[serde(default)]
    description: String,
    author: Option<String>,
    author_url: Option<String>,
    plugin_url: Option<String>,
    version: String,
    release_date: Option<NaiveDate>,
}

/// Parse every `[[plugin]]` entry of a manifest.
///
/// `source` names the file in error messages. A file without entries is valid
/// and yields nothing.
pub fn parse_manifest(toml_content: &str, source: &str) -> Result<Vec<ManifestEntry>, PostblendError> {
    let file: ManifestFile = toml::from_str(toml_content)
        .map_err(|e| PostblendError::Discovery(format!("invalid plugin manifest {source}: {e}")))?;

    file.plugin
        .into_iter()
        .map(|section| {
            if section.id.trim().is_empty() {
                return Err(PostblendError::Discovery(format!(
                    "plugin manifest {source}: id must not be empty"
                )));
            }
            let version = section.version.parse::<PluginVersion>().map_err(|e| {
                PostblendError::Discovery(format!(
                    "plugin manifest {source}: plugin `{}`: {e}",
                    section.id
                ))
            })?;
            Ok(ManifestEntry {
                factory: section.factory.unwrap_or_else(|| section.id.clone()),
                name: section.name.unwrap_or_else(|| section.id.clone()),
                id: section.id,
                description: section.description,
                author: section.author,
                author_url: section.author_url,
                plugin_url: section.plugin_url,
                version,
                release_date: section.release_date,
            })
        })
        .collect()
}
