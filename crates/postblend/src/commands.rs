// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI command implementations.
//!
//! Each `run_*` function performs one operation against the context and
//! prints its outcome, either as plain text or as JSON for scripting.

use std::collections::BTreeSet;
use std::io::IsTerminal;
use std::path::Path;

use postblend_core::{
    AccountId, FieldValue, PlatformAccount, PluginDescriptor, Post, PostResultStatus,
    PostblendError, PublishResults, Record, Targets,
};
use postblend_plugin::ECHO_MANIFEST;
use serde::Serialize;
use tracing::info;

use crate::context::Postblend;

/// Parse a `plugin=1,2,3` publish target.
pub fn parse_target(s: &str) -> Result<(String, BTreeSet<AccountId>), String> {
    let (plugin, ids) = s
        .split_once('=')
        .ok_or_else(|| format!("expected PLUGIN=ID[,ID...], got `{s}`"))?;
    let plugin = plugin.trim();
    if plugin.is_empty() {
        return Err(format!("missing plugin id in `{s}`"));
    }
    let ids = ids
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<AccountId>()
                .map_err(|_| format!("invalid account id `{id}` in `{s}`"))
        })
        .collect::<Result<BTreeSet<_>, _>>()?;
    Ok((plugin.to_string(), ids))
}

/// Parse a `column=value` assignment. Integers and reals keep their type,
/// `null` is NULL, anything else is text.
pub fn parse_assignment(s: &str) -> Result<(String, FieldValue), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in `{s}`"));
    }
    let value = if value.eq_ignore_ascii_case("null") {
        FieldValue::Null
    } else if let Ok(i) = value.parse::<i64>() {
        FieldValue::Integer(i)
    } else if let Ok(r) = value.parse::<f64>()
        && r.is_finite()
    {
        FieldValue::Real(r)
    } else {
        FieldValue::Text(value.to_string())
    };
    Ok((key.to_string(), value))
}

/// Merge repeated `--target` flags; later flags for the same plugin add ids.
pub fn collect_targets(targets: Vec<(String, BTreeSet<AccountId>)>) -> Targets {
    let mut merged = Targets::new();
    for (plugin, ids) in targets {
        merged.entry(plugin).or_default().extend(ids);
    }
    merged
}

/// Write the echo manifest into the plugin root unless one already exists.
pub fn run_init(root: &Path) -> Result<(), PostblendError> {
    let path = root.join("echo.toml");
    if path.exists() {
        println!("  {} already exists", path.display());
        return Ok(());
    }
    std::fs::create_dir_all(root)
        .and_then(|()| std::fs::write(&path, ECHO_MANIFEST))
        .map_err(|e| PostblendError::Internal(format!("cannot write {}: {e}", path.display())))?;
    info!(path = %path.display(), "wrote echo manifest");
    println!("  wrote {}", path.display());
    Ok(())
}

#[derive(Debug, Serialize)]
struct PluginRow<'a> {
    id: &'a str,
    name: &'a str,
    version: String,
    capability: String,
    author: Option<&'a str>,
    description: &'a str,
}

impl<'a> From<&'a PluginDescriptor> for PluginRow<'a> {
    fn from(d: &'a PluginDescriptor) -> Self {
        Self {
            id: &d.id,
            name: &d.name,
            version: d.display_version(),
            capability: d.capability.to_string(),
            author: d.author.as_deref(),
            description: &d.description,
        }
    }
}

/// Render loaded plugins as an aligned text listing.
pub fn format_plugins(plugins: &[PluginDescriptor]) -> String {
    if plugins.is_empty() {
        return "  no plugins loaded\n".to_string();
    }
    let width = plugins.iter().map(|p| p.id.len()).max().unwrap_or(0);
    let mut out = String::new();
    for p in plugins {
        out.push_str(&format!(
            "  {:<width$}  {:<8}  {:<9}  {}\n",
            p.id,
            p.display_version(),
            p.capability.to_string(),
            p.name
        ));
    }
    out
}

pub async fn run_plugins(app: &Postblend, json: bool) -> Result<(), PostblendError> {
    let plugins = app.registry().list();
    if json {
        let rows: Vec<PluginRow<'_>> = plugins.iter().map(PluginRow::from).collect();
        print_json(&rows);
    } else {
        print!("{}", format_plugins(&plugins));
    }
    Ok(())
}

/// Render accounts as `id  name  column=value...` lines.
pub fn format_accounts(accounts: &[PlatformAccount]) -> String {
    if accounts.is_empty() {
        return "  no accounts\n".to_string();
    }
    let mut out = String::new();
    for account in accounts {
        let details: Vec<String> = account
            .details
            .iter()
            .filter(|(k, _)| *k != "id" && *k != "name")
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        out.push_str(&format!(
            "  {:>4}  {}  {}\n",
            account.id,
            account.name,
            details.join(" ")
        ));
    }
    out
}

pub async fn run_accounts(app: &Postblend, plugin_id: &str, json: bool) -> Result<(), PostblendError> {
    let accounts = app.platform(plugin_id)?.accounts().await?;
    if json {
        print_json(&accounts);
    } else {
        print!("{}", format_accounts(&accounts));
    }
    Ok(())
}

pub async fn run_add_account(
    app: &Postblend,
    plugin_id: &str,
    values: Vec<(String, FieldValue)>,
) -> Result<AccountId, PostblendError> {
    let details: Record = values.into_iter().collect();
    let id = app.platform(plugin_id)?.add_account(details).await?;
    info!(plugin_id, account_id = id, "account added");
    println!("  added account {id} to {plugin_id}");
    Ok(id)
}

pub async fn run_update_account(
    app: &Postblend,
    plugin_id: &str,
    id: AccountId,
    values: Vec<(String, FieldValue)>,
) -> Result<(), PostblendError> {
    let details: Record = values.into_iter().collect();
    app.platform(plugin_id)?.update_account(id, details).await?;
    println!("  updated account {id} of {plugin_id}");
    Ok(())
}

pub async fn run_delete_account(
    app: &Postblend,
    plugin_id: &str,
    id: AccountId,
) -> Result<(), PostblendError> {
    app.platform(plugin_id)?.delete_account(id).await?;
    println!("  deleted account {id} of {plugin_id}");
    Ok(())
}

/// Render per-target outcomes, one line per (plugin, account).
pub fn format_results(results: &PublishResults, use_color: bool) -> String {
    if results.is_empty() {
        return "  no targets\n".to_string();
    }
    let mut out = String::new();
    for (plugin_id, accounts) in results {
        for (account_id, result) in accounts {
            let status = if use_color {
                use colored::Colorize;
                match result.status {
                    PostResultStatus::Success => result.status.to_string().green().to_string(),
                    _ => result.status.to_string().red().to_string(),
                }
            } else {
                result.status.to_string()
            };
            out.push_str(&format!("  {plugin_id}/{account_id}  {status}"));
            if !result.is_success() && !result.payload.is_null() {
                out.push_str(&format!("  {}", result.payload));
            }
            out.push('\n');
        }
    }
    out
}

/// Publish to `targets`, or to every account of every platform plugin when
/// no target was given.
pub async fn run_publish(
    app: &Postblend,
    post: Post,
    targets: Targets,
    json: bool,
    plain: bool,
) -> Result<PublishResults, PostblendError> {
    let results = if targets.is_empty() {
        app.dispatcher().publish_to_all(&post).await
    } else {
        app.dispatcher().publish(&post, &targets).await
    };
    if json {
        print_json(&results);
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print!("{}", format_results(&results, use_color));
    }
    Ok(results)
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}
