// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Postblend - publish one post to many platforms.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use postblend::Postblend;
use postblend::commands::{self, parse_assignment, parse_target};
use postblend_config::PostblendConfig;
use postblend_core::{AccountId, FieldValue, Post, PostblendError};
use tracing::error;

/// Postblend - publish one post to many platforms.
#[derive(Parser, Debug)]
#[command(name = "postblend", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the built-in echo manifest into the plugin root.
    Init,
    /// List loaded plugins.
    Plugins {
        #[arg(long)]
        json: bool,
    },
    /// List the accounts of a platform plugin.
    Accounts {
        plugin: String,
        #[arg(long)]
        json: bool,
    },
    /// Add an account to a platform plugin.
    AddAccount {
        plugin: String,
        /// Column assignment, repeatable.
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        values: Vec<(String, FieldValue)>,
    },
    /// Change columns of an existing account.
    UpdateAccount {
        plugin: String,
        id: AccountId,
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
        values: Vec<(String, FieldValue)>,
    },
    /// Remove an account.
    DeleteAccount { plugin: String, id: AccountId },
    /// Publish a post. Without --target, every account of every platform plugin is used.
    Publish {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
        #[arg(long = "target", value_name = "PLUGIN=ID[,ID...]", value_parser = parse_target)]
        targets: Vec<(String, BTreeSet<AccountId>)>,
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => postblend_config::load_and_validate_path(path),
        None => postblend_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            postblend_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level);

    let Some(command) = cli.command else {
        println!("postblend: use --help for available commands");
        return;
    };

    if let Err(e) = run(command, config).await {
        error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: PostblendConfig) -> Result<(), PostblendError> {
    if let Commands::Init = command {
        return commands::run_init(Path::new(&config.plugins.root));
    }

    let app = Postblend::open(config).await?;
    let outcome = match command {
        Commands::Init => Ok(()),
        Commands::Plugins { json } => commands::run_plugins(&app, json).await,
        Commands::Accounts { plugin, json } => commands::run_accounts(&app, &plugin, json).await,
        Commands::AddAccount { plugin, values } => {
            commands::run_add_account(&app, &plugin, values).await.map(|_| ())
        }
        Commands::UpdateAccount { plugin, id, values } => {
            commands::run_update_account(&app, &plugin, id, values).await
        }
        Commands::DeleteAccount { plugin, id } => {
            commands::run_delete_account(&app, &plugin, id).await
        }
        Commands::Publish {
            title,
            body,
            targets,
            json,
            plain,
        } => commands::run_publish(
            &app,
            Post::new(title, body),
            commands::collect_targets(targets),
            json,
            plain,
        )
        .await
        .map(|_| ()),
    };
    app.close().await?;
    outcome
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "postblend={log_level},postblend_storage={log_level},postblend_plugin={log_level},postblend_dispatch={log_level},warn"
        ))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
