// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugins compiled into the Postblend binary.

pub mod echo;

use std::sync::Arc;

use crate::factory::PluginFactory;

pub use echo::{ECHO_FACTORY, EchoFactory, EchoPlugin};

/// Manifest exporting the echo plugin, written by `postblend init`.
pub const ECHO_MANIFEST: &str = r#"[[plugin]]
id = "echo"
factory = "echo"
name = "Echo"
description = "Reference platform plugin that echoes posts back"
author = "Postblend Contributors"
version = "0.1.0"
"#;

/// Factories for every built-in plugin.
pub fn builtin_factories() -> Vec<Arc<dyn PluginFactory>> {
    let echo: Arc<dyn PluginFactory> = Arc::new(EchoFactory);
    vec![echo]
}
