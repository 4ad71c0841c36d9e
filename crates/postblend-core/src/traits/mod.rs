// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contract traits every plugin implements.
//!
//! All plugins extend the [`Plugin`] base trait; plugins that publish content
//! and manage accounts additionally implement [`PlatformPlugin`]. Both use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod platform;
pub mod plugin;

pub use platform::PlatformPlugin;
pub use plugin::{Plugin, PluginInstance};
