// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Postblend application wiring: the long-lived context and the CLI commands
//! built on top of it.

pub mod commands;
pub mod context;

pub use context::Postblend;
