// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Publish dispatcher for the Postblend plugin host.
//!
//! Fans one post out to many (plugin, account) targets and aggregates one
//! independent result per target.

pub mod dispatcher;

pub use dispatcher::Dispatcher;
