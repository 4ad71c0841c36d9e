// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Postblend plugin host.
//!
//! Provides one long-lived connection serialized through `tokio-rusqlite`,
//! embedded migrations for the reserved system tables, and schema-driven CRUD
//! over the per-plugin tables declared at runtime.

pub mod database;
pub mod migrations;
pub mod schema;
pub mod store;
pub mod tables;

pub use database::Database;
pub use schema::{ID_COLUMN, RESERVED_TABLE, TABLE_SUFFIX};
pub use store::Store;
pub use tables::DynamicTables;
