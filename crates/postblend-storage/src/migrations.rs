// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedded migrations for the reserved system tables.
//!
//! SQL files under `migrations/` are compiled into the binary via
//! `embed_migrations!`. Plugin tables are never created here; they are
//! declared at runtime through [`crate::tables::DynamicTables`].

use postblend_core::PostblendError;

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

/// Apply every pending migration. Returns how many were applied.
///
/// Refinery tracks applied migrations in `refinery_schema_history`, so this is
/// a no-op on a store that was provisioned before.
pub fn run_migrations(conn: &mut rusqlite::Connection) -> Result<usize, PostblendError> {
    let report = embedded::migrations::runner()
        .run(conn)
        .map_err(|e| PostblendError::Storage {
            source: Box::new(e),
        })?;
    Ok(report.applied_migrations().len())
}
