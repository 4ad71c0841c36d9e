// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Identifier validation, DDL composition, and value conversion for dynamic tables.
//!
//! Identifiers cannot be bound as statement parameters, so every table and
//! column name that reaches SQL text goes through [`validate_identifier`] and
//! is double-quoted. Values always travel as bound parameters.

use std::sync::LazyLock;

use postblend_core::{FieldConstraint, FieldDefinition, FieldValue, PostblendError, Record};
use regex::Regex;
use rusqlite::types::Value;

/// Table reserved for the user-authentication subsystem.
pub const RESERVED_TABLE: &str = "users";

/// Autoincrement primary key present in every plugin table.
pub const ID_COLUMN: &str = "id";

/// Suffix appended to a plugin id to name its table.
pub const TABLE_SUFFIX: &str = "_data";

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap());

/// Reject anything that is not a plain SQL identifier.
pub fn validate_identifier(kind: &str, name: &str) -> Result<(), PostblendError> {
    if !IDENTIFIER.is_match(name) {
        return Err(PostblendError::Schema(format!(
            "invalid {kind} `{name}`: must match [A-Za-z_][A-Za-z0-9_]*"
        )));
    }
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(PostblendError::Schema(format!(
            "invalid {kind} `{name}`: the sqlite_ prefix is reserved"
        )));
    }
    Ok(())
}

/// Name of the table holding `plugin_id`'s data.
pub fn table_name(plugin_id: &str) -> Result<String, PostblendError> {
    validate_identifier("plugin id", plugin_id)?;
    if plugin_id.eq_ignore_ascii_case(RESERVED_TABLE) {
        return Err(PostblendError::ReservedTable(RESERVED_TABLE.to_string()));
    }
    Ok(format!("{plugin_id}{TABLE_SUFFIX}"))
}

/// Double-quote an identifier that already passed [`validate_identifier`].
pub(crate) fn quote(ident: &str) -> String {
    format!("\"{ident}\"")
}

/// Compose the `CREATE TABLE` statement for a plugin table.
///
/// The `id` column always comes first, followed by `fields` in declaration order.
pub fn create_table_sql(table: &str, fields: &[FieldDefinition]) -> Result<String, PostblendError> {
    validate_identifier("table name", table)?;

    let mut seen: Vec<String> = vec![ID_COLUMN.to_string()];
    let mut columns = vec![format!(
        "{} INTEGER PRIMARY KEY AUTOINCREMENT",
        quote(ID_COLUMN)
    )];

    for field in fields {
        validate_identifier("column name", &field.name)?;
        let lowered = field.name.to_ascii_lowercase();
        if seen.contains(&lowered) {
            return Err(PostblendError::Schema(format!(
                "duplicate or reserved column `{}` in table `{table}`",
                field.name
            )));
        }
        seen.push(lowered);

        let mut column = format!("{} {}", quote(&field.name), field.field_type);
        for constraint in &field.constraints {
            column.push(' ');
            column.push_str(&render_constraint(constraint));
        }
        columns.push(column);
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(table),
        columns.join(", ")
    ))
}

fn render_constraint(constraint: &FieldConstraint) -> String {
    match constraint {
        FieldConstraint::NotNull => "NOT NULL".to_string(),
        FieldConstraint::Unique => "UNIQUE".to_string(),
        FieldConstraint::Default(value) => format!("DEFAULT {}", render_literal(value)),
    }
}

fn render_literal(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "NULL".to_string(),
        FieldValue::Integer(i) => i.to_string(),
        FieldValue::Real(r) => format!("{r:?}"),
        FieldValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
        FieldValue::Blob(b) => format!("X'{}'", hex::encode(b)),
    }
}

pub(crate) fn to_sql(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(i) => Value::Integer(*i),
        FieldValue::Real(r) => Value::Real(*r),
        FieldValue::Text(s) => Value::Text(s.clone()),
        FieldValue::Blob(b) => Value::Blob(b.clone()),
    }
}

pub(crate) fn from_sql(value: Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::Integer(i) => FieldValue::Integer(i),
        Value::Real(r) => FieldValue::Real(r),
        Value::Text(s) => FieldValue::Text(s),
        Value::Blob(b) => FieldValue::Blob(b),
    }
}

/// Run `sql` with positional `params` and collect every row as a [`Record`]
/// in the statement's column order.
pub(crate) fn query_records(
    conn: &rusqlite::Connection,
    sql: &str,
    params: &[FieldValue],
) -> Result<Vec<Record>, rusqlite::Error> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    let mut rows = stmt.query(rusqlite::params_from_iter(params.iter().map(to_sql)))?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (i, name) in names.iter().enumerate() {
            record.insert(name.clone(), from_sql(row.get::<_, Value>(i)?));
        }
        records.push(record);
    }
    Ok(records)
}

/// SQLite resolves table names case-insensitively, so the lookup does too.
pub(crate) fn table_exists(conn: &rusqlite::Connection, table: &str) -> Result<bool, rusqlite::Error> {
    let count: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
        [table],
        |row| row.get(0),
    )?;
    Ok(count == 1)
}

/// Physical column names of `table`, in declaration order. Empty if the table is absent.
pub(crate) fn table_columns(
    conn: &rusqlite::Connection,
    table: &str,
) -> Result<Vec<String>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let names = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}
