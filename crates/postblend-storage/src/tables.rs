// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generic CRUD over per-plugin tables whose columns are declared at runtime.
//!
//! Every plugin owns exactly one table, `<plugin_id>_data`, with an
//! autoincrement `id` followed by the columns it declared. Column order for
//! inserts and updates always comes from the table itself, never from the
//! caller's record.

use postblend_core::{FieldDefinition, FieldValue, PostblendError, Record, RowId};
use tracing::{debug, info, warn};

use crate::database::Database;
use crate::schema::{self, ID_COLUMN, quote, query_records, table_columns, table_exists};

/// Handle to the dynamic tables of one store.
#[derive(Clone)]
pub struct DynamicTables {
    db: Database,
}

enum Mutation<T> {
    MissingTable,
    Done(T),
}

impl DynamicTables {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Whether `plugin_id` already has a table.
    pub async fn exists(&self, plugin_id: &str) -> Result<bool, PostblendError> {
        let table = schema::table_name(plugin_id)?;
        self.db.read(move |conn| table_exists(conn, &table)).await
    }

    /// Create the plugin's table from `fields`.
    ///
    /// Returns `false` without touching the store when `fields` is empty or the
    /// table already exists. An existing table is never altered, even if
    /// `fields` differs from the schema it was created with.
    pub async fn create(
        &self,
        plugin_id: &str,
        fields: &[FieldDefinition],
    ) -> Result<bool, PostblendError> {
        let table = schema::table_name(plugin_id)?;
        if fields.is_empty() {
            debug!(plugin_id, "no fields declared, skipping table creation");
            return Ok(false);
        }
        let ddl = schema::create_table_sql(&table, fields)?;

        let created = self
            .db
            .write(move |tx| {
                if table_exists(tx, &table)? {
                    return Ok(false);
                }
                tx.execute(&ddl, [])?;
                Ok(true)
            })
            .await?;

        if created {
            info!(plugin_id, columns = fields.len(), "created plugin table");
        } else {
            debug!(plugin_id, "plugin table already exists");
        }
        Ok(created)
    }

    /// Drop the plugin's table if present.
    ///
    /// `users` is refused with [`PostblendError::ReservedTable`] whatever the
    /// caller passes, so the system table can never be dropped through here.
    pub async fn drop_table(&self, plugin_id: &str) -> Result<(), PostblendError> {
        let table = schema::table_name(plugin_id)?;
        let sql = format!("DROP TABLE IF EXISTS {}", quote(&table));
        self.db
            .write(move |tx| {
                tx.execute(&sql, [])?;
                Ok(())
            })
            .await?;
        info!(plugin_id, "dropped plugin table");
        Ok(())
    }

    /// Physical column names in declaration order. Empty if the table is absent.
    pub async fn columns(&self, plugin_id: &str) -> Result<Vec<String>, PostblendError> {
        let table = schema::table_name(plugin_id)?;
        self.db.read(move |conn| table_columns(conn, &table)).await
    }

    /// Every row, ordered by id.
    pub async fn read_all(&self, plugin_id: &str) -> Result<Vec<Record>, PostblendError> {
        let table = schema::table_name(plugin_id)?;
        self.db
            .read(move |conn| {
                if !table_exists(conn, &table)? {
                    return Ok(Vec::new());
                }
                let sql = format!(
                    "SELECT * FROM {} ORDER BY {}",
                    quote(&table),
                    quote(ID_COLUMN)
                );
                query_records(conn, &sql, &[])
            })
            .await
    }

    /// The row with `row_id`, or `None`.
    pub async fn read_one(
        &self,
        plugin_id: &str,
        row_id: RowId,
    ) -> Result<Option<Record>, PostblendError> {
        let table = schema::table_name(plugin_id)?;
        self.db
            .read(move |conn| {
                if !table_exists(conn, &table)? {
                    return Ok(None);
                }
                let sql = format!(
                    "SELECT * FROM {} WHERE {} = ?1",
                    quote(&table),
                    quote(ID_COLUMN)
                );
                Ok(query_records(conn, &sql, &[FieldValue::Integer(row_id)])?
                    .into_iter()
                    .next())
            })
            .await
    }

    /// Rows whose `field` equals `value`, ordered by id.
    ///
    /// A `field` that is a valid identifier but not a column of the table
    /// matches nothing.
    pub async fn read_matching(
        &self,
        plugin_id: &str,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<Vec<Record>, PostblendError> {
        let table = schema::table_name(plugin_id)?;
        schema::validate_identifier("column name", field)?;
        let field = field.to_string();
        let value = value.into();
        self.db
            .read(move |conn| {
                let columns = table_columns(conn, &table)?;
                if !columns.iter().any(|c| c.eq_ignore_ascii_case(&field)) {
                    return Ok(Vec::new());
                }
                let sql = format!(
                    "SELECT * FROM {} WHERE {} = ?1 ORDER BY {}",
                    quote(&table),
                    quote(&field),
                    quote(ID_COLUMN)
                );
                query_records(conn, &sql, &[value])
            })
            .await
    }

    /// Insert a row and return its id, or `None` when `values` is empty.
    ///
    /// Declared columns missing from `values` are stored as their default
    /// (NULL unless the column declares one). A caller-supplied `id` and keys
    /// that are not columns of the table are ignored.
    pub async fn insert(
        &self,
        plugin_id: &str,
        values: Record,
    ) -> Result<Option<RowId>, PostblendError> {
        let table = schema::table_name(plugin_id)?;
        if values.is_empty() {
            debug!(plugin_id, "empty insert ignored");
            return Ok(None);
        }
        if values.keys().any(|k| k.eq_ignore_ascii_case(ID_COLUMN)) {
            warn!(plugin_id, "ignoring caller-supplied id on insert");
        }

        let outcome = self
            .db
            .write(move |tx| {
                let columns = table_columns(tx, &table)?;
                if columns.is_empty() {
                    return Ok(Mutation::MissingTable);
                }

                let (names, params) = pick_columns(&columns, &values);
                let sql = if names.is_empty() {
                    format!("INSERT INTO {} DEFAULT VALUES", quote(&table))
                } else {
                    let placeholders: Vec<String> =
                        (1..=names.len()).map(|i| format!("?{i}")).collect();
                    format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        quote(&table),
                        names.join(", "),
                        placeholders.join(", ")
                    )
                };
                tx.execute(
                    &sql,
                    rusqlite::params_from_iter(params.iter().map(schema::to_sql)),
                )?;
                Ok(Mutation::Done(tx.last_insert_rowid()))
            })
            .await?;

        match outcome {
            Mutation::Done(id) => {
                debug!(plugin_id, row_id = id, "inserted row");
                Ok(Some(id))
            }
            Mutation::MissingTable => Err(missing_table(plugin_id)),
        }
    }

    /// Set only the supplied columns of row `row_id`. Empty `values`, or values
    /// naming no known column, leave the row untouched.
    pub async fn update(
        &self,
        plugin_id: &str,
        row_id: RowId,
        values: Record,
    ) -> Result<(), PostblendError> {
        let table = schema::table_name(plugin_id)?;
        if values.is_empty() {
            debug!(plugin_id, row_id, "empty update ignored");
            return Ok(());
        }

        let outcome = self
            .db
            .write(move |tx| {
                let columns = table_columns(tx, &table)?;
                if columns.is_empty() {
                    return Ok(Mutation::MissingTable);
                }

                let (names, mut params) = pick_columns(&columns, &values);
                if names.is_empty() {
                    return Ok(Mutation::Done(0));
                }
                let assignments: Vec<String> = names
                    .iter()
                    .enumerate()
                    .map(|(i, name)| format!("{name} = ?{}", i + 1))
                    .collect();
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = ?{}",
                    quote(&table),
                    assignments.join(", "),
                    quote(ID_COLUMN),
                    names.len() + 1
                );
                params.push(FieldValue::Integer(row_id));
                let changed = tx.execute(
                    &sql,
                    rusqlite::params_from_iter(params.iter().map(schema::to_sql)),
                )?;
                Ok(Mutation::Done(changed))
            })
            .await?;

        match outcome {
            Mutation::Done(changed) => {
                debug!(plugin_id, row_id, changed, "updated row");
                Ok(())
            }
            Mutation::MissingTable => Err(missing_table(plugin_id)),
        }
    }

    /// Remove row `row_id`. Absent rows and absent tables are not errors.
    pub async fn delete(&self, plugin_id: &str, row_id: RowId) -> Result<(), PostblendError> {
        let table = schema::table_name(plugin_id)?;
        let removed = self
            .db
            .write(move |tx| {
                if !table_exists(tx, &table)? {
                    return Ok(0);
                }
                let sql = format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    quote(&table),
                    quote(ID_COLUMN)
                );
                tx.execute(&sql, [row_id])
            })
            .await?;
        debug!(plugin_id, row_id, removed, "deleted row");
        Ok(())
    }
}

/// Quoted column names and values of `values`, in the table's column order.
/// Keys match columns case-insensitively, like SQLite identifiers. Skips `id`
/// and keys that are not columns.
fn pick_columns(columns: &[String], values: &Record) -> (Vec<String>, Vec<FieldValue>) {
    columns
        .iter()
        .filter(|c| !c.eq_ignore_ascii_case(ID_COLUMN))
        .filter_map(|c| {
            values
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(c))
                .map(|(_, v)| (quote(c), v.clone()))
        })
        .unzip()
}

fn missing_table(plugin_id: &str) -> PostblendError {
    PostblendError::Schema(format!("plugin `{plugin_id}` has no table"))
}

#[cfg(test)]
mod tests {
    use postblend_core::FieldType;

    use super::*;

    async fn tables() -> DynamicTables {
        DynamicTables::new(Database::open_in_memory().await.unwrap())
    }

    fn account_fields() -> Vec<FieldDefinition> {
        vec![
            FieldDefinition::new("name", FieldType::Text),
            FieldDefinition::new("username", FieldType::Text).not_null(),
            FieldDefinition::new("password", FieldType::Text),
        ]
    }

    #[tokio::test]
    async fn create_then_exists() {
        let t = tables().await;
        assert!(!t.exists("echo").await.unwrap());
        assert!(t.create("echo", &account_fields()).await.unwrap());
        assert!(t.exists("echo").await.unwrap());
        assert_eq!(
            t.columns("echo").await.unwrap(),
            vec!["id", "name", "username", "password"]
        );
    }

    #[tokio::test]
    async fn create_is_idempotent_by_id_not_schema() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();
        let other = vec![FieldDefinition::new("token", FieldType::Blob)];
        assert!(!t.create("echo", &other).await.unwrap());
        assert_eq!(
            t.columns("echo").await.unwrap(),
            vec!["id", "name", "username", "password"]
        );
    }

    #[tokio::test]
    async fn create_with_no_fields_is_a_noop() {
        let t = tables().await;
        assert!(!t.create("empty", &[]).await.unwrap());
        assert!(!t.exists("empty").await.unwrap());
    }

    #[tokio::test]
    async fn invalid_declarations_are_rejected() {
        let t = tables().await;
        let bad = vec![FieldDefinition::new("na me", FieldType::Text)];
        assert!(matches!(
            t.create("echo", &bad).await,
            Err(PostblendError::Schema(_))
        ));
        assert!(t.create("bad;id", &account_fields()).await.is_err());
        assert!(!t.exists("echo").await.unwrap());
    }

    #[tokio::test]
    async fn insert_then_read_one_leaves_other_columns_null() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();

        let values = Record::new().with("password", "hunter2").with("username", "zed");
        let id = t.insert("echo", values).await.unwrap().unwrap();

        let row = t.read_one("echo", id).await.unwrap().unwrap();
        let keys: Vec<&str> = row.keys().collect();
        assert_eq!(keys, vec!["id", "name", "username", "password"]);
        assert_eq!(row.id(), Some(id));
        assert_eq!(row.get("username"), Some(&FieldValue::from("zed")));
        assert_eq!(row.get("password"), Some(&FieldValue::from("hunter2")));
        assert_eq!(row.get("name"), Some(&FieldValue::Null));
    }

    #[tokio::test]
    async fn insert_ignores_caller_id_and_unknown_keys() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();

        let values = Record::new()
            .with("id", 999)
            .with("username", "a")
            .with("nickname", "ignored");
        let id = t.insert("echo", values).await.unwrap().unwrap();
        assert_eq!(id, 1);
        assert!(t.read_one("echo", 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_applies_declared_defaults() {
        let t = tables().await;
        let fields = vec![
            FieldDefinition::new("name", FieldType::Text),
            FieldDefinition::new("retries", FieldType::Integer).default_value(3),
        ];
        t.create("retry", &fields).await.unwrap();

        let id = t
            .insert("retry", Record::new().with("name", "x"))
            .await
            .unwrap()
            .unwrap();
        let row = t.read_one("retry", id).await.unwrap().unwrap();
        assert_eq!(row.get("retries"), Some(&FieldValue::Integer(3)));
    }

    #[tokio::test]
    async fn empty_insert_is_a_noop() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();
        assert_eq!(t.insert("echo", Record::new()).await.unwrap(), None);
        assert!(t.read_all("echo").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_into_missing_table_is_an_error() {
        let t = tables().await;
        let result = t.insert("ghost", Record::new().with("name", "x")).await;
        assert!(matches!(result, Err(PostblendError::Schema(_))));
    }

    #[tokio::test]
    async fn insert_violating_constraint_is_a_storage_error() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();
        let result = t.insert("echo", Record::new().with("name", "no username")).await;
        assert!(matches!(result, Err(PostblendError::Storage { .. })));
        assert!(t.read_all("echo").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_leaves_untouched_columns() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();
        let id = t
            .insert(
                "echo",
                Record::new()
                    .with("name", "Main")
                    .with("username", "main")
                    .with("password", "old"),
            )
            .await
            .unwrap()
            .unwrap();

        t.update("echo", id, Record::new().with("password", "new"))
            .await
            .unwrap();

        let row = t.read_one("echo", id).await.unwrap().unwrap();
        assert_eq!(row.get("name"), Some(&FieldValue::from("Main")));
        assert_eq!(row.get("username"), Some(&FieldValue::from("main")));
        assert_eq!(row.get("password"), Some(&FieldValue::from("new")));
    }

    #[tokio::test]
    async fn empty_update_is_a_noop() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();
        let id = t
            .insert("echo", Record::new().with("username", "u"))
            .await
            .unwrap()
            .unwrap();
        t.update("echo", id, Record::new()).await.unwrap();
        t.update("echo", id, Record::new().with("unknown", 1))
            .await
            .unwrap();
        let row = t.read_one("echo", id).await.unwrap().unwrap();
        assert_eq!(row.get("username"), Some(&FieldValue::from("u")));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();
        let id = t
            .insert("echo", Record::new().with("username", "u"))
            .await
            .unwrap()
            .unwrap();

        t.delete("echo", id).await.unwrap();
        assert!(t.read_one("echo", id).await.unwrap().is_none());
        t.delete("echo", id).await.unwrap();
        t.delete("ghost", 1).await.unwrap();
    }

    #[tokio::test]
    async fn plugin_ids_differing_in_case_share_one_table() {
        let t = tables().await;
        assert!(t.create("Echo", &account_fields()).await.unwrap());
        assert!(!t.create("echo", &account_fields()).await.unwrap());
        assert!(t.exists("echo").await.unwrap());

        let id = t
            .insert("echo", Record::new().with("username", "lower"))
            .await
            .unwrap()
            .unwrap();
        let row = t.read_one("echo", id).await.unwrap().unwrap();
        assert_eq!(row.get("username"), Some(&FieldValue::from("lower")));
        assert_eq!(t.read_all("Echo").await.unwrap().len(), 1);
        assert_eq!(t.read_all("echo").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn record_keys_match_columns_ignoring_case() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();
        let id = t
            .insert(
                "echo",
                Record::new().with("NAME", "a").with("UserName", "u").with("ID", 42),
            )
            .await
            .unwrap()
            .unwrap();
        assert_ne!(id, 42);

        t.update("echo", id, Record::new().with("NAME", "b"))
            .await
            .unwrap();
        let row = t.read_one("echo", id).await.unwrap().unwrap();
        assert_eq!(row.get("name"), Some(&FieldValue::from("b")));
        assert_eq!(row.get("username"), Some(&FieldValue::from("u")));
        assert_eq!(t.read_matching("echo", "NAME", "b").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn drop_refuses_reserved_table() {
        let t = tables().await;
        assert!(matches!(
            t.drop_table("users").await,
            Err(PostblendError::ReservedTable(_))
        ));
        let rows = t
            .database()
            .execute("SELECT count(*) AS n FROM users", Vec::new())
            .await
            .unwrap();
        assert_eq!(rows[0].get("n"), Some(&FieldValue::Integer(0)));
    }

    #[tokio::test]
    async fn drop_removes_table() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();
        t.drop_table("echo").await.unwrap();
        assert!(!t.exists("echo").await.unwrap());
        t.drop_table("echo").await.unwrap();
    }

    #[tokio::test]
    async fn reads_against_absent_table_are_empty() {
        let t = tables().await;
        assert!(t.read_all("ghost").await.unwrap().is_empty());
        assert!(t.read_one("ghost", 1).await.unwrap().is_none());
        assert!(t.read_matching("ghost", "name", "x").await.unwrap().is_empty());
        assert!(t.columns("ghost").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_matching_filters_by_column() {
        let t = tables().await;
        t.create("echo", &account_fields()).await.unwrap();
        for (name, user) in [("A", "a"), ("B", "b"), ("A", "c")] {
            t.insert("echo", Record::new().with("name", name).with("username", user))
                .await
                .unwrap();
        }

        let rows = t.read_matching("echo", "name", "A").await.unwrap();
        let users: Vec<&str> = rows
            .iter()
            .filter_map(|r| r.get("username").and_then(FieldValue::as_text))
            .collect();
        assert_eq!(users, vec!["a", "c"]);

        assert!(t.read_matching("echo", "nope", "A").await.unwrap().is_empty());
        assert!(t.read_matching("echo", "name = 1 OR 1", "A").await.is_err());
    }
}
