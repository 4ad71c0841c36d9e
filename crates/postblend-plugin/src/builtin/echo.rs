// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reference platform plugin that "publishes" by echoing the post back.
//!
//! Accounts live in the plugin's own dynamic table. Publishing succeeds for
//! every stored account and reports `BadAccount` for anything else.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use postblend_core::{
    AccountId, AccountResults, Capability, FieldDefinition, PlatformAccount,
    PlatformPlugin, Plugin, PluginDescriptor, PluginInstance, Post, PostResult, PostblendError,
    Record,
};
use postblend_storage::DynamicTables;
use serde_json::json;
use tracing::debug;

use crate::factory::{PluginContext, PluginFactory};

/// Factory name manifests use for the echo plugin.
pub const ECHO_FACTORY: &str = "echo";

/// Platform plugin storing accounts as `name`, `username`, `password` rows.
pub struct EchoPlugin {
    descriptor: PluginDescriptor,
    tables: DynamicTables,
}

impl EchoPlugin {
    pub fn new(descriptor: PluginDescriptor, tables: DynamicTables) -> Self {
        Self { descriptor, tables }
    }

    /// Columns of the echo account table.
    pub fn fields() -> Result<Vec<FieldDefinition>, PostblendError> {
        ACCOUNT_COLUMNS
            .iter()
            .map(|(name, ty, constraints)| FieldDefinition::parse(name, ty, constraints))
            .collect()
    }
}

/// `(name, type, constraints)` literals of the account table.
const ACCOUNT_COLUMNS: &[(&str, &str, &str)] = &[
    ("name", "TEXT", ""),
    ("username", "TEXT", "NOT NULL"),
    ("password", "TEXT", ""),
];

#[async_trait]
impl Plugin for EchoPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn initialize(&self) -> Result<(), PostblendError> {
        self.tables.create(self.id(), &Self::fields()?).await?;
        Ok(())
    }
}

#[async_trait]
impl PlatformPlugin for EchoPlugin {
    async fn publish(
        &self,
        post: &Post,
        account_ids: &BTreeSet<AccountId>,
    ) -> Result<AccountResults, PostblendError> {
        let mut results = AccountResults::new();
        for &id in account_ids {
            let result = match self.tables.read_one(self.id(), id).await? {
                Some(row) => {
                    let username = row
                        .get("username")
                        .and_then(|v| v.as_text())
                        .unwrap_or_default()
                        .to_string();
                    debug!(plugin_id = %self.id(), account_id = id, title = %post.title, "echo publish");
                    PostResult::success(json!({
                        "account": username,
                        "title": post.title,
                        "body": post.body,
                    }))
                }
                None => PostResult::bad_account(),
            };
            results.insert(id, result);
        }
        Ok(results)
    }

    async fn accounts(&self) -> Result<Vec<PlatformAccount>, PostblendError> {
        Ok(self
            .tables
            .read_all(self.id())
            .await?
            .into_iter()
            .filter_map(PlatformAccount::from_record)
            .collect())
    }

    async fn account(&self, id: AccountId) -> Result<Option<PlatformAccount>, PostblendError> {
        Ok(self
            .tables
            .read_one(self.id(), id)
            .await?
            .and_then(PlatformAccount::from_record))
    }

    async fn add_account(&self, details: Record) -> Result<AccountId, PostblendError> {
        self.tables
            .insert(self.id(), details)
            .await?
            .ok_or_else(|| PostblendError::plugin(self.id(), "account details are empty"))
    }

    async fn update_account(&self, id: AccountId, details: Record) -> Result<(), PostblendError> {
        self.tables.update(self.id(), id, details).await
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), PostblendError> {
        self.tables.delete(self.id(), id).await
    }
}

/// Builds [`EchoPlugin`] instances.
pub struct EchoFactory;

impl PluginFactory for EchoFactory {
    fn name(&self) -> &str {
        ECHO_FACTORY
    }

    fn capability(&self) -> Capability {
        Capability::Platform
    }

    fn create(
        &self,
        descriptor: PluginDescriptor,
        ctx: &PluginContext,
    ) -> Result<PluginInstance, PostblendError> {
        Ok(PluginInstance::Platform(Arc::new(EchoPlugin::new(
            descriptor,
            ctx.tables.clone(),
        ))))
    }
}

#[cfg(test)]
mod tests {
    use postblend_core::{FieldConstraint, FieldType, FieldValue, PostResultStatus};
    use postblend_storage::Database;

    use super::*;

    async fn echo() -> EchoPlugin {
        let tables = DynamicTables::new(Database::open_in_memory().await.unwrap());
        let plugin = EchoPlugin::new(
            PluginDescriptor::new("echo", "Echo", Capability::Platform),
            tables,
        );
        plugin.initialize().await.unwrap();
        plugin
    }

    #[test]
    fn account_columns_parse() {
        let fields = EchoPlugin::fields().unwrap();
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "username", "password"]);
        assert!(fields.iter().all(|f| f.field_type == FieldType::Text));
        assert_eq!(fields[1].constraints, vec![FieldConstraint::NotNull]);
    }

    #[tokio::test]
    async fn initialize_creates_table_once() {
        let plugin = echo().await;
        assert!(plugin.tables.exists("echo").await.unwrap());
        assert_eq!(
            plugin.tables.columns("echo").await.unwrap(),
            vec!["id", "name", "username", "password"]
        );
        plugin.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn account_lifecycle() {
        let plugin = echo().await;
        let id = plugin
            .add_account(Record::new().with("name", "Main").with("username", "main"))
            .await
            .unwrap();

        let account = plugin.account(id).await.unwrap().unwrap();
        assert_eq!(account.name, "Main");
        assert_eq!(plugin.account_ids().await.unwrap(), BTreeSet::from([id]));

        plugin
            .update_account(id, Record::new().with("name", "Renamed"))
            .await
            .unwrap();
        let account = plugin.account(id).await.unwrap().unwrap();
        assert_eq!(account.name, "Renamed");
        assert_eq!(
            account.details.get("username"),
            Some(&FieldValue::from("main"))
        );

        plugin.delete_account(id).await.unwrap();
        assert!(plugin.account(id).await.unwrap().is_none());
        assert!(plugin.accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_account_is_rejected() {
        let plugin = echo().await;
        assert!(plugin.add_account(Record::new()).await.is_err());
    }

    #[tokio::test]
    async fn publish_reports_unknown_accounts() {
        let plugin = echo().await;
        let id = plugin
            .add_account(Record::new().with("username", "only"))
            .await
            .unwrap();

        let results = plugin
            .publish(&Post::new("T", "B"), &BTreeSet::from([id, id + 1]))
            .await
            .unwrap();
        assert_eq!(results[&id].status, PostResultStatus::Success);
        assert_eq!(results[&id].payload["account"], "only");
        assert_eq!(results[&(id + 1)].status, PostResultStatus::BadAccount);
    }
}
