// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovery of the built-in echo plugin from an on-disk plugin tree.

use std::fs;

use postblend_core::{Capability, Record};
use postblend_plugin::{ECHO_MANIFEST, PluginContext, PluginRegistry, builtin_factories};
use postblend_storage::{Database, DynamicTables};

fn registry() -> PluginRegistry {
    builtin_factories()
        .into_iter()
        .fold(PluginRegistry::new(), |r, f| r.with_factory(f))
}

#[tokio::test]
async fn echo_plugin_is_discovered_and_creates_its_table() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("echo.toml"), ECHO_MANIFEST).unwrap();

    let db = Database::open(dir.path().join("store.db"), true).await.unwrap();
    let tables = DynamicTables::new(db);
    let ctx = PluginContext::new(tables.clone());
    let registry = registry();

    assert_eq!(registry.discover(dir.path(), &ctx).await.unwrap(), 1);
    assert!(tables.exists("echo").await.unwrap());

    let descriptor = &registry.list()[0];
    assert_eq!(descriptor.name, "Echo");
    assert_eq!(descriptor.capability, Capability::Platform);

    let echo = registry.platform("echo").unwrap();
    let id = echo
        .add_account(Record::new().with("username", "tester"))
        .await
        .unwrap();
    assert_eq!(echo.accounts().await.unwrap()[0].id, id);
}

#[tokio::test]
async fn repeated_discovery_keeps_accounts_and_ids() {
    let dir = tempfile::tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    fs::create_dir_all(plugins.join("more")).unwrap();
    fs::write(plugins.join("echo.toml"), ECHO_MANIFEST).unwrap();
    fs::write(
        plugins.join("more/second.toml"),
        "[[plugin]]\nid = \"echo_two\"\nfactory = \"echo\"\nname = \"Echo Two\"\nversion = \"0.2.0\"\n",
    )
    .unwrap();

    let tables = DynamicTables::new(Database::open_in_memory().await.unwrap());
    let ctx = PluginContext::new(tables.clone());
    let registry = registry();

    registry.discover(&plugins, &ctx).await.unwrap();
    registry
        .platform("echo_two")
        .unwrap()
        .add_account(Record::new().with("username", "kept"))
        .await
        .unwrap();

    registry.discover(&plugins, &ctx).await.unwrap();
    let ids: Vec<String> = registry.list().into_iter().map(|d| d.id).collect();
    assert_eq!(ids, vec!["echo", "echo_two"]);
    assert_eq!(
        registry.platform("echo_two").unwrap().accounts().await.unwrap().len(),
        1
    );
    assert_eq!(registry.platform_plugins().len(), 2);
}
