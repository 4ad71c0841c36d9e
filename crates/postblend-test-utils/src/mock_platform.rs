// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock platform plugin for deterministic testing.
//!
//! `MockPlatformPlugin` keeps its accounts in memory and records every post
//! it is asked to publish. Faults, panics, omitted results and latency can be
//! injected per account. Clones share state, so a test can keep a probe
//! handle after moving the plugin into a registry.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use postblend_core::{
    AccountId, AccountResults, Capability, PlatformAccount, PlatformPlugin, Plugin,
    PluginDescriptor, PluginInstance, Post, PostResult, PostblendError, Record,
};
use postblend_plugin::{PluginContext, PluginFactory};

#[derive(Default)]
struct MockState {
    accounts: Mutex<BTreeMap<AccountId, Record>>,
    next_id: AtomicI64,
    failures: Mutex<HashMap<AccountId, String>>,
    panics: Mutex<BTreeSet<AccountId>>,
    omitted: Mutex<BTreeSet<AccountId>>,
    delay: Mutex<Option<Duration>>,
    fail_listing: AtomicBool,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    published: Mutex<Vec<(AccountId, Post)>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory platform plugin with injectable behavior.
#[derive(Clone)]
pub struct MockPlatformPlugin {
    descriptor: PluginDescriptor,
    state: Arc<MockState>,
}

impl MockPlatformPlugin {
    /// Create a mock platform plugin with no accounts.
    pub fn new(id: &str) -> Self {
        Self::from_descriptor(PluginDescriptor::new(id, id, Capability::Platform))
    }

    pub fn from_descriptor(descriptor: PluginDescriptor) -> Self {
        let state = MockState {
            next_id: AtomicI64::new(1),
            ..MockState::default()
        };
        Self {
            descriptor,
            state: Arc::new(state),
        }
    }

    /// Seed accounts with the given ids.
    pub fn with_accounts(self, ids: &[AccountId]) -> Self {
        {
            let mut accounts = lock(&self.state.accounts);
            for &id in ids {
                accounts.insert(
                    id,
                    Record::new()
                        .with("id", id)
                        .with("name", format!("account-{id}")),
                );
                self.state.next_id.fetch_max(id + 1, Ordering::SeqCst);
            }
        }
        self
    }

    /// Return `Err` with `message` when publishing to `id`.
    pub fn failing_on(self, id: AccountId, message: &str) -> Self {
        lock(&self.state.failures).insert(id, message.to_string());
        self
    }

    /// Panic when publishing to `id`.
    pub fn panicking_on(self, id: AccountId) -> Self {
        lock(&self.state.panics).insert(id);
        self
    }

    /// Leave `id` out of the publish answer.
    pub fn omitting(self, id: AccountId) -> Self {
        lock(&self.state.omitted).insert(id);
        self
    }

    /// Sleep for `delay` inside every publish call.
    pub fn with_delay(self, delay: Duration) -> Self {
        *lock(&self.state.delay) = Some(delay);
        self
    }

    /// Make `accounts()` (and so `account_ids()`) fail.
    pub fn failing_account_listing(self) -> Self {
        self.state.fail_listing.store(true, Ordering::SeqCst);
        self
    }

    /// Wrap in the registry's instance handle.
    pub fn into_instance(self) -> PluginInstance {
        PluginInstance::Platform(Arc::new(self))
    }

    /// Every (account, post) pair successfully published so far.
    pub fn published(&self) -> Vec<(AccountId, Post)> {
        lock(&self.state.published).clone()
    }

    /// Highest number of publish calls observed running at once.
    pub fn peak_in_flight(&self) -> usize {
        self.state.peak_in_flight.load(Ordering::SeqCst)
    }

    fn check_listing(&self) -> Result<(), PostblendError> {
        if self.state.fail_listing.load(Ordering::SeqCst) {
            return Err(PostblendError::plugin(&self.descriptor.id, "account listing failed"));
        }
        Ok(())
    }
}

#[async_trait]
impl Plugin for MockPlatformPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl PlatformPlugin for MockPlatformPlugin {
    async fn publish(
        &self,
        post: &Post,
        account_ids: &BTreeSet<AccountId>,
    ) -> Result<AccountResults, PostblendError> {
        let now = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *lock(&self.state.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut results = AccountResults::new();
        for &id in account_ids {
            if lock(&self.state.panics).contains(&id) {
                panic!("mock plugin {} panicked on account {id}", self.descriptor.id);
            }
            if let Some(message) = lock(&self.state.failures).get(&id).cloned() {
                return Err(PostblendError::plugin(&self.descriptor.id, message));
            }
            if lock(&self.state.omitted).contains(&id) {
                continue;
            }
            let result = if lock(&self.state.accounts).contains_key(&id) {
                lock(&self.state.published).push((id, post.clone()));
                PostResult::success(serde_json::json!({ "account_id": id }))
            } else {
                PostResult::bad_account()
            };
            results.insert(id, result);
        }
        Ok(results)
    }

    async fn accounts(&self) -> Result<Vec<PlatformAccount>, PostblendError> {
        self.check_listing()?;
        Ok(lock(&self.state.accounts)
            .values()
            .cloned()
            .filter_map(PlatformAccount::from_record)
            .collect())
    }

    async fn account(&self, id: AccountId) -> Result<Option<PlatformAccount>, PostblendError> {
        Ok(lock(&self.state.accounts)
            .get(&id)
            .cloned()
            .and_then(PlatformAccount::from_record))
    }

    async fn add_account(&self, details: Record) -> Result<AccountId, PostblendError> {
        let id = self.state.next_id.fetch_add(1, Ordering::SeqCst);
        let mut record = Record::new().with("id", id);
        for (key, value) in details.into_iter().filter(|(k, _)| k != "id") {
            record.insert(key, value);
        }
        lock(&self.state.accounts).insert(id, record);
        Ok(id)
    }

    async fn update_account(&self, id: AccountId, details: Record) -> Result<(), PostblendError> {
        if let Some(record) = lock(&self.state.accounts).get_mut(&id) {
            for (key, value) in details.into_iter().filter(|(k, _)| k != "id") {
                record.insert(key, value);
            }
        }
        Ok(())
    }

    async fn delete_account(&self, id: AccountId) -> Result<(), PostblendError> {
        lock(&self.state.accounts).remove(&id);
        Ok(())
    }
}

/// Factory building [`MockPlatformPlugin`]s from manifest entries.
///
/// Keeps a handle to every plugin it creates for later inspection.
pub struct MockFactory {
    name: String,
    accounts: Vec<AccountId>,
    created: Mutex<Vec<MockPlatformPlugin>>,
}

impl MockFactory {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            accounts: Vec::new(),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Seed every created plugin with these account ids.
    pub fn with_accounts(mut self, ids: &[AccountId]) -> Self {
        self.accounts = ids.to_vec();
        self
    }

    /// Plugins created so far, in creation order.
    pub fn created(&self) -> Vec<MockPlatformPlugin> {
        lock(&self.created).clone()
    }
}

impl PluginFactory for MockFactory {
    fn name(&self) -> &str {
        &self.name
    }

    fn capability(&self) -> Capability {
        Capability::Platform
    }

    fn create(
        &self,
        descriptor: PluginDescriptor,
        _ctx: &PluginContext,
    ) -> Result<PluginInstance, PostblendError> {
        let plugin = MockPlatformPlugin::from_descriptor(descriptor).with_accounts(&self.accounts);
        lock(&self.created).push(plugin.clone());
        Ok(plugin.into_instance())
    }
}
