// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fan-out of one post to many (plugin, account) targets.
//!
//! Every target runs as its own tokio task, so a slow, failing or panicking
//! plugin only affects the targets it owns. A semaphore bounds how many
//! targets are in flight at once. All tasks are joined before the result
//! map is returned.

use std::collections::BTreeSet;
use std::sync::Arc;

use postblend_core::{
    AccountId, AccountResults, PlatformPlugin, Post, PostResult, PublishResults, Targets,
};
use postblend_plugin::PluginRegistry;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// Sends posts through the platform plugins held by a registry.
pub struct Dispatcher {
    registry: Arc<PluginRegistry>,
    limit: Arc<Semaphore>,
    max_concurrency: usize,
}

impl Dispatcher {
    /// Create a dispatcher running at most `max_concurrency` targets at once.
    /// Zero is treated as one.
    pub fn new(registry: Arc<PluginRegistry>, max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            registry,
            limit: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Publish `post` to every requested account of every requested plugin.
    ///
    /// Plugin ids that are not loaded, or not platform plugins, are dropped
    /// from the result. Every other requested account gets exactly one
    /// [`PostResult`]; plugin faults and panics become `Unavailable`.
    pub async fn publish(&self, post: &Post, targets: &Targets) -> PublishResults {
        let post = Arc::new(post.clone());
        let mut results = PublishResults::new();
        let mut pending: Vec<(String, AccountId, JoinHandle<PostResult>)> = Vec::new();

        for (plugin_id, account_ids) in targets {
            let Some(plugin) = self.registry.get(plugin_id) else {
                debug!(plugin_id = %plugin_id, "plugin not loaded, dropping targets");
                continue;
            };
            let Some(platform) = plugin.as_platform() else {
                debug!(plugin_id = %plugin_id, "not a platform plugin, dropping targets");
                continue;
            };

            results.insert(plugin_id.clone(), AccountResults::new());
            for &account_id in account_ids {
                let handle = tokio::spawn(publish_one(
                    Arc::clone(platform),
                    Arc::clone(&post),
                    account_id,
                    Arc::clone(&self.limit),
                ));
                pending.push((plugin_id.clone(), account_id, handle));
            }
        }

        info!(
            plugins = results.len(),
            targets = pending.len(),
            "dispatching post"
        );

        for (plugin_id, account_id, handle) in pending {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let reason = join_error_text(e);
                    warn!(plugin_id = %plugin_id, account_id, error = %reason, "publish task aborted");
                    PostResult::unavailable(reason)
                }
            };
            if let Some(accounts) = results.get_mut(&plugin_id) {
                accounts.insert(account_id, result);
            }
        }

        let succeeded = results
            .values()
            .flat_map(|accounts| accounts.values())
            .filter(|r| r.is_success())
            .count();
        info!(succeeded, "dispatch complete");
        results
    }

    /// Publish `post` to every account of every loaded platform plugin.
    ///
    /// A plugin whose account list cannot be read is skipped.
    pub async fn publish_to_all(&self, post: &Post) -> PublishResults {
        let mut targets = Targets::new();
        for plugin in self.registry.platform_plugins() {
            match plugin.account_ids().await {
                Ok(ids) => {
                    targets.insert(plugin.id().to_string(), ids);
                }
                Err(e) => {
                    warn!(plugin_id = %plugin.id(), error = %e, "cannot list accounts, skipping plugin");
                }
            }
        }
        self.publish(post, &targets).await
    }
}

async fn publish_one(
    plugin: Arc<dyn PlatformPlugin>,
    post: Arc<Post>,
    account_id: AccountId,
    limit: Arc<Semaphore>,
) -> PostResult {
    // The semaphore is never closed, so acquisition only fails if that changes.
    let _permit = match limit.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => return PostResult::unavailable(e.to_string()),
    };

    match plugin.publish(&post, &BTreeSet::from([account_id])).await {
        Ok(mut answer) => {
            if answer.len() > 1 {
                debug!(plugin_id = %plugin.id(), account_id, "ignoring results for unrequested accounts");
            }
            answer.remove(&account_id).unwrap_or_else(|| {
                warn!(plugin_id = %plugin.id(), account_id, "plugin returned no result for account");
                PostResult::unavailable(format!("no result for account {account_id}"))
            })
        }
        Err(e) => {
            warn!(plugin_id = %plugin.id(), account_id, error = %e, "publish failed");
            PostResult::unavailable(e.to_string())
        }
    }
}

fn join_error_text(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let panic = e.into_panic();
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("plugin panicked: {msg}")
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("plugin panicked: {msg}")
    } else {
        "plugin panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use postblend_core::{PostResultStatus, Targets};
    use postblend_test_utils::{MockPlatformPlugin, registry_with};

    use super::*;

    fn targets(entries: &[(&str, &[AccountId])]) -> Targets {
        entries
            .iter()
            .map(|(id, accounts)| (id.to_string(), accounts.iter().copied().collect()))
            .collect()
    }

    #[tokio::test]
    async fn unregistered_plugins_are_dropped() {
        let a = MockPlatformPlugin::new("a").with_accounts(&[1, 2]);
        let dispatcher = Dispatcher::new(Arc::new(registry_with(vec![a.into_instance()])), 4);

        let results = dispatcher
            .publish(&Post::new("T", "B"), &targets(&[("a", &[1, 2]), ("b", &[5])]))
            .await;

        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(
            results["a"].keys().copied().collect::<BTreeSet<_>>(),
            BTreeSet::from([1, 2])
        );
        assert!(results["a"].values().all(PostResult::is_success));
    }

    #[tokio::test]
    async fn unknown_account_is_bad_account() {
        let x = MockPlatformPlugin::new("x").with_accounts(&[2]);
        let dispatcher = Dispatcher::new(Arc::new(registry_with(vec![x.into_instance()])), 4);

        let results = dispatcher
            .publish(&Post::new("T", "B"), &targets(&[("x", &[1, 2])]))
            .await;

        assert_eq!(results["x"][&1].status, PostResultStatus::BadAccount);
        assert_eq!(results["x"][&2].status, PostResultStatus::Success);
    }

    #[tokio::test]
    async fn faults_and_panics_are_isolated() {
        let healthy = MockPlatformPlugin::new("healthy").with_accounts(&[1]);
        let failing = MockPlatformPlugin::new("failing")
            .with_accounts(&[1, 2])
            .failing_on(1, "token expired")
            .panicking_on(2);
        let dispatcher = Dispatcher::new(
            Arc::new(registry_with(vec![
                healthy.into_instance(),
                failing.into_instance(),
            ])),
            2,
        );

        let results = dispatcher
            .publish(
                &Post::new("T", "B"),
                &targets(&[("healthy", &[1]), ("failing", &[1, 2])]),
            )
            .await;

        assert!(results["healthy"][&1].is_success());
        let fault = &results["failing"][&1];
        assert_eq!(fault.status, PostResultStatus::Unavailable);
        assert!(fault.payload.as_str().unwrap().contains("token expired"));
        let panic = &results["failing"][&2];
        assert_eq!(panic.status, PostResultStatus::Unavailable);
        assert!(panic.payload.as_str().unwrap().contains("panicked"));
    }

    #[tokio::test]
    async fn missing_answer_is_unavailable() {
        let silent = MockPlatformPlugin::new("silent")
            .with_accounts(&[3])
            .omitting(3);
        let dispatcher = Dispatcher::new(Arc::new(registry_with(vec![silent.into_instance()])), 1);

        let results = dispatcher
            .publish(&Post::new("T", "B"), &targets(&[("silent", &[3])]))
            .await;
        assert_eq!(results["silent"][&3].status, PostResultStatus::Unavailable);
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let slow = MockPlatformPlugin::new("slow")
            .with_accounts(&[1, 2, 3, 4, 5, 6])
            .with_delay(std::time::Duration::from_millis(20));
        let probe = slow.clone();
        let dispatcher = Dispatcher::new(Arc::new(registry_with(vec![slow.into_instance()])), 2);

        let results = dispatcher
            .publish(&Post::new("T", "B"), &targets(&[("slow", &[1, 2, 3, 4, 5, 6])]))
            .await;

        assert_eq!(results["slow"].len(), 6);
        assert_eq!(probe.peak_in_flight(), 2);
        assert_eq!(probe.published().len(), 6);
    }

    #[tokio::test]
    async fn publish_to_all_uses_current_accounts() {
        let a = MockPlatformPlugin::new("a").with_accounts(&[1]);
        let b = MockPlatformPlugin::new("b").with_accounts(&[7, 8]);
        let broken = MockPlatformPlugin::new("broken").failing_account_listing();
        let dispatcher = Dispatcher::new(
            Arc::new(registry_with(vec![
                a.into_instance(),
                b.into_instance(),
                broken.into_instance(),
            ])),
            8,
        );

        let results = dispatcher.publish_to_all(&Post::new("T", "B")).await;
        assert_eq!(results.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(results["b"].len(), 2);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let dispatcher = Dispatcher::new(Arc::new(PluginRegistry::new()), 0);
        assert_eq!(dispatcher.max_concurrency(), 1);
    }
}
