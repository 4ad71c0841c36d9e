// SPDX-FileCopyrightText: 2026 Postblend Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Platform contract: publishing posts and managing platform accounts.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::PostblendError;
use crate::traits::plugin::Plugin;
use crate::types::{AccountId, AccountResults, PlatformAccount, Post, Record};

/// Contract a plugin must satisfy to be dispatch-eligible.
///
/// Per-account publish failures are reported as [`crate::PostResult`] values
/// (`BadAccount`, `Unavailable`, ...). Returning `Err` from `publish` means the
/// plugin itself faulted.
#[async_trait]
pub trait PlatformPlugin: Plugin {
    /// Publish `post` to each of `account_ids`, returning one result per account.
    async fn publish(
        &self,
        post: &Post,
        account_ids: &BTreeSet<AccountId>,
    ) -> Result<AccountResults, PostblendError>;

    /// All accounts this plugin currently manages.
    async fn accounts(&self) -> Result<Vec<PlatformAccount>, PostblendError>;

    async fn account_ids(&self) -> Result<BTreeSet<AccountId>, PostblendError> {
        Ok(self.accounts().await?.into_iter().map(|a| a.id).collect())
    }

    /// A single account, or `None` if it does not exist.
    async fn account(&self, id: AccountId) -> Result<Option<PlatformAccount>, PostblendError>;

    /// Persist a new account and return its id.
    async fn add_account(&self, details: Record) -> Result<AccountId, PostblendError>;

    async fn update_account(&self, id: AccountId, details: Record) -> Result<(), PostblendError>;

    async fn delete_account(&self, id: AccountId) -> Result<(), PostblendError>;
}
