//! Persistence boundary for items, the audit trail and users.
//!
//! Backends implement [`InventoryStore`]; [`RetryingStore`] wraps any backend
//! with a [`RetryPolicy`] so callers never see a transient failure that a
//! second attempt would have absorbed.

pub mod audit;
pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use audit::AuditLog;
pub use in_memory::InMemoryInventoryStore;
pub use postgres::PostgresInventoryStore;
pub use r#trait::{InventoryStore, StoreError};

use async_trait::async_trait;

use warehouse_auth::{LookupError, User, UserLookup};
use warehouse_core::ItemId;
use warehouse_inventory::{History, Item, ItemDraft};

use crate::retry::RetryPolicy;

/// Adapter that runs every store call under a retry policy.
///
/// Only [`StoreError::is_transient`] failures are retried. A mutation is
/// retried as a whole transaction, so a retry that succeeds still leaves
/// exactly one history row behind.
#[derive(Debug, Clone)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S> InventoryStore for RetryingStore<S>
where
    S: InventoryStore,
{
    async fn create_item(&self, draft: &ItemDraft, actor: &str) -> Result<Item, StoreError> {
        self.policy
            .run_if(
                "create_item",
                || self.inner.create_item(draft, actor),
                StoreError::is_transient,
            )
            .await
    }

    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        self.policy
            .run_if(
                "list_items",
                || self.inner.list_items(),
                StoreError::is_transient,
            )
            .await
    }

    async fn update_item(
        &self,
        id: ItemId,
        draft: &ItemDraft,
        actor: &str,
    ) -> Result<Item, StoreError> {
        self.policy
            .run_if(
                "update_item",
                || self.inner.update_item(id, draft, actor),
                StoreError::is_transient,
            )
            .await
    }

    async fn delete_item(&self, id: ItemId, actor: &str) -> Result<Item, StoreError> {
        self.policy
            .run_if(
                "delete_item",
                || self.inner.delete_item(id, actor),
                StoreError::is_transient,
            )
            .await
    }

    async fn list_history(&self) -> Result<Vec<History>, StoreError> {
        self.policy
            .run_if(
                "list_history",
                || self.inner.list_history(),
                StoreError::is_transient,
            )
            .await
    }

    async fn item_history(&self, id: ItemId) -> Result<Vec<History>, StoreError> {
        self.policy
            .run_if(
                "item_history",
                || self.inner.item_history(id),
                StoreError::is_transient,
            )
            .await
    }

    async fn find_user_by_credentials(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, StoreError> {
        self.policy
            .run_if(
                "find_user_by_credentials",
                || self.inner.find_user_by_credentials(username, secret),
                StoreError::is_transient,
            )
            .await
    }
}

#[async_trait]
impl<S> UserLookup for RetryingStore<S>
where
    S: InventoryStore,
{
    async fn find_by_credentials(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, LookupError> {
        Ok(InventoryStore::find_user_by_credentials(self, username, secret).await?)
    }
}
