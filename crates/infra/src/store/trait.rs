use async_trait::async_trait;
use thiserror::Error;

use warehouse_auth::{LookupError, User};
use warehouse_core::ItemId;
use warehouse_inventory::{History, Item, ItemDraft};

/// Persistence gateway for items, their audit trail and user lookups.
///
/// ## Audit contract
///
/// Every successful `create_item`, `update_item` and `delete_item` writes
/// exactly one [`History`] row, in the same transaction as the item change.
/// A failed mutation writes neither.
///
/// ## Existence
///
/// `update_item` and `delete_item` on an unknown id fail with
/// [`StoreError::NotFound`] and record nothing.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn create_item(&self, draft: &ItemDraft, actor: &str) -> Result<Item, StoreError>;

    /// All items, no pagination.
    async fn list_items(&self) -> Result<Vec<Item>, StoreError>;

    async fn update_item(
        &self,
        id: ItemId,
        draft: &ItemDraft,
        actor: &str,
    ) -> Result<Item, StoreError>;

    /// Returns the item as it was before deletion.
    async fn delete_item(&self, id: ItemId, actor: &str) -> Result<Item, StoreError>;

    /// Full trail, newest first.
    async fn list_history(&self) -> Result<Vec<History>, StoreError>;

    /// One item's trail, newest first. Rows survive the item's deletion.
    async fn item_history(&self, id: ItemId) -> Result<Vec<History>, StoreError>;

    /// Exact-match credential lookup; the first matching row wins.
    async fn find_user_by_credentials(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, StoreError>;
}

#[async_trait]
impl<S> InventoryStore for std::sync::Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn create_item(&self, draft: &ItemDraft, actor: &str) -> Result<Item, StoreError> {
        (**self).create_item(draft, actor).await
    }

    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        (**self).list_items().await
    }

    async fn update_item(
        &self,
        id: ItemId,
        draft: &ItemDraft,
        actor: &str,
    ) -> Result<Item, StoreError> {
        (**self).update_item(id, draft, actor).await
    }

    async fn delete_item(&self, id: ItemId, actor: &str) -> Result<Item, StoreError> {
        (**self).delete_item(id, actor).await
    }

    async fn list_history(&self) -> Result<Vec<History>, StoreError> {
        (**self).list_history().await
    }

    async fn item_history(&self, id: ItemId) -> Result<Vec<History>, StoreError> {
        (**self).item_history(id).await
    }

    async fn find_user_by_credentials(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, StoreError> {
        (**self).find_user_by_credentials(username, secret).await
    }
}

/// Store operation error.
///
/// Infrastructure errors are translated into one of these at the point
/// where they occur; nothing above the store sees a driver error.
///
/// ## Error Categories
///
/// - **NotFound**: the addressed item does not exist (never retried)
/// - **Unavailable**: connection loss, pool exhaustion, serialization
///   conflicts; a retry may succeed
/// - **Database**: any other statement failure (constraint violations, bad SQL)
/// - **Corrupt**: a stored row could not be decoded
/// - **CommitUnknown**: the connection failed while a commit was in flight,
///   so the mutation may or may not have been applied (never retried)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("item {0} not found")]
    NotFound(ItemId),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("commit outcome unknown: {0}")]
    CommitUnknown(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<StoreError> for LookupError {
    fn from(value: StoreError) -> Self {
        LookupError(value.to_string())
    }
}
