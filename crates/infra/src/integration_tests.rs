//! Integration tests for the persistence pipeline.
//!
//! Tests: RetryingStore → backend → audit trail → credential lookup
//!
//! Verifies:
//! - Transient failures are absorbed without duplicating history rows
//! - Permanent failures surface on the first attempt
//! - A commit with an unknown outcome is surfaced, never replayed
//! - History snapshots reflect each mutation, newest first

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use warehouse_auth::{CredentialError, CredentialVerifier, Role, User, UserLookup};
use warehouse_core::ItemId;
use warehouse_inventory::{History, HistoryAction, Item, ItemDraft};

use crate::retry::RetryPolicy;
use crate::store::{InMemoryInventoryStore, InventoryStore, RetryingStore, StoreError};

/// Backend whose next `failures` calls fail as unavailable before
/// reaching the real store. The next `lost_acks` mutations are applied
/// and then reported as a commit with an unknown outcome.
struct FlakyStore {
    inner: InMemoryInventoryStore,
    failures: AtomicU32,
    lost_acks: AtomicU32,
    calls: AtomicU32,
}

impl FlakyStore {
    fn new(inner: InMemoryInventoryStore, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
            lost_acks: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn fail_next(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn lose_next_acks(&self, n: u32) {
        self.lost_acks.store(n, Ordering::SeqCst);
    }

    fn settle<T>(&self, applied: Result<T, StoreError>) -> Result<T, StoreError> {
        let value = applied?;
        let remaining = self.lost_acks.load(Ordering::SeqCst);
        if remaining > 0 {
            self.lost_acks.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::CommitUnknown("connection reset".to_string()));
        }
        Ok(value)
    }

    fn gate(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for FlakyStore {
    async fn create_item(&self, draft: &ItemDraft, actor: &str) -> Result<Item, StoreError> {
        self.gate()?;
        self.settle(self.inner.create_item(draft, actor).await)
    }

    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        self.gate()?;
        self.inner.list_items().await
    }

    async fn update_item(
        &self,
        id: ItemId,
        draft: &ItemDraft,
        actor: &str,
    ) -> Result<Item, StoreError> {
        self.gate()?;
        self.settle(self.inner.update_item(id, draft, actor).await)
    }

    async fn delete_item(&self, id: ItemId, actor: &str) -> Result<Item, StoreError> {
        self.gate()?;
        self.settle(self.inner.delete_item(id, actor).await)
    }

    async fn list_history(&self) -> Result<Vec<History>, StoreError> {
        self.gate()?;
        self.inner.list_history().await
    }

    async fn item_history(&self, id: ItemId) -> Result<Vec<History>, StoreError> {
        self.gate()?;
        self.inner.item_history(id).await
    }

    async fn find_user_by_credentials(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, StoreError> {
        self.gate()?;
        self.inner.find_user_by_credentials(username, secret).await
    }
}

fn setup(failures: u32) -> RetryingStore<Arc<FlakyStore>> {
    let inner = InMemoryInventoryStore::new()
        .with_user("alice", "pw1", Role::Manager)
        .unwrap();
    let policy = RetryPolicy::new(3, Duration::from_millis(300), 2.0).unwrap();
    RetryingStore::new(Arc::new(FlakyStore::new(inner, failures)), policy)
}

fn bolt() -> ItemDraft {
    ItemDraft::new("bolt", 10).unwrap()
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_absorbed_without_duplicate_history() {
    let store = setup(2);

    let item = store.create_item(&bolt(), "alice").await.unwrap();

    assert_eq!(store.inner().calls(), 3);
    let history = store.item_history(item.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, HistoryAction::Create);
    assert_eq!(history[0].new_data.as_ref(), Some(&item));
    assert!(history[0].old_data.is_none());
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_surface_last_error_and_write_nothing() {
    let store = setup(10);

    let err = store.create_item(&bolt(), "alice").await.unwrap_err();

    assert!(err.is_transient());
    assert_eq!(store.inner().calls(), 3);
    assert_eq!(store.inner().inner.history_len().unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_commit_outcome_is_surfaced_without_replay() {
    let store = setup(0);
    store.inner().lose_next_acks(1);

    let err = store.create_item(&bolt(), "alice").await.unwrap_err();

    assert!(matches!(err, StoreError::CommitUnknown(_)));
    assert_eq!(store.inner().calls(), 1);
    assert_eq!(store.list_items().await.unwrap().len(), 1);
    assert_eq!(store.inner().inner.history_len().unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn not_found_is_not_retried() {
    let store = setup(0);

    let err = store
        .delete_item(ItemId::new(42), "alice")
        .await
        .unwrap_err();

    assert_eq!(err, StoreError::NotFound(ItemId::new(42)));
    assert_eq!(store.inner().calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn trail_records_each_mutation_newest_first() {
    let store = setup(0);

    let created = store.create_item(&bolt(), "alice").await.unwrap();
    let updated = store
        .update_item(created.id, &ItemDraft::new("bolt", 7).unwrap(), "bob")
        .await
        .unwrap();
    store.delete_item(created.id, "carol").await.unwrap();

    let trail = store.item_history(created.id).await.unwrap();
    let actions: Vec<_> = trail.iter().map(|h| h.action).collect();
    assert_eq!(
        actions,
        [HistoryAction::Delete, HistoryAction::Update, HistoryAction::Create]
    );
    assert_eq!(trail[0].changed_by, "carol");
    assert_eq!(trail[0].old_data.as_ref(), Some(&updated));
    assert!(trail[0].new_data.is_none());
    assert_eq!(trail[1].old_data.as_ref(), Some(&created));
    assert_eq!(trail[1].new_data.as_ref(), Some(&updated));

    assert!(store.list_items().await.unwrap().is_empty());
    assert_eq!(store.list_history().await.unwrap(), trail);
}

#[tokio::test(start_paused = true)]
async fn snapshots_serialize_as_plain_item_objects() {
    let store = setup(0);
    let item = store.create_item(&bolt(), "alice").await.unwrap();

    let history = store.item_history(item.id).await.unwrap();
    let json = serde_json::to_value(&history[0]).unwrap();

    assert_eq!(
        json["new_data"],
        serde_json::json!({ "id": item.id.get(), "name": "bolt", "count": 10 })
    );
    assert!(json["old_data"].is_null());
    assert_eq!(json["action"], "create");
}

#[tokio::test(start_paused = true)]
async fn credential_lookup_goes_through_retry() {
    let store = Arc::new(setup(1));
    let verifier = CredentialVerifier::new(store.clone() as Arc<dyn UserLookup>);

    let user = verifier.verify("alice", "pw1").await.unwrap();
    assert_eq!(user.role, Role::Manager);
    assert_eq!(store.inner().calls(), 2);

    assert_eq!(
        verifier.verify("alice", "wrong").await,
        Err(CredentialError::NotFound)
    );

    store.inner().fail_next(10);
    assert!(matches!(
        verifier.verify("alice", "pw1").await,
        Err(CredentialError::Lookup(_))
    ));
}
