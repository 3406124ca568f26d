use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use warehouse_auth::{Role, User};
use warehouse_core::{ItemId, UserId};
use warehouse_inventory::{History, Item, ItemDraft, PendingHistory};

use super::audit::AuditLog;
use super::r#trait::{InventoryStore, StoreError};

#[derive(Debug, Clone)]
struct UserRow {
    user: User,
    secret: String,
}

#[derive(Debug, Default)]
struct Tables {
    items: BTreeMap<ItemId, Item>,
    last_item_id: i64,
    users: Vec<UserRow>,
    history: AuditLog,
}

/// In-memory inventory store.
///
/// Intended for tests/dev. One lock guards all tables, so an item write and
/// its history row become visible together or not at all.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user record (users are created out of band).
    pub fn insert_user(
        &self,
        username: impl Into<String>,
        secret: impl Into<String>,
        role: Role,
    ) -> Result<User, StoreError> {
        let mut tables = self.write()?;
        let user = User {
            id: UserId::new(tables.users.len() as i64 + 1),
            username: username.into(),
            role,
        };
        tables.users.push(UserRow {
            user: user.clone(),
            secret: secret.into(),
        });
        Ok(user)
    }

    pub fn with_user(self, username: &str, secret: &str, role: Role) -> Result<Self, StoreError> {
        self.insert_user(username, secret, role)?;
        Ok(self)
    }

    /// Number of history rows written so far.
    pub fn history_len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.history.len())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn create_item(&self, draft: &ItemDraft, actor: &str) -> Result<Item, StoreError> {
        let mut tables = self.write()?;

        tables.last_item_id += 1;
        let item = draft.clone().into_item(ItemId::new(tables.last_item_id));
        tables.items.insert(item.id, item.clone());
        tables
            .history
            .record(PendingHistory::created(&item, actor), Utc::now());

        Ok(item)
    }

    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.read()?.items.values().cloned().collect())
    }

    async fn update_item(
        &self,
        id: ItemId,
        draft: &ItemDraft,
        actor: &str,
    ) -> Result<Item, StoreError> {
        let mut tables = self.write()?;

        let before = tables.items.get(&id).cloned().ok_or(StoreError::NotFound(id))?;
        let after = draft.clone().into_item(id);
        tables.items.insert(id, after.clone());

        tables
            .history
            .record(PendingHistory::updated(&before, &after, actor), Utc::now());

        Ok(after)
    }

    async fn delete_item(&self, id: ItemId, actor: &str) -> Result<Item, StoreError> {
        let mut tables = self.write()?;

        let before = tables.items.remove(&id).ok_or(StoreError::NotFound(id))?;
        tables
            .history
            .record(PendingHistory::deleted(&before, actor), Utc::now());

        Ok(before)
    }

    async fn list_history(&self) -> Result<Vec<History>, StoreError> {
        Ok(self.read()?.history.newest_first())
    }

    async fn item_history(&self, id: ItemId) -> Result<Vec<History>, StoreError> {
        Ok(self.read()?.history.for_item(id))
    }

    async fn find_user_by_credentials(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, StoreError> {
        Ok(self
            .read()?
            .users
            .iter()
            .find(|row| row.user.username == username && row.secret == secret)
            .map(|row| row.user.clone()))
    }
}
