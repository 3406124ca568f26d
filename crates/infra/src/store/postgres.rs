//! Postgres-backed inventory store.
//!
//! Each mutation is a single transaction: the item statement and the history
//! insert commit together or roll back together. History rows reference
//! items by id without a foreign key so the trail survives deletes.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` as follows:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database | class `08` | `Unavailable` | Connection exception |
//! | Database | `40001`, `40P01` | `Unavailable` | Serialization failure / deadlock |
//! | Database | `57P01`, `57P03`, `53300` | `Unavailable` | Server shutting down / starting / too many connections |
//! | Database | Any other | `Database` | Constraint violations, bad SQL, ... |
//! | Io, PoolTimedOut, WorkerCrashed | N/A | `Unavailable` | Network errors, pool exhaustion |
//! | ColumnDecode, ColumnNotFound, Decode | N/A | `Corrupt` | Row does not match the expected shape |
//! | Other | N/A | `Database` | Everything else (including a closed pool) |
//!
//! Commits are the exception. A server-side rejection of `COMMIT` keeps the
//! table above, but any other failure while the commit is in flight maps to
//! `CommitUnknown`: the server may already have applied the transaction, so
//! replaying it could duplicate the item and its history row.
//!
//! ## Thread Safety
//!
//! `PostgresInventoryStore` is `Send + Sync` and can be shared across tasks.
//! All operations go through the SQLx connection pool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use warehouse_auth::{Role, User};
use warehouse_core::{HistoryId, ItemId, UserId};
use warehouse_inventory::{History, HistoryAction, Item, ItemDraft, PendingHistory};

use super::r#trait::{InventoryStore, StoreError};

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id    BIGSERIAL PRIMARY KEY,
        name  TEXT   NOT NULL,
        count BIGINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id       BIGSERIAL PRIMARY KEY,
        username TEXT NOT NULL,
        password TEXT NOT NULL,
        role     TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS history (
        id         BIGSERIAL   PRIMARY KEY,
        item_id    BIGINT      NOT NULL,
        action     TEXT        NOT NULL CHECK (action IN ('create', 'update', 'delete')),
        changed_by TEXT        NOT NULL,
        timestamp  TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp(),
        old_data   JSONB,
        new_data   JSONB
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS history_item_id_timestamp_idx
        ON history (item_id, timestamp DESC)
    "#,
];

#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: Arc<PgPool>,
}

impl PostgresInventoryStore {
    /// Create a new store with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect a pool to `dsn`.
    pub async fn connect(dsn: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(dsn)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    /// Seed a user record. Users are otherwise managed out of band.
    pub async fn insert_user(
        &self,
        username: &str,
        secret: &str,
        role: Role,
    ) -> Result<User, StoreError> {
        let row = sqlx::query(
            "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(username)
        .bind(secret)
        .bind(role.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;

        Ok(User {
            id: UserId::new(get(&row, "id", "insert_user")?),
            username: username.to_string(),
            role,
        })
    }

    async fn begin(&self, operation: &str) -> Result<Transaction<'static, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }
}

#[async_trait]
impl InventoryStore for PostgresInventoryStore {
    #[instrument(skip(self, draft), err)]
    async fn create_item(&self, draft: &ItemDraft, actor: &str) -> Result<Item, StoreError> {
        let mut tx = self.begin("create_item").await?;

        let row = sqlx::query("INSERT INTO items (name, count) VALUES ($1, $2) RETURNING id")
            .bind(&draft.name)
            .bind(draft.count)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("create_item", e))?;
        let item = draft
            .clone()
            .into_item(ItemId::new(get(&row, "id", "create_item")?));

        record_history(&mut tx, PendingHistory::created(&item, actor)).await?;

        tx.commit()
            .await
            .map_err(|e| map_commit_error("create_item.commit", e))?;
        Ok(item)
    }

    #[instrument(skip(self), err)]
    async fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query("SELECT id, name, count FROM items ORDER BY id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;

        rows.iter().map(|row| item_from_row(row, "list_items")).collect()
    }

    #[instrument(skip(self, draft), fields(item_id = %id), err)]
    async fn update_item(
        &self,
        id: ItemId,
        draft: &ItemDraft,
        actor: &str,
    ) -> Result<Item, StoreError> {
        let mut tx = self.begin("update_item").await?;

        let before = sqlx::query("SELECT id, name, count FROM items WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_item", e))?;
        let Some(before) = before else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound(id));
        };
        let before = item_from_row(&before, "update_item")?;

        sqlx::query("UPDATE items SET name = $1, count = $2 WHERE id = $3")
            .bind(&draft.name)
            .bind(draft.count)
            .bind(id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_item", e))?;
        let after = draft.clone().into_item(id);

        record_history(&mut tx, PendingHistory::updated(&before, &after, actor)).await?;

        tx.commit()
            .await
            .map_err(|e| map_commit_error("update_item.commit", e))?;
        Ok(after)
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn delete_item(&self, id: ItemId, actor: &str) -> Result<Item, StoreError> {
        let mut tx = self.begin("delete_item").await?;

        let deleted = sqlx::query("DELETE FROM items WHERE id = $1 RETURNING id, name, count")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        let Some(deleted) = deleted else {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::NotFound(id));
        };
        let before = item_from_row(&deleted, "delete_item")?;

        record_history(&mut tx, PendingHistory::deleted(&before, actor)).await?;

        tx.commit()
            .await
            .map_err(|e| map_commit_error("delete_item.commit", e))?;
        Ok(before)
    }

    #[instrument(skip(self), err)]
    async fn list_history(&self) -> Result<Vec<History>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, item_id, action, changed_by, timestamp, old_data, new_data
            FROM history
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_history", e))?;

        rows.iter()
            .map(|row| history_from_row(row, "list_history"))
            .collect()
    }

    #[instrument(skip(self), fields(item_id = %id), err)]
    async fn item_history(&self, id: ItemId) -> Result<Vec<History>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, item_id, action, changed_by, timestamp, old_data, new_data
            FROM history
            WHERE item_id = $1
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("item_history", e))?;

        rows.iter()
            .map(|row| history_from_row(row, "item_history"))
            .collect()
    }

    #[instrument(skip(self, secret), err)]
    async fn find_user_by_credentials(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, role
            FROM users
            WHERE username = $1 AND password = $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(username)
        .bind(secret)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_user_by_credentials", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: String = get(&row, "role", "find_user_by_credentials")?;
        let role: Role = role
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("users.role: {e}")))?;

        Ok(Some(User {
            id: UserId::new(get(&row, "id", "find_user_by_credentials")?),
            username: get(&row, "username", "find_user_by_credentials")?,
            role,
        }))
    }
}

/// Insert the audit row inside the caller's transaction. The timestamp is
/// assigned by the database.
async fn record_history(
    tx: &mut Transaction<'static, Postgres>,
    pending: PendingHistory,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO history (item_id, action, changed_by, old_data, new_data)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(pending.item_id().get())
    .bind(pending.action().as_str())
    .bind(pending.changed_by())
    .bind(pending.old_data().map(Json))
    .bind(pending.new_data().map(Json))
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("record_history", e))?;
    Ok(())
}

fn get<'r, T>(row: &'r PgRow, column: &str, operation: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| map_sqlx_error(operation, e))
}

fn item_from_row(row: &PgRow, operation: &str) -> Result<Item, StoreError> {
    Ok(Item {
        id: ItemId::new(get(row, "id", operation)?),
        name: get(row, "name", operation)?,
        count: get(row, "count", operation)?,
    })
}

fn history_from_row(row: &PgRow, operation: &str) -> Result<History, StoreError> {
    let action: String = get(row, "action", operation)?;
    let action: HistoryAction = action
        .parse()
        .map_err(|e| StoreError::Corrupt(format!("history.action: {e}")))?;
    let timestamp: DateTime<Utc> = get(row, "timestamp", operation)?;
    let old_data: Option<Json<Item>> = get(row, "old_data", operation)?;
    let new_data: Option<Json<Item>> = get(row, "new_data", operation)?;

    Ok(History {
        id: HistoryId::new(get(row, "id", operation)?),
        item_id: ItemId::new(get(row, "item_id", operation)?),
        action,
        changed_by: get(row, "changed_by", operation)?,
        timestamp,
        old_data: old_data.map(|Json(item)| item),
        new_data: new_data.map(|Json(item)| item),
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{} in {}", db_err.message(), operation);
            let transient = db_err
                .code()
                .map(|code| is_transient_sqlstate(code.as_ref()))
                .unwrap_or(false);
            if transient {
                StoreError::Unavailable(msg)
            } else {
                StoreError::Database(msg)
            }
        }
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed => {
            StoreError::Unavailable(format!("{} in {}", err, operation))
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_) => StoreError::Corrupt(format!("{} in {}", err, operation)),
        other => StoreError::Database(format!("{} in {}", other, operation)),
    }
}

/// Like [`map_sqlx_error`], except that a lost connection during `COMMIT`
/// is ambiguous and must not be replayed.
fn map_commit_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(_) => map_sqlx_error(operation, err),
        other => StoreError::CommitUnknown(format!("{} in {}", other, operation)),
    }
}

/// SQLSTATEs worth retrying.
fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "40001" | "40P01" | "57P01" | "57P03" | "53300")
}
