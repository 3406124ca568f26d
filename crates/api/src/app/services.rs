//! Service wiring: store backend, retry, credentials, tokens.

use std::sync::Arc;

use anyhow::Context;

use warehouse_auth::{CredentialVerifier, TokenService};
use warehouse_infra::{
    AppConfig, InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, RetryPolicy,
    RetryingStore, StoreBackend, StoreError,
};

/// Shared, read-only application services.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn InventoryStore>,
    pub credentials: CredentialVerifier,
    pub tokens: Arc<TokenService>,
}

impl std::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppServices")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl AppServices {
    /// Wrap `store` in `policy` and use it for both item access and
    /// credential lookups.
    pub fn new<S>(store: S, policy: RetryPolicy, tokens: TokenService) -> Self
    where
        S: InventoryStore + 'static,
    {
        let store = Arc::new(RetryingStore::new(store, policy));
        Self {
            store: store.clone(),
            credentials: CredentialVerifier::new(store),
            tokens: Arc::new(tokens),
        }
    }
}

/// Build the services described by `config`: connect, create the schema,
/// seed dev users.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let tokens =
        TokenService::new(config.jwt_secret.as_bytes()).context("invalid token configuration")?;
    let policy = config.retry_policy().context("invalid retry configuration")?;

    match config.store {
        StoreBackend::Postgres => {
            let dsn = config
                .dsn()
                .context("no database location configured")?;
            let store = policy
                .run_if(
                    "connect",
                    || PostgresInventoryStore::connect(&dsn, config.database.max_connections),
                    StoreError::is_transient,
                )
                .await
                .context("failed to connect to postgres")?;
            store
                .ensure_schema()
                .await
                .context("failed to create schema")?;
            tracing::info!(backend = "postgres", "store ready");
            Ok(AppServices::new(store, policy, tokens))
        }
        StoreBackend::Memory => {
            let store = InMemoryInventoryStore::new();
            for user in &config.seed_users {
                store
                    .insert_user(&user.username, &user.password, user.role)
                    .context("failed to seed users")?;
            }
            if config.seed_users.is_empty() {
                tracing::warn!("in-memory store has no users; nobody can log in");
            }
            tracing::warn!(backend = "memory", "store ready; data is lost on restart");
            Ok(AppServices::new(store, policy, tokens))
        }
    }
}
