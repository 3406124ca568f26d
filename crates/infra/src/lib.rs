//! Infrastructure layer: persistence backends, retry, configuration.

pub mod config;
pub mod retry;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use config::{AppConfig, ConfigError, SeedUser, StoreBackend};
pub use retry::{InvalidRetryPolicy, RetryPolicy};
pub use store::{
    InMemoryInventoryStore, InventoryStore, PostgresInventoryStore, RetryingStore, StoreError,
};
