//! Username/secret verification against stored user records.
//!
//! The lookup compares the secret as stored. Swapping in a salted one-way
//! hash changes the [`UserLookup`] implementation, not this contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warehouse_core::UserId;

use crate::Role;

/// A verified user. The secret is never carried past the lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
}

/// Store failure while looking up a user (already translated by the store).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("user lookup failed: {0}")]
pub struct LookupError(pub String);

/// Source of user records.
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// Single exact-match lookup on `(username, secret)`. When several rows
    /// match, the first one wins.
    async fn find_by_credentials(
        &self,
        username: &str,
        secret: &str,
    ) -> Result<Option<User>, LookupError>;
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// No user matches the pair. Callers must not reveal which half was wrong.
    #[error("invalid credentials")]
    NotFound,

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

#[derive(Clone)]
pub struct CredentialVerifier {
    lookup: Arc<dyn UserLookup>,
}

impl core::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    pub fn new(lookup: Arc<dyn UserLookup>) -> Self {
        Self { lookup }
    }

    pub async fn verify(&self, username: &str, secret: &str) -> Result<User, CredentialError> {
        match self.lookup.find_by_credentials(username, secret).await? {
            Some(user) => Ok(user),
            None => {
                tracing::debug!(username, "credential lookup miss");
                Err(CredentialError::NotFound)
            }
        }
    }
}
