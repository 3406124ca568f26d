use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::Role;

/// Identity claims carried by a signed token.
///
/// Uses the registered JWT names for issuer and the time window so the
/// payload stays readable by standard tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,

    /// `None` when the claim is absent or names a role outside [`Role`].
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Option<Role>,

    #[serde(rename = "iss")]
    pub issuer: String,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,

    /// Token identifier, reserved for a denylist keyed per token.
    #[serde(default)]
    pub jti: Option<Uuid>,
}

fn lenient_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|r| r.parse().ok()))
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Tolerated clock drift between the issuing and validating hosts, applied
/// to `iat` only. Matches `jsonwebtoken`'s default leeway.
pub const ISSUED_AT_LEEWAY_SECS: i64 = 60;

/// Deterministically validate the claims' time window against `now`.
///
/// Signature and issuer checks happen in [`crate::TokenService`] before this
/// runs. Expiry is exact; `iat` may sit up to [`ISSUED_AT_LEEWAY_SECS`] ahead
/// of `now`.
pub fn validate_claims(claims: &Claims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now + Duration::seconds(ISSUED_AT_LEEWAY_SECS) < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}
