//! HS256 token issuance and validation.
//!
//! The signing secret is loaded once at startup and never rotated at
//! runtime. Validation is stateless: there is no revocation lookup, so a
//! token stays valid until `exp`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use uuid::Uuid;

use crate::claims::{validate_claims, Claims, TokenValidationError};
use crate::User;

/// Issuer stamped into and required from every token.
pub const ISSUER: &str = "warehouse";

/// Token lifetime.
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("failed to sign token: {0}")]
    Signing(String),

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token issuer is not trusted")]
    UntrustedIssuer,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error(transparent)]
    Window(#[from] TokenValidationError),
}

impl TokenError {
    /// `true` for failures caused by the presented token (401), `false` for
    /// failures on our side (500).
    pub fn is_rejection(&self) -> bool {
        !matches!(self, TokenError::EmptySecret | TokenError::Signing(_))
    }
}

pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService")
            .field("issuer", &ISSUER)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        // The time window is checked by `validate_claims` against an explicit `now`.
        validation.validate_exp = false;

        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::hours(TOKEN_TTL_HOURS),
        })
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = Claims {
            username: user.username.clone(),
            role: Some(user.role),
            issuer: ISSUER.to_string(),
            issued_at: now,
            expires_at: now + self.ttl,
            jti: Some(Uuid::now_v7()),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidIssuer => TokenError::UntrustedIssuer,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
