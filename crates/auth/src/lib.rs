//! `warehouse-auth`: authentication and authorization boundary.
//!
//! Credential verification, signed identity tokens and the role/route
//! allow-lists. Decoupled from HTTP; storage is reached only through the
//! [`UserLookup`] trait.

pub mod actions;
pub mod authorize;
pub mod claims;
pub mod credentials;
pub mod roles;
pub mod token;

pub use actions::Action;
pub use authorize::{authorize, AuthzError};
pub use claims::{Claims, ISSUED_AT_LEEWAY_SECS, TokenValidationError, validate_claims};
pub use credentials::{CredentialError, CredentialVerifier, LookupError, User, UserLookup};
pub use roles::{Role, UnknownRole};
pub use token::{TokenError, TokenService, ISSUER, TOKEN_TTL_HOURS};
