use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use warehouse_auth::TokenService;

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub tokens: Arc<TokenService>,
}

/// Resolve the bearer token into a [`PrincipalContext`] request extension.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.tokens.validate(token).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        ApiError::from(e)
    })?;

    req.extensions_mut().insert(PrincipalContext::from(claims));

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthenticated("missing authorization header".into()))?;

    let header = header
        .to_str()
        .map_err(|_| ApiError::Unauthenticated("malformed authorization header".into()))?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthenticated("expected a bearer token".into()))?;

    let token = header.trim();
    if token.is_empty() {
        return Err(ApiError::Unauthenticated("empty bearer token".into()));
    }

    Ok(token)
}
