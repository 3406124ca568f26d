use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    routing::post,
    Json, Router,
};

use crate::app::dto::{LoginRequest, LoginResponse};
use crate::app::errors::ApiError;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new().route("/login", post(login).fallback(super::system::method_not_allowed))
}

/// Exchange a username/password pair for a signed token.
pub async fn login(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(body) = payload?;

    let user = services
        .credentials
        .verify(&body.username, &body.password)
        .await?;
    let token = services.tokens.issue(&user)?;

    tracing::info!(username = %user.username, role = %user.role, "login succeeded");

    Ok(Json(LoginResponse {
        token,
        role: user.role,
    }))
}
