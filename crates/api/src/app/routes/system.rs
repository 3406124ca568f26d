use axum::http::StatusCode;

use crate::app::errors::ApiError;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Router fallback for paths no route matches.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("no such route".into())
}

/// Method fallback for a known path.
pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
