use axum::Router;

pub mod auth;
pub mod history;
pub mod items;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .merge(items::router())
        .merge(history::router())
}
