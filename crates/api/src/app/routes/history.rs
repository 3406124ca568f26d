use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use warehouse_auth::Action;
use warehouse_inventory::History;

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::app::routes::system::method_not_allowed;
use crate::authz::guarded;

pub fn router() -> Router {
    Router::new().route(
        "/history",
        guarded(Action::ListHistory, get(list_history)).fallback(method_not_allowed),
    )
}

/// Full audit trail, newest first.
pub async fn list_history(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<History>>, ApiError> {
    Ok(Json(services.store.list_history().await?))
}
