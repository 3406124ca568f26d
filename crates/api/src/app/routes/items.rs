use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};

use warehouse_auth::Action;
use warehouse_core::ItemId;
use warehouse_inventory::{History, Item, ItemDraft};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::app::routes::system::method_not_allowed;
use crate::authz::guarded;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route(
            "/items",
            guarded(Action::ListItems, get(list_items))
                .merge(guarded(Action::CreateItem, post(create_item)))
                .fallback(method_not_allowed),
        )
        .route(
            "/items/:id",
            guarded(Action::UpdateItem, put(update_item))
                .merge(guarded(Action::DeleteItem, delete(delete_item)))
                .fallback(method_not_allowed),
        )
        .route(
            "/items/:id/history",
            guarded(Action::ItemHistory, get(item_history)).fallback(method_not_allowed),
        )
}

pub(crate) fn parse_item_id(raw: &str) -> Result<ItemId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::Validation(format!("invalid item id: {raw:?}")))
}

fn draft_from(payload: Result<Json<ItemDraft>, JsonRejection>) -> Result<ItemDraft, ApiError> {
    let Json(draft) = payload?;
    draft.validate()?;
    Ok(draft)
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
) -> Result<Json<Vec<Item>>, ApiError> {
    Ok(Json(services.store.list_items().await?))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<ItemDraft>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let draft = draft_from(payload)?;

    let item = services
        .store
        .create_item(&draft, principal.username())
        .await?;

    tracing::info!(item_id = %item.id, actor = principal.username(), "item created");
    Ok(Json(item))
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<ItemDraft>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let id = parse_item_id(&id)?;
    let draft = draft_from(payload)?;

    let item = services
        .store
        .update_item(id, &draft, principal.username())
        .await?;

    tracing::info!(item_id = %id, actor = principal.username(), "item updated");
    Ok(Json(item))
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_item_id(&id)?;

    services.store.delete_item(id, principal.username()).await?;

    tracing::info!(item_id = %id, actor = principal.username(), "item deleted");
    Ok(StatusCode::OK)
}

pub async fn item_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<History>>, ApiError> {
    let id = parse_item_id(&id)?;
    Ok(Json(services.store.item_history(id).await?))
}
