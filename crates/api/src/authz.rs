//! Route-level authorization guard.
//!
//! Each protected route declares its [`Action`]; the guard checks the
//! caller's role against that action's allow-list before the handler runs.

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use warehouse_auth::{authorize, Action};

use crate::app::errors::ApiError;
use crate::context::PrincipalContext;

/// Attach the allow-list check for `action` to `route`.
pub fn guarded(action: Action, route: MethodRouter) -> MethodRouter {
    route.route_layer(middleware::from_fn_with_state(action, require_action))
}

pub async fn require_action(
    State(action): State<Action>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let role = req
        .extensions()
        .get::<PrincipalContext>()
        .and_then(PrincipalContext::role);

    if let Err(e) = authorize(role, action) {
        tracing::info!(action = %action, error = %e, "request denied");
        return Err(e.into());
    }

    Ok(next.run(req).await)
}
