// HTTP handlers, one module per data service.
//
// Each module exposes `routes(state)` returning a finished Router with three tiers:
// public (no auth), protected (bearer JWT) and internal (service-to-service key).

pub mod account;
pub mod files;
pub mod groups;
pub mod process;
pub mod projects;

use axum::{middleware, Router};

use crate::app::AppState;
use crate::middleware::{internal_key_middleware, jwt_auth_middleware};

/// Wrap `router` so every route requires a valid bearer token.
pub(crate) fn protected(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state.jwt.clone(), jwt_auth_middleware))
}

/// Wrap `router` so every route requires the internal API key (when configured).
pub(crate) fn internal(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state.config.clone(), internal_key_middleware))
}
