// Project service.

mod lifecycle;
mod members;

use axum::{
    extract::State,
    routing::{delete, get, post},
    Router,
};

use crate::app::AppState;
use crate::database::models::ProjectSummary;
use crate::middleware::{ApiResponse, ApiResult, PathParams};

pub fn routes(state: AppState) -> Router {
    let protected = super::protected(
        Router::new()
            .route("/projects", post(lifecycle::create).get(lifecycle::list))
            .route(
                "/projects/:id",
                get(lifecycle::show).put(lifecycle::update).delete(lifecycle::destroy),
            )
            .route("/projects/:id/members", post(members::add).get(members::list))
            .route("/projects/:id/members/:user_id", delete(members::remove)),
        &state,
    );

    let internal = super::internal(
        Router::new().route("/internal/projects/:id", get(summary)),
        &state,
    );

    protected.merge(internal).with_state(state)
}

/// GET /internal/projects/:id - what file and process services need to authorize access
async fn summary(State(state): State<AppState>, PathParams(id): PathParams<i64>) -> ApiResult<ProjectSummary> {
    Ok(ApiResponse::success(state.projects().summary(id).await?))
}
