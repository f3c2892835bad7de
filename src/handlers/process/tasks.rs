use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::database::models::Task;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody, PathParams};
use crate::services::process_service::{CreateTaskRequest, UpdateTaskRequest};

/// POST /process/tasks
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<CreateTaskRequest>,
) -> ApiResult<Task> {
    let task = state.process().create_task(user.user_id, req).await?;
    Ok(ApiResponse::created(task))
}

/// GET /process/elements/:id/tasks
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(element_id): PathParams<i64>,
) -> ApiResult<Vec<Task>> {
    Ok(ApiResponse::success(
        state.process().list_tasks(element_id, user.user_id).await?,
    ))
}

/// PUT /process/tasks/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    JsonBody(req): JsonBody<UpdateTaskRequest>,
) -> ApiResult<Task> {
    Ok(ApiResponse::success(
        state.process().update_task(id, user.user_id, req).await?,
    ))
}

/// DELETE /process/tasks/:id
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<()> {
    state.process().delete_task(id, user.user_id).await?;
    Ok(ApiResponse::no_content())
}
