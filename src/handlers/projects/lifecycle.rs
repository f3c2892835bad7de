use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody, PathParams, QueryParams};
use crate::services::project_service::{CreateProjectRequest, ProjectResponse, UpdateProjectRequest};
use crate::types::SkipLimit;

#[derive(Debug, Default, Deserialize)]
pub struct GroupFilter {
    pub group_id: Option<i64>,
}

/// POST /projects
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<CreateProjectRequest>,
) -> ApiResult<ProjectResponse> {
    let project = state.projects().create(user.user_id, req).await?;
    Ok(ApiResponse::created(project))
}

/// GET /projects?skip=&limit=&group_id=
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    QueryParams(paging): QueryParams<SkipLimit>,
    QueryParams(filter): QueryParams<GroupFilter>,
) -> ApiResult<Vec<ProjectResponse>> {
    let projects = state.projects().list(user.user_id, &paging, filter.group_id).await?;
    Ok(ApiResponse::success(projects))
}

/// GET /projects/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<ProjectResponse> {
    Ok(ApiResponse::success(state.projects().get(id, user.user_id).await?))
}

/// PUT /projects/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    JsonBody(req): JsonBody<UpdateProjectRequest>,
) -> ApiResult<ProjectResponse> {
    Ok(ApiResponse::success(state.projects().update(id, user.user_id, req).await?))
}

/// DELETE /projects/:id
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<()> {
    state.projects().delete(id, user.user_id).await?;
    Ok(ApiResponse::no_content())
}
