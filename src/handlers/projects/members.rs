use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::database::models::ProjectMember;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody, PathParams};
use crate::services::project_service::{AddProjectMemberRequest, ProjectMemberView};

/// POST /projects/:id/members
pub async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    JsonBody(req): JsonBody<AddProjectMemberRequest>,
) -> ApiResult<ProjectMember> {
    let member = state.projects().add_member(id, user.user_id, req).await?;
    Ok(ApiResponse::created(member))
}

/// GET /projects/:id/members
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Vec<ProjectMemberView>> {
    Ok(ApiResponse::success(state.projects().list_members(id, user.user_id).await?))
}

/// DELETE /projects/:id/members/:user_id
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams((id, member_id)): PathParams<(i64, i64)>,
) -> ApiResult<()> {
    state.projects().remove_member(id, user.user_id, member_id).await?;
    Ok(ApiResponse::no_content())
}
