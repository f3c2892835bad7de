use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::{Membership, MembershipStatus};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody, PathParams, QueryParams};
use crate::services::membership_service::{AddMemberRequest, UpdateMemberRequest};

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    pub status: Option<MembershipStatus>,
}

/// POST /groups/:id/members
pub async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    JsonBody(req): JsonBody<AddMemberRequest>,
) -> ApiResult<Membership> {
    let membership = state.memberships().add_member(id, user.user_id, req).await?;
    Ok(ApiResponse::created(membership))
}

/// GET /groups/:id/members?status=
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    QueryParams(filter): QueryParams<StatusFilter>,
) -> ApiResult<Vec<Membership>> {
    let members = state.memberships().list_members(id, user.user_id, filter.status).await?;
    Ok(ApiResponse::success(members))
}

/// GET /groups/:id/members/:user_id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams((id, member_id)): PathParams<(i64, i64)>,
) -> ApiResult<Membership> {
    Ok(ApiResponse::success(
        state.memberships().get_member(id, user.user_id, member_id).await?,
    ))
}

/// PUT /groups/:id/members/:user_id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams((id, member_id)): PathParams<(i64, i64)>,
    JsonBody(req): JsonBody<UpdateMemberRequest>,
) -> ApiResult<Membership> {
    let membership = state
        .memberships()
        .update_member_role(id, user.user_id, member_id, req)
        .await?;
    Ok(ApiResponse::success(membership))
}

/// DELETE /groups/:id/members/:user_id
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams((id, member_id)): PathParams<(i64, i64)>,
) -> ApiResult<()> {
    state.memberships().remove_member(id, user.user_id, member_id).await?;
    Ok(ApiResponse::no_content())
}
