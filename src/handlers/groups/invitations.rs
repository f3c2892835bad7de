use axum::{body::Bytes, extract::State, Extension};

use crate::app::AppState;
use crate::database::models::Membership;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody, PathParams};
use crate::services::membership_service::{AddMemberRequest, InviteLink, JoinRequest};

/// POST /groups/:id/invite
pub async fn invite(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    JsonBody(req): JsonBody<AddMemberRequest>,
) -> ApiResult<Membership> {
    let membership = state.memberships().invite(id, user.user_id, req).await?;
    Ok(ApiResponse::created(membership))
}

/// POST /groups/:id/accept-invitation
pub async fn accept(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Membership> {
    Ok(ApiResponse::success(
        state.memberships().accept_invitation(id, user.user_id).await?,
    ))
}

/// POST /groups/:id/decline-invitation
pub async fn decline(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<()> {
    state.memberships().decline_invitation(id, user.user_id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /groups/:id/leave
pub async fn leave(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<()> {
    state.memberships().leave(id, user.user_id).await?;
    Ok(ApiResponse::no_content())
}

/// POST /groups/:id/invite-link
pub async fn invite_link(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<InviteLink> {
    let link = state.memberships().create_invite_link(id, user.user_id).await?;
    Ok(ApiResponse::created(link))
}

/// POST /groups/:id/join - body `{"token": ...}` is optional for public groups
pub async fn join(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    body: Bytes,
) -> ApiResult<Membership> {
    let req: JoinRequest = if body.iter().all(u8::is_ascii_whitespace) {
        JoinRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::invalid_json(e.to_string()))?
    };
    let membership = state.memberships().join(id, user.user_id, req).await?;
    Ok(ApiResponse::success(membership))
}
