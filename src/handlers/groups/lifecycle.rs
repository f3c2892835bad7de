use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::GroupResponse;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody, PathParams, QueryParams};
use crate::services::group_service::{CreateGroupRequest, GroupDetails, GroupPage, UpdateGroupRequest};
use crate::types::PageQuery;

#[derive(Debug, Default, Deserialize)]
pub struct SearchFilter {
    pub search: Option<String>,
}

/// POST /groups
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<CreateGroupRequest>,
) -> ApiResult<GroupResponse> {
    let group = state.groups().create(user.user_id, req).await?;
    Ok(ApiResponse::created(group))
}

/// GET /groups?page=&size=&search=
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    QueryParams(paging): QueryParams<PageQuery>,
    QueryParams(filter): QueryParams<SearchFilter>,
) -> ApiResult<GroupPage> {
    let page = state
        .groups()
        .list_user_groups(user.user_id, &paging, filter.search.as_deref())
        .await?;
    Ok(ApiResponse::success(page))
}

/// GET /groups/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<GroupResponse> {
    Ok(ApiResponse::success(state.groups().get(id, user.user_id).await?))
}

/// PUT /groups/:id
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    JsonBody(req): JsonBody<UpdateGroupRequest>,
) -> ApiResult<GroupResponse> {
    Ok(ApiResponse::success(state.groups().update(id, user.user_id, req).await?))
}

/// DELETE /groups/:id
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<()> {
    state.groups().delete(id, user.user_id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /groups/:id/details
pub async fn details(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<GroupDetails> {
    Ok(ApiResponse::success(state.groups().details(id, user.user_id).await?))
}

/// POST /groups/:id/transfer-ownership/:user_id
pub async fn transfer_ownership(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams((id, new_owner_id)): PathParams<(i64, i64)>,
) -> ApiResult<GroupResponse> {
    let group = state
        .groups()
        .transfer_ownership(id, user.user_id, new_owner_id)
        .await?;
    Ok(ApiResponse::success(group))
}
