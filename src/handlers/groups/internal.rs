// Service-to-service lookups. No user context; guarded by the internal key.

use axum::extract::State;
use serde::Deserialize;

use crate::app::AppState;
use crate::clients::MemberCheck;
use crate::database::models::{GroupResponse, Membership, Visibility};
use crate::middleware::{ApiResponse, ApiResult, PathParams, QueryParams};
use crate::services::group_service::{GroupStats, InternalGroupPage};
use crate::types::PageQuery;

const DEFAULT_SEARCH_LIMIT: u32 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct VisibilityFilter {
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Deserialize)]
pub struct NameSearch {
    pub name: String,
    pub limit: Option<u32>,
}

pub async fn list(
    State(state): State<AppState>,
    QueryParams(paging): QueryParams<PageQuery>,
    QueryParams(filter): QueryParams<VisibilityFilter>,
) -> ApiResult<InternalGroupPage> {
    Ok(ApiResponse::success(
        state.groups().list_all(&paging, filter.visibility).await?,
    ))
}

pub async fn search(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<NameSearch>,
) -> ApiResult<Vec<GroupResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    Ok(ApiResponse::success(state.groups().search(&query.name, limit).await?))
}

pub async fn stats(State(state): State<AppState>) -> ApiResult<GroupStats> {
    Ok(ApiResponse::success(state.groups().stats().await?))
}

pub async fn show(State(state): State<AppState>, PathParams(id): PathParams<i64>) -> ApiResult<GroupResponse> {
    Ok(ApiResponse::success(state.groups().get_internal(id).await?))
}

pub async fn members(State(state): State<AppState>, PathParams(id): PathParams<i64>) -> ApiResult<Vec<Membership>> {
    Ok(ApiResponse::success(state.groups().active_members(id).await?))
}

pub async fn member_ids(State(state): State<AppState>, PathParams(id): PathParams<i64>) -> ApiResult<Vec<i64>> {
    Ok(ApiResponse::success(state.groups().member_ids(id).await?))
}

pub async fn user_groups(
    State(state): State<AppState>,
    PathParams(user_id): PathParams<i64>,
) -> ApiResult<Vec<GroupResponse>> {
    Ok(ApiResponse::success(state.groups().user_groups(user_id).await?))
}

pub async fn check_member(
    State(state): State<AppState>,
    PathParams((id, user_id)): PathParams<(i64, i64)>,
) -> ApiResult<MemberCheck> {
    Ok(ApiResponse::success(state.groups().check_member(id, user_id).await?))
}
