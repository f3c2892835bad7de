use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::clients::UserBatch;
use crate::database::models::UserProfile;
use crate::middleware::{ApiResponse, ApiResult, PathParams, QueryParams};
use crate::services::account_service::MAX_BATCH_IDS;
use crate::services::parse_id_list;

const DEFAULT_SEARCH_LIMIT: u32 = 10;
const MAX_SEARCH_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub ids: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub users: Vec<UserProfile>,
    pub count: usize,
}

/// GET /users/:id (also served on /internal)
pub async fn show(State(state): State<AppState>, PathParams(id): PathParams<i64>) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(state.accounts().profile(id).await?))
}

/// GET /users/batch?ids=1,2,3 (also served on /internal)
pub async fn batch(State(state): State<AppState>, QueryParams(query): QueryParams<BatchQuery>) -> ApiResult<UserBatch> {
    let ids = parse_id_list(&query.ids, MAX_BATCH_IDS)?;
    Ok(ApiResponse::success(state.accounts().batch(&ids).await?))
}

/// GET /users/search?q=&limit=
pub async fn search(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<SearchQuery>,
) -> ApiResult<SearchResult> {
    let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT);
    let users = state.accounts().search(&query.q, limit).await?;
    Ok(ApiResponse::success(SearchResult {
        count: users.len(),
        users,
    }))
}
