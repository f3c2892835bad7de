use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::{ElementKind, ElementResponse};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody, PathParams, QueryParams};
use crate::services::process_service::{CreateElementRequest, UpdateElementRequest};
use crate::types::SkipLimit;

#[derive(Debug, Default, Deserialize)]
pub struct ElementFilter {
    pub project_id: Option<i64>,
    pub category: Option<String>,
}

async fn create(state: AppState, kind: ElementKind, user: AuthUser, req: CreateElementRequest) -> ApiResult<ElementResponse> {
    let element = state.process().create(kind, user.user_id, req).await?;
    Ok(ApiResponse::created(element))
}

async fn list(
    state: AppState,
    kind: ElementKind,
    user: AuthUser,
    paging: SkipLimit,
    filter: ElementFilter,
) -> ApiResult<Vec<ElementResponse>> {
    // Todos have no category; a filter on one is ignored
    let category = match kind {
        ElementKind::Moscow => filter.category.as_deref(),
        ElementKind::Todo => None,
    };
    let elements = state
        .process()
        .list(kind, user.user_id, &paging, filter.project_id, category)
        .await?;
    Ok(ApiResponse::success(elements))
}

/// POST /process/todos
pub async fn create_todo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<CreateElementRequest>,
) -> ApiResult<ElementResponse> {
    create(state, ElementKind::Todo, user, req).await
}

/// POST /process/moscows
pub async fn create_moscow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(req): JsonBody<CreateElementRequest>,
) -> ApiResult<ElementResponse> {
    create(state, ElementKind::Moscow, user, req).await
}

/// GET /process/todos?skip=&limit=&project_id=
pub async fn list_todos(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    QueryParams(paging): QueryParams<SkipLimit>,
    QueryParams(filter): QueryParams<ElementFilter>,
) -> ApiResult<Vec<ElementResponse>> {
    list(state, ElementKind::Todo, user, paging, filter).await
}

/// GET /process/moscows?category=&project_id=&skip=&limit=
pub async fn list_moscows(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    QueryParams(paging): QueryParams<SkipLimit>,
    QueryParams(filter): QueryParams<ElementFilter>,
) -> ApiResult<Vec<ElementResponse>> {
    list(state, ElementKind::Moscow, user, paging, filter).await
}

pub async fn show_todo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<ElementResponse> {
    Ok(ApiResponse::success(
        state.process().get(ElementKind::Todo, id, user.user_id).await?,
    ))
}

pub async fn show_moscow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<ElementResponse> {
    Ok(ApiResponse::success(
        state.process().get(ElementKind::Moscow, id, user.user_id).await?,
    ))
}

pub async fn update_todo(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    JsonBody(req): JsonBody<UpdateElementRequest>,
) -> ApiResult<ElementResponse> {
    Ok(ApiResponse::success(
        state.process().update(ElementKind::Todo, id, user.user_id, req).await?,
    ))
}

pub async fn update_moscow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    JsonBody(req): JsonBody<UpdateElementRequest>,
) -> ApiResult<ElementResponse> {
    Ok(ApiResponse::success(
        state.process().update(ElementKind::Moscow, id, user.user_id, req).await?,
    ))
}

/// DELETE /process/elements/:id - either kind; tasks go with it
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<()> {
    state.process().delete(id, user.user_id).await?;
    Ok(ApiResponse::no_content())
}
