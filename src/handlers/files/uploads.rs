use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension,
};

use crate::app::AppState;
use crate::database::models::Folder;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody, PathParams, QueryParams};
use crate::services::file_service::{FileResponse, RenameRequest, UploadFileRequest};
use crate::services::storage::sanitize_file_name;
use crate::types::SkipLimit;

/// POST /projects/:id/files - JSON body with base64 content
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(project_id): PathParams<i64>,
    JsonBody(req): JsonBody<UploadFileRequest>,
) -> ApiResult<FileResponse> {
    let file = state.files().upload(project_id, user.user_id, req).await?;
    Ok(ApiResponse::created(file))
}

/// GET /projects/:id/files?skip=&limit=
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(project_id): PathParams<i64>,
    QueryParams(paging): QueryParams<SkipLimit>,
) -> ApiResult<Vec<FileResponse>> {
    Ok(ApiResponse::success(
        state.files().list(project_id, user.user_id, &paging).await?,
    ))
}

/// GET /files/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<FileResponse> {
    Ok(ApiResponse::success(state.files().get(id, user.user_id).await?))
}

/// GET /files/:id/content - raw bytes, not enveloped
pub async fn content(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> Result<Response, ApiError> {
    let (file, bytes) = state.files().content(id, user.user_id).await?;

    let content_type = HeaderValue::from_str(&file.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        sanitize_file_name(&file.name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
        bytes,
    )
        .into_response())
}

/// PATCH /files/:id
pub async fn rename(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
    JsonBody(req): JsonBody<RenameRequest>,
) -> ApiResult<FileResponse> {
    Ok(ApiResponse::success(state.files().rename(id, user.user_id, req).await?))
}

/// DELETE /files/:id
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<()> {
    state.files().delete(id, user.user_id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /files/:id/folders
pub async fn folders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(id): PathParams<i64>,
) -> ApiResult<Vec<Folder>> {
    Ok(ApiResponse::success(state.files().folders_of_file(id, user.user_id).await?))
}
