use axum::{extract::State, Extension};

use crate::app::AppState;
use crate::database::models::Folder;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody, PathParams};
use crate::services::file_service::{CreateFolderRequest, FileResponse, FolderLink, RenameRequest};

/// POST /projects/:id/folders
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(project_id): PathParams<i64>,
    JsonBody(req): JsonBody<CreateFolderRequest>,
) -> ApiResult<Folder> {
    let folder = state.files().create_folder(project_id, user.user_id, req).await?;
    Ok(ApiResponse::created(folder))
}

/// GET /projects/:id/folders
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(project_id): PathParams<i64>,
) -> ApiResult<Vec<Folder>> {
    Ok(ApiResponse::success(
        state.files().list_folders(project_id, user.user_id).await?,
    ))
}

/// GET /projects/:id/folders/:folder_id
pub async fn show(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams((project_id, folder_id)): PathParams<(i64, i64)>,
) -> ApiResult<Folder> {
    Ok(ApiResponse::success(
        state.files().get_folder(project_id, folder_id, user.user_id).await?,
    ))
}

/// PATCH /projects/:id/folders/:folder_id
pub async fn rename(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams((project_id, folder_id)): PathParams<(i64, i64)>,
    JsonBody(req): JsonBody<RenameRequest>,
) -> ApiResult<Folder> {
    let folder = state
        .files()
        .rename_folder(project_id, folder_id, user.user_id, req)
        .await?;
    Ok(ApiResponse::success(folder))
}

/// DELETE /projects/:id/folders/:folder_id
pub async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams((project_id, folder_id)): PathParams<(i64, i64)>,
) -> ApiResult<()> {
    state.files().delete_folder(project_id, folder_id, user.user_id).await?;
    Ok(ApiResponse::no_content())
}

/// GET /folders/:id/files
pub async fn files(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams(folder_id): PathParams<i64>,
) -> ApiResult<Vec<FileResponse>> {
    Ok(ApiResponse::success(
        state.files().files_in_folder(folder_id, user.user_id).await?,
    ))
}

/// POST /folders/:id/files/:file_id
pub async fn link(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams((folder_id, file_id)): PathParams<(i64, i64)>,
) -> ApiResult<FolderLink> {
    let link = state.files().link(folder_id, file_id, user.user_id).await?;
    Ok(ApiResponse::created(link))
}

/// DELETE /folders/:id/files/:file_id
pub async fn unlink(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    PathParams((folder_id, file_id)): PathParams<(i64, i64)>,
) -> ApiResult<()> {
    state.files().unlink(folder_id, file_id, user.user_id).await?;
    Ok(ApiResponse::no_content())
}
