use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};

use super::storage::FileStorage;
use super::{is_unique_violation, required_text, ServiceError, ServiceResult};
use crate::clients::ProjectClient;
use crate::config::AppConfig;
use crate::database::models::{FileRecord, Folder, ProjectSummary};
use crate::types::SkipLimit;

pub const MAX_FILE_NAME: usize = 255;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct UploadFileRequest {
    pub name: String,
    /// Base64 (standard alphabet) file body
    pub content: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<i64>,
}

/// File metadata as returned to clients; the blob location stays server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileResponse {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub size: i64,
    pub content_type: String,
    pub owner_id: i64,
    pub date_created: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FileRecord> for FileResponse {
    fn from(file: FileRecord) -> Self {
        Self {
            id: file.id,
            project_id: file.project_id,
            name: file.name,
            size: file.size,
            content_type: file.content_type,
            owner_id: file.owner_id,
            date_created: file.date_created,
            updated_at: file.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FolderLink {
    pub folder_id: i64,
    pub file_id: i64,
    pub linked_at: DateTime<Utc>,
}

pub struct FileService {
    pool: SqlitePool,
    config: Arc<AppConfig>,
    projects: ProjectClient,
    storage: FileStorage,
}

impl FileService {
    pub fn new(pool: SqlitePool, config: Arc<AppConfig>, projects: ProjectClient, storage: FileStorage) -> Self {
        Self {
            pool,
            config,
            projects,
            storage,
        }
    }

    /// Resolve the project through the project service and require membership.
    async fn authorize(&self, project_id: i64, user_id: i64) -> ServiceResult<ProjectSummary> {
        let project = self
            .projects
            .project(project_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Project not found"))?;
        if !project.has_member(user_id) {
            return Err(ServiceError::forbidden("Not a member of this project"));
        }
        Ok(project)
    }

    async fn require_file(&self, file_id: i64) -> ServiceResult<FileRecord> {
        sqlx::query_as::<_, FileRecord>("SELECT * FROM files_tb WHERE id = ?")
            .bind(file_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("File not found"))
    }

    async fn authorized_file(&self, file_id: i64, user_id: i64) -> ServiceResult<FileRecord> {
        let file = self.require_file(file_id).await?;
        self.authorize(file.project_id, user_id).await?;
        Ok(file)
    }

    async fn find_folder(&self, folder_id: i64) -> ServiceResult<Option<Folder>> {
        Ok(sqlx::query_as::<_, Folder>("SELECT * FROM folders_tb WHERE id = ?")
            .bind(folder_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn require_folder_in(&self, project_id: i64, folder_id: i64) -> ServiceResult<Folder> {
        self.find_folder(folder_id)
            .await?
            .filter(|f| f.project_id == project_id)
            .ok_or_else(|| ServiceError::not_found("Folder not found"))
    }

    // Files

    pub async fn upload(&self, project_id: i64, user_id: i64, req: UploadFileRequest) -> ServiceResult<FileResponse> {
        let name = required_text("name", &req.name, MAX_FILE_NAME)?;
        let bytes = STANDARD
            .decode(req.content.trim())
            .map_err(|_| ServiceError::validation("content", "must be valid base64"))?;
        if bytes.is_empty() {
            return Err(ServiceError::validation("content", "file must not be empty"));
        }
        let max = self.config.storage.max_file_size_bytes;
        if bytes.len() > max {
            return Err(ServiceError::PayloadTooLarge(format!(
                "File exceeds the maximum size of {} bytes",
                max
            )));
        }
        let content_type = req
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        self.authorize(project_id, user_id).await?;

        let blob = self.storage.store(project_id, &name, &bytes).await?;
        let now = Utc::now();
        let inserted = sqlx::query(
            "INSERT INTO files_tb (project_id, name, stored_name, path, size, content_type, owner_id, date_created, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(project_id)
        .bind(&name)
        .bind(&blob.stored_name)
        .bind(&blob.path)
        .bind(bytes.len() as i64)
        .bind(&content_type)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        let file_id = match inserted {
            Ok(result) => result.last_insert_rowid(),
            Err(e) => {
                if let Err(cleanup) = self.storage.remove(&blob.path).await {
                    warn!("Orphaned blob {} left behind: {}", blob.path, cleanup);
                }
                return Err(e.into());
            }
        };

        info!("User {} uploaded {} ({} bytes) to project {}", user_id, name, bytes.len(), project_id);
        Ok(self.require_file(file_id).await?.into())
    }

    pub async fn list(&self, project_id: i64, user_id: i64, paging: &SkipLimit) -> ServiceResult<Vec<FileResponse>> {
        self.authorize(project_id, user_id).await?;
        let (skip, limit) = paging.resolve(
            self.config.pagination.default_page_size,
            self.config.pagination.max_page_size,
        );

        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files_tb WHERE project_id = ? ORDER BY date_created DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(project_id)
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(files.into_iter().map(FileResponse::from).collect())
    }

    pub async fn get(&self, file_id: i64, user_id: i64) -> ServiceResult<FileResponse> {
        Ok(self.authorized_file(file_id, user_id).await?.into())
    }

    /// Metadata plus the raw blob.
    pub async fn content(&self, file_id: i64, user_id: i64) -> ServiceResult<(FileResponse, Vec<u8>)> {
        let file = self.authorized_file(file_id, user_id).await?;
        let bytes = match self.storage.read(&file.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob for file {} is missing at {}", file.id, file.path);
                return Err(ServiceError::not_found("File content not found"));
            }
            Err(e) => return Err(e.into()),
        };
        Ok((file.into(), bytes))
    }

    /// Rename changes the display name only; the stored blob keeps its name.
    pub async fn rename(&self, file_id: i64, user_id: i64, req: RenameRequest) -> ServiceResult<FileResponse> {
        let name = required_text("name", &req.name, MAX_FILE_NAME)?;
        let file = self.authorized_file(file_id, user_id).await?;

        sqlx::query("UPDATE files_tb SET name = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(Utc::now())
            .bind(file.id)
            .execute(&self.pool)
            .await?;
        Ok(self.require_file(file.id).await?.into())
    }

    pub async fn delete(&self, file_id: i64, user_id: i64) -> ServiceResult<()> {
        let file = self.authorized_file(file_id, user_id).await?;

        sqlx::query("DELETE FROM files_tb WHERE id = ?")
            .bind(file.id)
            .execute(&self.pool)
            .await?;
        if let Err(e) = self.storage.remove(&file.path).await {
            warn!("Could not remove blob {}: {}", file.path, e);
        }
        info!("User {} deleted file {}", user_id, file.id);
        Ok(())
    }

    pub async fn folders_of_file(&self, file_id: i64, user_id: i64) -> ServiceResult<Vec<Folder>> {
        let file = self.authorized_file(file_id, user_id).await?;
        Ok(sqlx::query_as::<_, Folder>(
            "SELECT f.* FROM folders_tb f JOIN folder_files_tb ff ON ff.folder_id = f.id
             WHERE ff.file_id = ? ORDER BY f.path",
        )
        .bind(file.id)
        .fetch_all(&self.pool)
        .await?)
    }

    // Folders

    pub async fn create_folder(&self, project_id: i64, user_id: i64, req: CreateFolderRequest) -> ServiceResult<Folder> {
        let name = folder_name(&req.name)?;
        self.authorize(project_id, user_id).await?;

        let parent_path = match req.parent_id {
            Some(parent_id) => {
                self.find_folder(parent_id)
                    .await?
                    .filter(|f| f.project_id == project_id)
                    .ok_or_else(|| ServiceError::not_found("Parent folder not found"))?
                    .path
            }
            None => String::new(),
        };
        let path = format!("{}/{}", parent_path, name);

        let now = Utc::now();
        let folder_id = sqlx::query(
            "INSERT INTO folders_tb (project_id, parent_id, name, path, owner_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(project_id)
        .bind(req.parent_id)
        .bind(&name)
        .bind(&path)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| folder_conflict(e, &path))?
        .last_insert_rowid();

        self.require_folder_in(project_id, folder_id).await
    }

    pub async fn list_folders(&self, project_id: i64, user_id: i64) -> ServiceResult<Vec<Folder>> {
        self.authorize(project_id, user_id).await?;
        Ok(
            sqlx::query_as::<_, Folder>("SELECT * FROM folders_tb WHERE project_id = ? ORDER BY path")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    pub async fn get_folder(&self, project_id: i64, folder_id: i64, user_id: i64) -> ServiceResult<Folder> {
        self.authorize(project_id, user_id).await?;
        self.require_folder_in(project_id, folder_id).await
    }

    /// Rename a folder; every descendant path is rewritten with it.
    pub async fn rename_folder(
        &self,
        project_id: i64,
        folder_id: i64,
        user_id: i64,
        req: RenameRequest,
    ) -> ServiceResult<Folder> {
        let name = folder_name(&req.name)?;
        self.authorize(project_id, user_id).await?;
        let folder = self.require_folder_in(project_id, folder_id).await?;
        if folder.name == name {
            return Ok(folder);
        }

        let parent_path = &folder.path[..folder.path.len() - folder.name.len() - 1];
        let new_path = format!("{}/{}", parent_path, name);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE folders_tb SET name = ?, path = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(&new_path)
            .bind(now)
            .bind(folder.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| folder_conflict(e, &new_path))?;
        sqlx::query(
            "UPDATE folders_tb SET path = ?1 || substr(path, ?2), updated_at = ?3
             WHERE project_id = ?4 AND substr(path, 1, ?2) = ?5",
        )
        .bind(&new_path)
        .bind(folder.path.chars().count() as i64 + 1)
        .bind(now)
        .bind(project_id)
        .bind(format!("{}/", folder.path))
        .execute(&mut *tx)
        .await
        .map_err(|e| folder_conflict(e, &new_path))?;
        tx.commit().await?;

        self.require_folder_in(project_id, folder.id).await
    }

    /// Delete a folder and its subfolders. Files stay; only their links go.
    pub async fn delete_folder(&self, project_id: i64, folder_id: i64, user_id: i64) -> ServiceResult<()> {
        self.authorize(project_id, user_id).await?;
        let folder = self.require_folder_in(project_id, folder_id).await?;
        sqlx::query("DELETE FROM folders_tb WHERE id = ?")
            .bind(folder.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Folder membership of files

    async fn folder_and_file(&self, folder_id: i64, file_id: i64, user_id: i64) -> ServiceResult<(Folder, FileRecord)> {
        let folder = self
            .find_folder(folder_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Folder not found"))?;
        let file = self.require_file(file_id).await?;
        if folder.project_id != file.project_id {
            return Err(ServiceError::bad_request("File and folder belong to different projects"));
        }
        self.authorize(folder.project_id, user_id).await?;
        Ok((folder, file))
    }

    pub async fn link(&self, folder_id: i64, file_id: i64, user_id: i64) -> ServiceResult<FolderLink> {
        let (folder, file) = self.folder_and_file(folder_id, file_id, user_id).await?;
        let linked_at = Utc::now();
        sqlx::query("INSERT INTO folder_files_tb (folder_id, file_id, linked_at) VALUES (?, ?, ?)")
            .bind(folder.id)
            .bind(file.id)
            .bind(linked_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ServiceError::conflict("File already in folder")
                } else {
                    e.into()
                }
            })?;

        Ok(FolderLink {
            folder_id: folder.id,
            file_id: file.id,
            linked_at,
        })
    }

    pub async fn unlink(&self, folder_id: i64, file_id: i64, user_id: i64) -> ServiceResult<()> {
        let (folder, file) = self.folder_and_file(folder_id, file_id, user_id).await?;
        let result = sqlx::query("DELETE FROM folder_files_tb WHERE folder_id = ? AND file_id = ?")
            .bind(folder.id)
            .bind(file.id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::not_found("File is not in this folder"));
        }
        Ok(())
    }

    pub async fn files_in_folder(&self, folder_id: i64, user_id: i64) -> ServiceResult<Vec<FileResponse>> {
        let folder = self
            .find_folder(folder_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Folder not found"))?;
        self.authorize(folder.project_id, user_id).await?;

        let files = sqlx::query_as::<_, FileRecord>(
            "SELECT f.* FROM files_tb f JOIN folder_files_tb ff ON ff.file_id = f.id
             WHERE ff.folder_id = ? ORDER BY f.name, f.id",
        )
        .bind(folder.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(files.into_iter().map(FileResponse::from).collect())
    }
}

fn folder_name(raw: &str) -> ServiceResult<String> {
    let name = required_text("name", raw, MAX_FILE_NAME)?;
    if name.contains('/') || name == "." || name == ".." {
        return Err(ServiceError::validation("name", "must not contain '/' or be '.' or '..'"));
    }
    Ok(name)
}

fn folder_conflict(err: sqlx::Error, path: &str) -> ServiceError {
    if is_unique_violation(&err) {
        ServiceError::conflict(format!("Folder {} already exists", path))
    } else {
        err.into()
    }
}
