use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

use super::{optional_text, required_text, ServiceError, ServiceResult};
use crate::clients::ProjectClient;
use crate::config::AppConfig;
use crate::database::models::{Element, ElementKind, ElementResponse, MoscowCategory, Task};
use crate::types::SkipLimit;

pub const MAX_TITLE: usize = 200;
pub const MAX_DESCRIPTION: usize = 2000;
pub const MAX_TASK_DESCRIPTION: usize = 500;

#[derive(Debug, Deserialize)]
pub struct CreateElementRequest {
    pub title: String,
    pub description: Option<String>,
    /// Required for MoSCoW items, ignored for todos
    pub category: Option<String>,
    pub project_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateElementRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub element_id: i64,
    pub description: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub description: Option<String>,
    pub is_finished: Option<bool>,
}

fn parse_category(raw: &str) -> ServiceResult<MoscowCategory> {
    raw.parse()
        .map_err(|_| ServiceError::validation("category", "must be one of must_have, should_have, could_have, wont_have"))
}

pub struct ProcessService {
    pool: SqlitePool,
    config: Arc<AppConfig>,
    projects: ProjectClient,
}

impl ProcessService {
    pub fn new(pool: SqlitePool, config: Arc<AppConfig>, projects: ProjectClient) -> Self {
        Self { pool, config, projects }
    }

    async fn authorize_project(&self, project_id: i64, user_id: i64) -> ServiceResult<()> {
        let project = self
            .projects
            .project(project_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Project not found"))?;
        if !project.has_member(user_id) {
            return Err(ServiceError::forbidden("Not a member of this project"));
        }
        Ok(())
    }

    async fn find_element(&self, element_id: i64) -> ServiceResult<Option<Element>> {
        Ok(sqlx::query_as::<_, Element>("SELECT * FROM elements_tb WHERE id = ?")
            .bind(element_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_task(&self, task_id: i64) -> ServiceResult<Option<Task>> {
        Ok(sqlx::query_as::<_, Task>("SELECT * FROM tasks_tb WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Element visible to `user_id`, optionally restricted to one kind.
    async fn element(&self, element_id: i64, user_id: i64, kind: Option<ElementKind>) -> ServiceResult<Element> {
        let element = self
            .find_element(element_id)
            .await?
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .ok_or_else(|| ServiceError::not_found("Element not found"))?;

        match element.project_id {
            Some(project_id) => self.authorize_project(project_id, user_id).await?,
            None if element.created_by != user_id => return Err(ServiceError::not_found("Element not found")),
            None => {}
        }
        Ok(element)
    }

    async fn tasks_of(&self, element_id: i64) -> ServiceResult<Vec<Task>> {
        Ok(
            sqlx::query_as::<_, Task>("SELECT * FROM tasks_tb WHERE element_id = ? ORDER BY created_at, id")
                .bind(element_id)
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn with_tasks(&self, element: Element) -> ServiceResult<ElementResponse> {
        let tasks = self.tasks_of(element.id).await?;
        Ok(element.into_response(Some(tasks)))
    }

    pub async fn create(
        &self,
        kind: ElementKind,
        user_id: i64,
        req: CreateElementRequest,
    ) -> ServiceResult<ElementResponse> {
        let title = required_text("title", &req.title, MAX_TITLE)?;
        let description = optional_text("description", req.description.as_deref(), MAX_DESCRIPTION)?;
        let category = match kind {
            ElementKind::Moscow => {
                let raw = req
                    .category
                    .as_deref()
                    .ok_or_else(|| ServiceError::validation("category", "is required"))?;
                Some(parse_category(raw)?.as_str())
            }
            ElementKind::Todo => None,
        };
        if let Some(project_id) = req.project_id {
            self.authorize_project(project_id, user_id).await?;
        }

        let now = Utc::now();
        let element_id = sqlx::query(
            "INSERT INTO elements_tb (kind, title, description, category, project_id, created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(kind.as_str())
        .bind(&title)
        .bind(&description)
        .bind(category)
        .bind(req.project_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        info!("User {} created {} {}", user_id, kind.as_str(), element_id);
        let element = self
            .find_element(element_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Element not found"))?;
        Ok(element.into_response(Some(Vec::new())))
    }

    /// Elements of one kind in a project, or the caller's own when no project is given.
    pub async fn list(
        &self,
        kind: ElementKind,
        user_id: i64,
        paging: &SkipLimit,
        project_id: Option<i64>,
        category: Option<&str>,
    ) -> ServiceResult<Vec<ElementResponse>> {
        let (skip, limit) = paging.resolve(
            self.config.pagination.default_page_size,
            self.config.pagination.max_page_size,
        );
        let category = category.map(parse_category).transpose()?.map(|c| c.as_str());

        let elements = match project_id {
            Some(project_id) => {
                self.authorize_project(project_id, user_id).await?;
                sqlx::query_as::<_, Element>(
                    "SELECT * FROM elements_tb
                     WHERE kind = ?1 AND project_id = ?2 AND (?3 IS NULL OR category = ?3)
                     ORDER BY id LIMIT ?4 OFFSET ?5",
                )
                .bind(kind.as_str())
                .bind(project_id)
                .bind(category)
                .bind(limit as i64)
                .bind(skip as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Element>(
                    "SELECT * FROM elements_tb
                     WHERE kind = ?1 AND created_by = ?2 AND (?3 IS NULL OR category = ?3)
                     ORDER BY id LIMIT ?4 OFFSET ?5",
                )
                .bind(kind.as_str())
                .bind(user_id)
                .bind(category)
                .bind(limit as i64)
                .bind(skip as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(elements.into_iter().map(|e| e.into_response(None)).collect())
    }

    pub async fn get(&self, kind: ElementKind, element_id: i64, user_id: i64) -> ServiceResult<ElementResponse> {
        let element = self.element(element_id, user_id, Some(kind)).await?;
        self.with_tasks(element).await
    }

    pub async fn update(
        &self,
        kind: ElementKind,
        element_id: i64,
        user_id: i64,
        req: UpdateElementRequest,
    ) -> ServiceResult<ElementResponse> {
        let element = self.element(element_id, user_id, Some(kind)).await?;

        let title = match req.title.as_deref() {
            Some(title) => required_text("title", title, MAX_TITLE)?,
            None => element.title,
        };
        let description = match req.description.as_deref() {
            Some(text) => optional_text("description", Some(text), MAX_DESCRIPTION)?,
            None => element.description,
        };
        let category = match (kind, req.category.as_deref()) {
            (ElementKind::Moscow, Some(raw)) => Some(parse_category(raw)?.as_str().to_string()),
            _ => element.category,
        };

        sqlx::query("UPDATE elements_tb SET title = ?, description = ?, category = ?, updated_at = ? WHERE id = ?")
            .bind(&title)
            .bind(&description)
            .bind(&category)
            .bind(Utc::now())
            .bind(element.id)
            .execute(&self.pool)
            .await?;

        let element = self
            .find_element(element.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Element not found"))?;
        self.with_tasks(element).await
    }

    pub async fn delete(&self, element_id: i64, user_id: i64) -> ServiceResult<()> {
        let element = self.element(element_id, user_id, None).await?;
        sqlx::query("DELETE FROM elements_tb WHERE id = ?")
            .bind(element.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // Tasks

    async fn task(&self, task_id: i64, user_id: i64) -> ServiceResult<Task> {
        let task = self
            .find_task(task_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Task not found"))?;
        // Tasks of elements the caller cannot see do not exist for them
        self.element(task.element_id, user_id, None)
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(_) => ServiceError::not_found("Task not found"),
                other => other,
            })?;
        Ok(task)
    }

    pub async fn create_task(&self, user_id: i64, req: CreateTaskRequest) -> ServiceResult<Task> {
        let description = required_text("description", &req.description, MAX_TASK_DESCRIPTION)?;
        let element = self.element(req.element_id, user_id, None).await?;

        let now = Utc::now();
        let task_id = sqlx::query(
            "INSERT INTO tasks_tb (element_id, description, is_finished, created_at, updated_at) VALUES (?, ?, 0, ?, ?)",
        )
        .bind(element.id)
        .bind(&description)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.find_task(task_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Task not found"))
    }

    pub async fn list_tasks(&self, element_id: i64, user_id: i64) -> ServiceResult<Vec<Task>> {
        let element = self.element(element_id, user_id, None).await?;
        self.tasks_of(element.id).await
    }

    pub async fn update_task(&self, task_id: i64, user_id: i64, req: UpdateTaskRequest) -> ServiceResult<Task> {
        let task = self.task(task_id, user_id).await?;
        let description = match req.description.as_deref() {
            Some(text) => required_text("description", text, MAX_TASK_DESCRIPTION)?,
            None => task.description,
        };
        let is_finished = req.is_finished.unwrap_or(task.is_finished);

        sqlx::query("UPDATE tasks_tb SET description = ?, is_finished = ?, updated_at = ? WHERE id = ?")
            .bind(&description)
            .bind(is_finished)
            .bind(Utc::now())
            .bind(task.id)
            .execute(&self.pool)
            .await?;
        self.find_task(task.id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Task not found"))
    }

    pub async fn delete_task(&self, task_id: i64, user_id: i64) -> ServiceResult<()> {
        let task = self.task(task_id, user_id).await?;
        sqlx::query("DELETE FROM tasks_tb WHERE id = ?")
            .bind(task.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
