use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use tracing::info;

use super::{optional_text, required_text, ServiceError, ServiceResult};
use crate::clients::{AccountClient, GroupClient};
use crate::config::AppConfig;
use crate::database::models::{MemberRole, Project, ProjectMember, ProjectSummary, UserProfile};
use crate::types::SkipLimit;

pub const MAX_PROJECT_NAME: usize = 100;
pub const MAX_PROJECT_DESCRIPTION: usize = 1000;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
    pub group_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddProjectMemberRequest {
    pub user_id: i64,
    pub role: Option<MemberRole>,
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    #[serde(flatten)]
    pub project: Project,
    pub user_role: Option<MemberRole>,
}

#[derive(Debug, Serialize)]
pub struct ProjectMemberView {
    #[serde(flatten)]
    pub member: ProjectMember,
    pub user: Option<UserProfile>,
}

#[derive(Debug, FromRow)]
struct ProjectWithRole {
    #[sqlx(flatten)]
    project: Project,
    #[sqlx(try_from = "String")]
    user_role: MemberRole,
}

pub struct ProjectService {
    pool: SqlitePool,
    config: Arc<AppConfig>,
    groups: GroupClient,
    accounts: AccountClient,
}

impl ProjectService {
    pub fn new(pool: SqlitePool, config: Arc<AppConfig>, groups: GroupClient, accounts: AccountClient) -> Self {
        Self {
            pool,
            config,
            groups,
            accounts,
        }
    }

    async fn require_project(&self, project_id: i64) -> ServiceResult<Project> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects_tb WHERE id = ?")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Project not found"))
    }

    async fn role_of(&self, project_id: i64, user_id: i64) -> ServiceResult<Option<MemberRole>> {
        Ok(self.member_row(project_id, user_id).await?.map(|m| m.role))
    }

    async fn member_row(&self, project_id: i64, user_id: i64) -> ServiceResult<Option<ProjectMember>> {
        Ok(sqlx::query_as::<_, ProjectMember>(
            "SELECT * FROM project_members_tb WHERE project_id = ? AND user_id = ?",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn require_role(&self, project_id: i64, user_id: i64) -> ServiceResult<(Project, MemberRole)> {
        let project = self.require_project(project_id).await?;
        let role = self
            .role_of(project_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::forbidden("Not a member of this project"))?;
        Ok((project, role))
    }

    pub async fn create(&self, user_id: i64, req: CreateProjectRequest) -> ServiceResult<ProjectResponse> {
        let name = required_text("name", &req.name, MAX_PROJECT_NAME)?;
        let description = optional_text("description", req.description.as_deref(), MAX_PROJECT_DESCRIPTION)?;

        if let Some(group_id) = req.group_id {
            let check = self
                .groups
                .check_member(group_id, user_id)
                .await?
                .ok_or_else(|| ServiceError::not_found("Group not found"))?;
            if !check.is_member {
                return Err(ServiceError::forbidden("Not a member of this group"));
            }
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let project_id = sqlx::query(
            "INSERT INTO projects_tb (name, description, group_id, owner_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(&description)
        .bind(req.group_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query("INSERT INTO project_members_tb (project_id, user_id, role, added_at) VALUES (?, ?, 'owner', ?)")
            .bind(project_id)
            .bind(user_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("User {} created project {} ({})", user_id, name, project_id);
        Ok(ProjectResponse {
            project: self.require_project(project_id).await?,
            user_role: Some(MemberRole::Owner),
        })
    }

    /// Projects the caller belongs to, oldest first.
    pub async fn list(
        &self,
        user_id: i64,
        paging: &SkipLimit,
        group_id: Option<i64>,
    ) -> ServiceResult<Vec<ProjectResponse>> {
        let (skip, limit) = paging.resolve(
            self.config.pagination.default_page_size,
            self.config.pagination.max_page_size,
        );

        let rows = sqlx::query_as::<_, ProjectWithRole>(
            "SELECT p.*, pm.role AS user_role FROM projects_tb p
             JOIN project_members_tb pm ON pm.project_id = p.id AND pm.user_id = ?1
             WHERE ?2 IS NULL OR p.group_id = ?2
             ORDER BY p.id LIMIT ?3 OFFSET ?4",
        )
        .bind(user_id)
        .bind(group_id)
        .bind(limit as i64)
        .bind(skip as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ProjectResponse {
                project: row.project,
                user_role: Some(row.user_role),
            })
            .collect())
    }

    pub async fn get(&self, project_id: i64, user_id: i64) -> ServiceResult<ProjectResponse> {
        let (project, role) = self.require_role(project_id, user_id).await?;
        Ok(ProjectResponse {
            project,
            user_role: Some(role),
        })
    }

    pub async fn update(
        &self,
        project_id: i64,
        user_id: i64,
        req: UpdateProjectRequest,
    ) -> ServiceResult<ProjectResponse> {
        let (project, role) = self.require_role(project_id, user_id).await?;
        if !role.can_manage() {
            return Err(ServiceError::forbidden("Permission denied"));
        }

        let name = match req.name.as_deref() {
            Some(name) => required_text("name", name, MAX_PROJECT_NAME)?,
            None => project.name,
        };
        let description = match req.description.as_deref() {
            Some(text) => optional_text("description", Some(text), MAX_PROJECT_DESCRIPTION)?,
            None => project.description,
        };

        sqlx::query("UPDATE projects_tb SET name = ?, description = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(&description)
            .bind(Utc::now())
            .bind(project_id)
            .execute(&self.pool)
            .await?;

        Ok(ProjectResponse {
            project: self.require_project(project_id).await?,
            user_role: Some(role),
        })
    }

    pub async fn delete(&self, project_id: i64, user_id: i64) -> ServiceResult<()> {
        let project = self.require_project(project_id).await?;
        if project.owner_id != user_id {
            return Err(ServiceError::forbidden("Only the project owner can delete the project"));
        }
        sqlx::query("DELETE FROM projects_tb WHERE id = ?")
            .bind(project_id)
            .execute(&self.pool)
            .await?;
        info!("User {} deleted project {}", user_id, project_id);
        Ok(())
    }

    pub async fn add_member(
        &self,
        project_id: i64,
        actor_id: i64,
        req: AddProjectMemberRequest,
    ) -> ServiceResult<ProjectMember> {
        let (_, role) = self.require_role(project_id, actor_id).await?;
        if !role.can_manage() {
            return Err(ServiceError::forbidden("Permission denied"));
        }
        let new_role = req.role.unwrap_or(MemberRole::Member);
        if new_role == MemberRole::Owner {
            return Err(ServiceError::bad_request("A project has exactly one owner"));
        }
        if self.member_row(project_id, req.user_id).await?.is_some() {
            return Err(ServiceError::bad_request("User is already a member of this project"));
        }
        if self.accounts.user(req.user_id).await?.is_none() {
            return Err(ServiceError::not_found("User not found"));
        }

        sqlx::query("INSERT INTO project_members_tb (project_id, user_id, role, added_at) VALUES (?, ?, ?, ?)")
            .bind(project_id)
            .bind(req.user_id)
            .bind(new_role.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if super::is_unique_violation(&e) {
                    ServiceError::bad_request("User is already a member of this project")
                } else {
                    e.into()
                }
            })?;

        self.member_row(project_id, req.user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member not found"))
    }

    pub async fn list_members(&self, project_id: i64, actor_id: i64) -> ServiceResult<Vec<ProjectMemberView>> {
        self.require_role(project_id, actor_id).await?;
        let members = sqlx::query_as::<_, ProjectMember>(
            "SELECT * FROM project_members_tb WHERE project_id = ? ORDER BY added_at, id",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = members.iter().map(|m| m.user_id).collect();
        let mut profiles = self.accounts.users_or_empty(&ids).await;
        Ok(members
            .into_iter()
            .map(|member| ProjectMemberView {
                user: profiles.remove(&member.user_id),
                member,
            })
            .collect())
    }

    pub async fn remove_member(&self, project_id: i64, actor_id: i64, user_id: i64) -> ServiceResult<()> {
        let (_, actor_role) = self.require_role(project_id, actor_id).await?;
        if actor_id != user_id && !actor_role.can_manage() {
            return Err(ServiceError::forbidden("Permission denied"));
        }
        let member = self
            .member_row(project_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member not found"))?;
        if member.role == MemberRole::Owner {
            return Err(ServiceError::bad_request("Cannot remove the project owner"));
        }

        sqlx::query("DELETE FROM project_members_tb WHERE id = ?")
            .bind(member.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Authorization view for sibling services.
    pub async fn summary(&self, project_id: i64) -> ServiceResult<ProjectSummary> {
        let project = self.require_project(project_id).await?;
        let member_ids: Vec<(i64,)> =
            sqlx::query_as("SELECT user_id FROM project_members_tb WHERE project_id = ? ORDER BY id")
                .bind(project_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ProjectSummary {
            id: project.id,
            name: project.name,
            group_id: project.group_id,
            owner_id: project.owner_id,
            member_ids: member_ids.into_iter().map(|(id,)| id).collect(),
        })
    }
}
