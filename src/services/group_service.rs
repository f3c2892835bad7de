use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::sync::Arc;
use tracing::info;

use super::{like_pattern, optional_text, required_text, ServiceError, ServiceResult};
use crate::clients::{AccountClient, MemberCheck};
use crate::config::AppConfig;
use crate::database::models::{Group, GroupResponse, MemberRole, Membership, UserProfile, Visibility};
use crate::types::PageQuery;

pub const MAX_GROUP_NAME: usize = 100;
pub const MAX_GROUP_DESCRIPTION: usize = 500;

/// Columns of a group row plus its active member count, for `FROM groups_tb g`.
const GROUP_COLUMNS: &str = "g.id, g.name, g.description, g.visibility, g.owner_id, \
     g.invite_token_hash, g.invite_token_expires_at, g.created_at, g.updated_at, \
     (SELECT COUNT(*) FROM memberships_tb c WHERE c.group_id = g.id AND c.status = 'active') AS member_count";

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Serialize)]
pub struct GroupPage {
    pub groups: Vec<GroupResponse>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct InternalGroupPage {
    pub groups: Vec<GroupResponse>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
    pub pages: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct GroupStats {
    pub total_groups: i64,
    pub public_groups: i64,
    pub private_groups: i64,
    pub invite_only_groups: i64,
    pub total_memberships: i64,
    pub average_group_size: f64,
}

/// Membership row with the member's account profile, `null` when unavailable.
#[derive(Debug, Serialize)]
pub struct MemberView {
    #[serde(flatten)]
    pub membership: Membership,
    pub user: Option<UserProfile>,
}

#[derive(Debug, Serialize)]
pub struct GroupDetails {
    #[serde(flatten)]
    pub group: GroupResponse,
    pub members: Vec<MemberView>,
}

#[derive(Debug, FromRow)]
struct GroupWithRole {
    #[sqlx(flatten)]
    group: Group,
    #[sqlx(try_from = "String")]
    user_role: MemberRole,
}

pub(crate) async fn find_group(pool: &SqlitePool, group_id: i64) -> ServiceResult<Option<Group>> {
    let sql = format!("SELECT {} FROM groups_tb g WHERE g.id = ?", GROUP_COLUMNS);
    Ok(sqlx::query_as::<_, Group>(&sql).bind(group_id).fetch_optional(pool).await?)
}

pub(crate) async fn require_group(pool: &SqlitePool, group_id: i64) -> ServiceResult<Group> {
    find_group(pool, group_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("Group not found"))
}

pub(crate) async fn find_membership(
    pool: &SqlitePool,
    group_id: i64,
    user_id: i64,
) -> ServiceResult<Option<Membership>> {
    Ok(
        sqlx::query_as::<_, Membership>("SELECT * FROM memberships_tb WHERE group_id = ? AND user_id = ?")
            .bind(group_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Role of an active member, `None` for pending, removed or unknown users.
pub(crate) async fn active_role(pool: &SqlitePool, group_id: i64, user_id: i64) -> ServiceResult<Option<MemberRole>> {
    Ok(find_membership(pool, group_id, user_id)
        .await?
        .and_then(|m| m.effective_role()))
}

pub struct GroupService {
    pool: SqlitePool,
    config: Arc<AppConfig>,
    accounts: AccountClient,
}

impl GroupService {
    pub fn new(pool: SqlitePool, config: Arc<AppConfig>, accounts: AccountClient) -> Self {
        Self { pool, config, accounts }
    }

    pub async fn create(&self, user_id: i64, req: CreateGroupRequest) -> ServiceResult<GroupResponse> {
        let name = required_text("name", &req.name, MAX_GROUP_NAME)?;
        let description = optional_text("description", req.description.as_deref(), MAX_GROUP_DESCRIPTION)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let group_id = sqlx::query(
            "INSERT INTO groups_tb (name, description, visibility, owner_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(&description)
        .bind(req.visibility.as_str())
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO memberships_tb (group_id, user_id, role, status, joined_at, updated_at)
             VALUES (?, ?, 'owner', 'active', ?, ?)",
        )
        .bind(group_id)
        .bind(user_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("User {} created group {} ({})", user_id, name, group_id);
        let group = require_group(&self.pool, group_id).await?;
        Ok(group.into_response(Some(MemberRole::Owner)))
    }

    /// Groups where the caller is an active member, newest first.
    pub async fn list_user_groups(
        &self,
        user_id: i64,
        paging: &PageQuery,
        search: Option<&str>,
    ) -> ServiceResult<GroupPage> {
        let (page, size, offset) =
            paging.resolve(self.config.pagination.default_page_size, self.config.pagination.max_page_size);
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| like_pattern(&s.to_lowercase()));

        let filter = "JOIN memberships_tb m ON m.group_id = g.id AND m.user_id = ?1 AND m.status = 'active'
             WHERE (?2 IS NULL OR lower(g.name) LIKE ?2 ESCAPE '\\')";

        let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM groups_tb g {}", filter))
            .bind(user_id)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {}, m.role AS user_role FROM groups_tb g {} ORDER BY g.created_at DESC, g.id DESC LIMIT ?3 OFFSET ?4",
            GROUP_COLUMNS, filter
        );
        let rows = sqlx::query_as::<_, GroupWithRole>(&sql)
            .bind(user_id)
            .bind(&pattern)
            .bind(size as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        let groups: Vec<GroupResponse> = rows
            .into_iter()
            .map(|row| row.group.into_response(Some(row.user_role)))
            .collect();

        Ok(GroupPage {
            has_more: (offset as i64) + (groups.len() as i64) < total,
            groups,
            total,
            page,
            size,
        })
    }

    pub async fn get(&self, group_id: i64, user_id: i64) -> ServiceResult<GroupResponse> {
        let group = require_group(&self.pool, group_id).await?;
        let role = active_role(&self.pool, group_id, user_id).await?;
        if role.is_none() && group.visibility != Visibility::Public {
            return Err(ServiceError::forbidden("Access denied"));
        }
        Ok(group.into_response(role))
    }

    pub async fn update(&self, group_id: i64, user_id: i64, req: UpdateGroupRequest) -> ServiceResult<GroupResponse> {
        let group = require_group(&self.pool, group_id).await?;
        let role = active_role(&self.pool, group_id, user_id).await?;
        if !role.is_some_and(|r| r.can_manage()) {
            return Err(ServiceError::forbidden("Permission denied"));
        }

        let name = match req.name.as_deref() {
            Some(name) => required_text("name", name, MAX_GROUP_NAME)?,
            None => group.name.clone(),
        };
        let description = match req.description.as_deref() {
            Some(text) => optional_text("description", Some(text), MAX_GROUP_DESCRIPTION)?,
            None => group.description.clone(),
        };
        let visibility = req.visibility.unwrap_or(group.visibility);

        sqlx::query("UPDATE groups_tb SET name = ?, description = ?, visibility = ?, updated_at = ? WHERE id = ?")
            .bind(&name)
            .bind(&description)
            .bind(visibility.as_str())
            .bind(Utc::now())
            .bind(group_id)
            .execute(&self.pool)
            .await?;

        let group = require_group(&self.pool, group_id).await?;
        Ok(group.into_response(role))
    }

    pub async fn delete(&self, group_id: i64, user_id: i64) -> ServiceResult<()> {
        let group = require_group(&self.pool, group_id).await?;
        if group.owner_id != user_id {
            return Err(ServiceError::forbidden("Only the group owner can delete the group"));
        }

        sqlx::query("DELETE FROM groups_tb WHERE id = ?")
            .bind(group_id)
            .execute(&self.pool)
            .await?;
        info!("User {} deleted group {}", user_id, group_id);
        Ok(())
    }

    pub async fn transfer_ownership(
        &self,
        group_id: i64,
        user_id: i64,
        new_owner_id: i64,
    ) -> ServiceResult<GroupResponse> {
        let group = require_group(&self.pool, group_id).await?;
        if group.owner_id != user_id {
            return Err(ServiceError::forbidden("Only the group owner can transfer ownership"));
        }
        if new_owner_id == user_id {
            return Err(ServiceError::bad_request("User already owns the group"));
        }
        if active_role(&self.pool, group_id, new_owner_id).await?.is_none() {
            return Err(ServiceError::bad_request("New owner must be an active member of the group"));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE memberships_tb SET role = 'admin', updated_at = ? WHERE group_id = ? AND user_id = ?")
            .bind(now)
            .bind(group_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE memberships_tb SET role = 'owner', updated_at = ? WHERE group_id = ? AND user_id = ?")
            .bind(now)
            .bind(group_id)
            .bind(new_owner_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE groups_tb SET owner_id = ?, updated_at = ? WHERE id = ?")
            .bind(new_owner_id)
            .bind(now)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Group {} ownership moved from {} to {}", group_id, user_id, new_owner_id);
        let group = require_group(&self.pool, group_id).await?;
        Ok(group.into_response(Some(MemberRole::Admin)))
    }

    /// Group with its non-removed members and their profiles.
    pub async fn details(&self, group_id: i64, user_id: i64) -> ServiceResult<GroupDetails> {
        let group = self.get(group_id, user_id).await?;
        let memberships = sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships_tb WHERE group_id = ? AND status != 'removed' ORDER BY joined_at, id",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<i64> = memberships.iter().map(|m| m.user_id).collect();
        let mut profiles = self.accounts.users_or_empty(&ids).await;
        let members = memberships
            .into_iter()
            .map(|membership| MemberView {
                user: profiles.remove(&membership.user_id),
                membership,
            })
            .collect();

        Ok(GroupDetails { group, members })
    }

    // Internal surface, consumed by sibling services

    pub async fn list_all(
        &self,
        paging: &PageQuery,
        visibility: Option<Visibility>,
    ) -> ServiceResult<InternalGroupPage> {
        let (page, size, offset) = paging.resolve(
            self.config.pagination.default_page_size,
            self.config.pagination.internal_max_page_size,
        );
        let visibility = visibility.map(|v| v.as_str());

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM groups_tb WHERE ?1 IS NULL OR visibility = ?1")
            .bind(visibility)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {} FROM groups_tb g WHERE ?1 IS NULL OR g.visibility = ?1 ORDER BY g.id LIMIT ?2 OFFSET ?3",
            GROUP_COLUMNS
        );
        let groups = sqlx::query_as::<_, Group>(&sql)
            .bind(visibility)
            .bind(size as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(InternalGroupPage {
            groups: groups.into_iter().map(GroupResponse::from).collect(),
            total,
            page,
            size,
            pages: (total + size as i64 - 1) / size as i64,
        })
    }

    pub async fn search(&self, name: &str, limit: u32) -> ServiceResult<Vec<GroupResponse>> {
        let term = name.trim();
        if term.is_empty() {
            return Err(ServiceError::bad_request("Search name must not be empty"));
        }
        let limit = limit.clamp(1, self.config.pagination.internal_max_page_size);
        let sql = format!(
            "SELECT {} FROM groups_tb g WHERE lower(g.name) LIKE ? ESCAPE '\\' ORDER BY g.name, g.id LIMIT ?",
            GROUP_COLUMNS
        );
        let groups = sqlx::query_as::<_, Group>(&sql)
            .bind(like_pattern(&term.to_lowercase()))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(groups.into_iter().map(GroupResponse::from).collect())
    }

    pub async fn stats(&self) -> ServiceResult<GroupStats> {
        let (total, public, private, invite_only): (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COALESCE(SUM(visibility = 'public'), 0),
                    COALESCE(SUM(visibility = 'private'), 0),
                    COALESCE(SUM(visibility = 'invite_only'), 0)
             FROM groups_tb",
        )
        .fetch_one(&self.pool)
        .await?;
        let (memberships,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memberships_tb WHERE status = 'active'")
            .fetch_one(&self.pool)
            .await?;

        let average = if total == 0 {
            0.0
        } else {
            ((memberships as f64 / total as f64) * 100.0).round() / 100.0
        };

        Ok(GroupStats {
            total_groups: total,
            public_groups: public,
            private_groups: private,
            invite_only_groups: invite_only,
            total_memberships: memberships,
            average_group_size: average,
        })
    }

    pub async fn get_internal(&self, group_id: i64) -> ServiceResult<GroupResponse> {
        Ok(require_group(&self.pool, group_id).await?.into())
    }

    pub async fn active_members(&self, group_id: i64) -> ServiceResult<Vec<Membership>> {
        require_group(&self.pool, group_id).await?;
        Ok(sqlx::query_as::<_, Membership>(
            "SELECT * FROM memberships_tb WHERE group_id = ? AND status = 'active' ORDER BY joined_at, id",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn member_ids(&self, group_id: i64) -> ServiceResult<Vec<i64>> {
        Ok(self.active_members(group_id).await?.into_iter().map(|m| m.user_id).collect())
    }

    pub async fn user_groups(&self, user_id: i64) -> ServiceResult<Vec<GroupResponse>> {
        let sql = format!(
            "SELECT {}, m.role AS user_role FROM groups_tb g
             JOIN memberships_tb m ON m.group_id = g.id AND m.user_id = ? AND m.status = 'active'
             ORDER BY g.id",
            GROUP_COLUMNS
        );
        let rows = sqlx::query_as::<_, GroupWithRole>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.group.into_response(Some(row.user_role)))
            .collect())
    }

    pub async fn check_member(&self, group_id: i64, user_id: i64) -> ServiceResult<MemberCheck> {
        require_group(&self.pool, group_id).await?;
        let role = active_role(&self.pool, group_id, user_id).await?;
        Ok(MemberCheck {
            group_id,
            user_id,
            is_member: role.is_some(),
            role,
        })
    }
}
