use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, Sqlite, SqlitePool};
use std::sync::Arc;
use tracing::info;

use super::group_service::{active_role, find_membership, require_group};
use super::{ServiceError, ServiceResult};
use crate::auth::invite::token_matches;
use crate::auth::InviteToken;
use crate::clients::AccountClient;
use crate::config::AppConfig;
use crate::database::models::{MemberRole, Membership, MembershipStatus, Visibility};

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i64,
    pub role: Option<MemberRole>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: MemberRole,
}

#[derive(Debug, Default, Deserialize)]
pub struct JoinRequest {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InviteLink {
    pub invite_link: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct MembershipService {
    pool: SqlitePool,
    config: Arc<AppConfig>,
    accounts: AccountClient,
}

impl MembershipService {
    pub fn new(pool: SqlitePool, config: Arc<AppConfig>, accounts: AccountClient) -> Self {
        Self { pool, config, accounts }
    }

    async fn require_manager(&self, group_id: i64, actor_id: i64) -> ServiceResult<MemberRole> {
        require_group(&self.pool, group_id).await?;
        match active_role(&self.pool, group_id, actor_id).await? {
            Some(role) if role.can_manage() => Ok(role),
            _ => Err(ServiceError::forbidden("Permission denied")),
        }
    }

    async fn require_member(&self, group_id: i64, actor_id: i64) -> ServiceResult<MemberRole> {
        require_group(&self.pool, group_id).await?;
        active_role(&self.pool, group_id, actor_id)
            .await?
            .ok_or_else(|| ServiceError::forbidden("Not a member of this group"))
    }

    async fn require_account(&self, user_id: i64) -> ServiceResult<()> {
        match self.accounts.user(user_id).await? {
            Some(_) => Ok(()),
            None => Err(ServiceError::not_found("User not found")),
        }
    }

    /// Insert or overwrite the single membership row of `(group_id, user_id)`.
    async fn upsert(
        &self,
        group_id: i64,
        user_id: i64,
        role: MemberRole,
        status: MembershipStatus,
        invited_by: Option<i64>,
    ) -> ServiceResult<Membership> {
        write_membership(&self.pool, group_id, user_id, role, status, invited_by).await?;

        find_membership(&self.pool, group_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member not found"))
    }

    async fn set_status(&self, membership_id: i64, status: MembershipStatus) -> ServiceResult<()> {
        sqlx::query("UPDATE memberships_tb SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(membership_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_member(&self, group_id: i64, actor_id: i64, req: AddMemberRequest) -> ServiceResult<Membership> {
        self.require_manager(group_id, actor_id).await?;
        let role = req.role.unwrap_or(MemberRole::Member);
        if role == MemberRole::Owner {
            return Err(ServiceError::bad_request("Cannot assign owner role; transfer ownership instead"));
        }

        if let Some(existing) = find_membership(&self.pool, group_id, req.user_id).await? {
            if existing.status != MembershipStatus::Removed {
                return Err(ServiceError::bad_request("User is already a member"));
            }
        }
        self.require_account(req.user_id).await?;

        let membership = self
            .upsert(group_id, req.user_id, role, MembershipStatus::Active, Some(actor_id))
            .await?;
        info!("User {} added {} to group {} as {}", actor_id, req.user_id, group_id, role);
        Ok(membership)
    }

    /// Members of a group; removed rows only when `status` asks for them.
    pub async fn list_members(
        &self,
        group_id: i64,
        actor_id: i64,
        status: Option<MembershipStatus>,
    ) -> ServiceResult<Vec<Membership>> {
        self.require_member(group_id, actor_id).await?;

        let members = match status {
            Some(status) => {
                sqlx::query_as::<_, Membership>(
                    "SELECT * FROM memberships_tb WHERE group_id = ? AND status = ? ORDER BY joined_at, id",
                )
                .bind(group_id)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Membership>(
                    "SELECT * FROM memberships_tb WHERE group_id = ? AND status != 'removed' ORDER BY joined_at, id",
                )
                .bind(group_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(members)
    }

    pub async fn get_member(&self, group_id: i64, actor_id: i64, user_id: i64) -> ServiceResult<Membership> {
        self.require_member(group_id, actor_id).await?;
        find_membership(&self.pool, group_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member not found"))
    }

    pub async fn update_member_role(
        &self,
        group_id: i64,
        actor_id: i64,
        user_id: i64,
        req: UpdateMemberRequest,
    ) -> ServiceResult<Membership> {
        self.require_manager(group_id, actor_id).await?;
        let membership = find_membership(&self.pool, group_id, user_id)
            .await?
            .filter(|m| m.status != MembershipStatus::Removed)
            .ok_or_else(|| ServiceError::not_found("Member not found"))?;

        if membership.role == MemberRole::Owner {
            return Err(ServiceError::bad_request("Cannot change the role of the group owner"));
        }
        if req.role == MemberRole::Owner {
            return Err(ServiceError::bad_request("Cannot assign owner role; transfer ownership instead"));
        }

        sqlx::query("UPDATE memberships_tb SET role = ?, updated_at = ? WHERE id = ?")
            .bind(req.role.as_str())
            .bind(Utc::now())
            .bind(membership.id)
            .execute(&self.pool)
            .await?;

        find_membership(&self.pool, group_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member not found"))
    }

    pub async fn remove_member(&self, group_id: i64, actor_id: i64, user_id: i64) -> ServiceResult<()> {
        if actor_id != user_id {
            self.require_manager(group_id, actor_id).await?;
        } else {
            require_group(&self.pool, group_id).await?;
        }

        let membership = find_membership(&self.pool, group_id, user_id)
            .await?
            .filter(|m| m.status != MembershipStatus::Removed)
            .ok_or_else(|| ServiceError::not_found("Member not found"))?;
        if membership.role == MemberRole::Owner {
            return Err(ServiceError::bad_request("Cannot remove the group owner"));
        }

        self.set_status(membership.id, MembershipStatus::Removed).await?;
        info!("User {} removed {} from group {}", actor_id, user_id, group_id);
        Ok(())
    }

    pub async fn invite(&self, group_id: i64, actor_id: i64, req: AddMemberRequest) -> ServiceResult<Membership> {
        self.require_manager(group_id, actor_id).await?;
        let role = req.role.unwrap_or(MemberRole::Member);
        if role == MemberRole::Owner {
            return Err(ServiceError::bad_request("Cannot assign owner role; transfer ownership instead"));
        }

        if let Some(existing) = find_membership(&self.pool, group_id, req.user_id).await? {
            match existing.status {
                MembershipStatus::Active => return Err(ServiceError::bad_request("User is already a member")),
                MembershipStatus::Pending => {
                    return Err(ServiceError::bad_request("User already has a pending invitation"))
                }
                MembershipStatus::Removed => {}
            }
        }
        self.require_account(req.user_id).await?;

        self.upsert(group_id, req.user_id, role, MembershipStatus::Pending, Some(actor_id))
            .await
    }

    async fn pending_invitation(&self, group_id: i64, user_id: i64) -> ServiceResult<Membership> {
        require_group(&self.pool, group_id).await?;
        let membership = find_membership(&self.pool, group_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invitation not found"))?;
        if membership.status != MembershipStatus::Pending {
            return Err(ServiceError::bad_request("Invitation is not pending"));
        }
        Ok(membership)
    }

    pub async fn accept_invitation(&self, group_id: i64, user_id: i64) -> ServiceResult<Membership> {
        let membership = self.pending_invitation(group_id, user_id).await?;
        self.set_status(membership.id, MembershipStatus::Active).await?;
        info!("User {} accepted the invitation to group {}", user_id, group_id);

        find_membership(&self.pool, group_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Invitation not found"))
    }

    pub async fn decline_invitation(&self, group_id: i64, user_id: i64) -> ServiceResult<()> {
        let membership = self.pending_invitation(group_id, user_id).await?;
        sqlx::query("DELETE FROM memberships_tb WHERE id = ?")
            .bind(membership.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn leave(&self, group_id: i64, user_id: i64) -> ServiceResult<()> {
        require_group(&self.pool, group_id).await?;
        let membership = find_membership(&self.pool, group_id, user_id)
            .await?
            .filter(Membership::is_active)
            .ok_or_else(|| ServiceError::not_found("Not a member of this group"))?;
        if membership.role == MemberRole::Owner {
            return Err(ServiceError::forbidden(
                "Owner cannot leave the group; transfer ownership first",
            ));
        }

        self.set_status(membership.id, MembershipStatus::Removed).await
    }

    /// Mint a fresh invite link, replacing any previous one.
    pub async fn create_invite_link(&self, group_id: i64, actor_id: i64) -> ServiceResult<InviteLink> {
        self.require_manager(group_id, actor_id).await?;

        let invite = InviteToken::generate();
        let expires_at = Utc::now() + Duration::hours(self.config.security.invite_link_expiry_hours);
        sqlx::query(
            "UPDATE groups_tb SET invite_token_hash = ?, invite_token_expires_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&invite.hash)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(group_id)
        .execute(&self.pool)
        .await?;

        let base = self.config.security.invite_base_url.trim_end_matches('/');
        Ok(InviteLink {
            invite_link: format!("{}/join-group/{}?token={}", base, group_id, invite.token),
            token: invite.token,
            expires_at,
        })
    }

    pub async fn join(&self, group_id: i64, user_id: i64, req: JoinRequest) -> ServiceResult<Membership> {
        let group = require_group(&self.pool, group_id).await?;
        let existing = find_membership(&self.pool, group_id, user_id).await?;
        if existing.as_ref().is_some_and(Membership::is_active) {
            return Err(ServiceError::bad_request("User is already a member"));
        }

        if group.visibility != Visibility::Public {
            let valid = match (req.token.as_deref(), &group.invite_token_hash, group.invite_token_expires_at) {
                (Some(token), Some(hash), Some(expires_at)) => expires_at > Utc::now() && token_matches(token, hash),
                _ => false,
            };
            if !valid {
                return Err(ServiceError::bad_request("Invalid or expired invite token"));
            }
        }

        let role = existing
            .filter(|m| m.status == MembershipStatus::Pending)
            .map(|m| m.role)
            .unwrap_or(MemberRole::Member);

        // Burning the token and activating the membership commit together
        let mut tx = self.pool.begin().await?;
        if group.visibility != Visibility::Public {
            // Single use; a concurrent redeemer loses the race here.
            let cleared = sqlx::query(
                "UPDATE groups_tb SET invite_token_hash = NULL, invite_token_expires_at = NULL
                 WHERE id = ? AND invite_token_hash = ?",
            )
            .bind(group_id)
            .bind(&group.invite_token_hash)
            .execute(&mut *tx)
            .await?;
            if cleared.rows_affected() == 0 {
                return Err(ServiceError::bad_request("Invalid or expired invite token"));
            }
        }
        write_membership(&mut *tx, group_id, user_id, role, MembershipStatus::Active, None).await?;
        tx.commit().await?;

        info!("User {} joined group {}", user_id, group_id);
        find_membership(&self.pool, group_id, user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Member not found"))
    }
}

async fn write_membership<'e, E>(
    executor: E,
    group_id: i64,
    user_id: i64,
    role: MemberRole,
    status: MembershipStatus,
    invited_by: Option<i64>,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO memberships_tb (group_id, user_id, role, status, invited_by, joined_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (group_id, user_id) DO UPDATE SET
            role = excluded.role,
            status = excluded.status,
            invited_by = excluded.invited_by,
            joined_at = excluded.joined_at,
            updated_at = excluded.updated_at",
    )
    .bind(group_id)
    .bind(user_id)
    .bind(role.as_str())
    .bind(status.as_str())
    .bind(invited_by)
    .bind(now)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}
