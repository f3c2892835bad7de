use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::info;

use super::{like_pattern, FieldErrors, ServiceError, ServiceResult};
use crate::auth::password::check_password_policy;
use crate::auth::validation::{validate_email_format, validate_username_format};
use crate::auth::{hash_password, verify_password, AuthError, HashCost, JwtKeys, TokenSubject};
use crate::clients::UserBatch;
use crate::database::models::{User, UserProfile};

const MAX_FULL_NAME: usize = 100;
pub const MAX_BATCH_IDS: usize = 100;
pub const MIN_SEARCH_LEN: usize = 2;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email address
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    pub user: UserProfile,
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProfileWithRoles {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub roles: Vec<String>,
}

pub struct AccountService {
    pool: SqlitePool,
    keys: JwtKeys,
    cost: HashCost,
}

impl AccountService {
    pub fn new(pool: SqlitePool, keys: JwtKeys, cost: HashCost) -> Self {
        Self { pool, keys, cost }
    }

    pub async fn register(&self, req: RegisterRequest) -> ServiceResult<AuthResponse> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_lowercase();
        let full_name = req
            .full_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        let mut errors = FieldErrors::default();
        errors.check("username", validate_username_format(&username));
        errors.check("email", validate_email_format(&email));
        if let Err(AuthError::WeakPassword(problems)) = check_password_policy(&req.password) {
            errors.add("password", problems.join("; "));
        }
        if full_name.as_ref().is_some_and(|n| n.chars().count() > MAX_FULL_NAME) {
            errors.add("full_name", "must be at most 100 characters");
        }
        errors.into_result()?;

        if self.exists("username", &username).await? {
            return Err(ServiceError::bad_request("Username already exists"));
        }
        if self.exists("email", &email).await? {
            return Err(ServiceError::bad_request("Email already registered"));
        }

        let password = req.password;
        let cost = self.cost;
        let hashed = tokio::task::spawn_blocking(move || hash_password(&password, cost))
            .await
            .map_err(|e| AuthError::PasswordHash(e.to_string()))??;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO users_tb (username, email, full_name, hashed_password, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&username)
        .bind(&email)
        .bind(&full_name)
        .bind(&hashed)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            // Lost a race with a concurrent registration
            if super::is_unique_violation(&e) {
                ServiceError::bad_request(duplicate_user_message(&e))
            } else {
                ServiceError::from(e)
            }
        })?;
        let user_id = inserted.last_insert_rowid();

        sqlx::query("INSERT INTO user_roles_tb (user_id, role_id) SELECT ?, id FROM roles_tb WHERE name = 'user'")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!("Registered user {} ({})", username, user_id);
        let user = self.find_by_id(user_id).await?;
        let mut response = self.issue(user)?;
        response.message = Some("User registered successfully");
        Ok(response)
    }

    pub async fn login(&self, req: LoginRequest) -> ServiceResult<AuthResponse> {
        let login = req.username.trim();
        let user = sqlx::query_as::<_, User>("SELECT * FROM users_tb WHERE username = ? OR email = ? LIMIT 1")
            .bind(login)
            .bind(login.to_lowercase())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))?;

        let password = req.password;
        let stored = user.hashed_password.clone();
        let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| AuthError::PasswordHash(e.to_string()))??;

        if !matches {
            tracing::warn!("Failed login for user {}", user.id);
            return Err(ServiceError::Unauthorized("Invalid password".to_string()));
        }
        if !user.is_active {
            return Err(ServiceError::forbidden("Account is disabled"));
        }

        self.issue(user)
    }

    fn issue(&self, user: User) -> ServiceResult<AuthResponse> {
        let token = self.keys.issue(TokenSubject {
            user_id: user.id,
            username: &user.username,
            email: &user.email,
            full_name: user.full_name.as_deref(),
        })?;

        Ok(AuthResponse {
            message: None,
            user: user.into(),
            access_token: token.access_token,
            token_type: token.token_type,
            expires_in: token.expires_in,
            expires_at: token.expires_at,
        })
    }

    async fn exists(&self, column: &'static str, value: &str) -> ServiceResult<bool> {
        let sql = match column {
            "username" => "SELECT COUNT(*) FROM users_tb WHERE username = ?",
            _ => "SELECT COUNT(*) FROM users_tb WHERE email = ?",
        };
        let (count,): (i64,) = sqlx::query_as(sql).bind(value).fetch_one(&self.pool).await?;
        Ok(count > 0)
    }

    async fn find_by_id(&self, user_id: i64) -> ServiceResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users_tb WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("User not found"))
    }

    pub async fn profile(&self, user_id: i64) -> ServiceResult<UserProfile> {
        Ok(self.find_by_id(user_id).await?.into())
    }

    pub async fn profile_with_roles(&self, user_id: i64) -> ServiceResult<ProfileWithRoles> {
        let profile = self.profile(user_id).await?;
        let roles: Vec<(String,)> = sqlx::query_as(
            "SELECT r.name FROM roles_tb r JOIN user_roles_tb ur ON ur.role_id = r.id WHERE ur.user_id = ? ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ProfileWithRoles {
            profile,
            roles: roles.into_iter().map(|(name,)| name).collect(),
        })
    }

    /// Profiles keyed by id as a string; ids with no user are listed in `missing`.
    pub async fn batch(&self, ids: &[i64]) -> ServiceResult<UserBatch> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM users_tb WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let users = query.build_query_as::<User>().fetch_all(&self.pool).await?;
        let found: HashMap<String, UserProfile> = users
            .into_iter()
            .map(|u| (u.id.to_string(), UserProfile::from(u)))
            .collect();

        let missing = ids
            .iter()
            .copied()
            .filter(|id| !found.contains_key(&id.to_string()))
            .collect();

        Ok(UserBatch { users: found, missing })
    }

    pub async fn search(&self, query: &str, limit: u32) -> ServiceResult<Vec<UserProfile>> {
        let term = query.trim();
        if term.chars().count() < MIN_SEARCH_LEN {
            return Err(ServiceError::bad_request("Search query must be at least 2 characters"));
        }

        let pattern = like_pattern(&term.to_lowercase());
        let users = sqlx::query_as::<_, User>(
            r#"SELECT * FROM users_tb
               WHERE lower(username) LIKE ?1 ESCAPE '\'
                  OR lower(email) LIKE ?1 ESCAPE '\'
                  OR lower(coalesce(full_name, '')) LIKE ?1 ESCAPE '\'
               ORDER BY username
               LIMIT ?2"#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users.into_iter().map(UserProfile::from).collect())
    }

    /// Always succeeds so callers cannot probe for registered addresses.
    pub async fn forgot_password(&self, email: &str) -> ServiceResult<()> {
        let email = email.trim().to_lowercase();
        if self.exists("email", &email).await? {
            // No mail transport; the request is only recorded
            info!("Password reset requested for a registered address");
        }
        Ok(())
    }
}

/// Names the column behind a UNIQUE failure on `users_tb`.
fn duplicate_user_message(err: &sqlx::Error) -> &'static str {
    match err {
        sqlx::Error::Database(db) if db.message().contains("users_tb.email") => "Email already registered",
        _ => "Username already exists",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseManager;
    use crate::types::ServiceKind;

    async fn insert_user(pool: &SqlitePool, username: &str, email: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO users_tb (username, email, hashed_password, created_at, updated_at) VALUES (?, ?, 'x', ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(Utc::now())
        .bind(Utc::now())
        .execute(pool)
        .await
        .map(|_| ())
    }

    #[tokio::test]
    async fn duplicate_columns_are_told_apart() {
        let pool = DatabaseManager::in_memory().pool(ServiceKind::Account).await.unwrap();
        insert_user(&pool, "alice", "alice@example.com").await.unwrap();

        let err = insert_user(&pool, "alice2", "alice@example.com").await.unwrap_err();
        assert!(crate::services::is_unique_violation(&err));
        assert_eq!(duplicate_user_message(&err), "Email already registered");

        let err = insert_user(&pool, "alice", "other@example.com").await.unwrap_err();
        assert_eq!(duplicate_user_message(&err), "Username already exists");
    }
}
