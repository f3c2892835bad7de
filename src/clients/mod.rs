// Typed HTTP clients for sibling services. All calls go through `/internal` routes.

pub mod cache;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

use crate::config::AppConfig;
use crate::database::models::{MemberRole, ProjectSummary, UserProfile};
use crate::services::account_service::MAX_BATCH_IDS;
use crate::types::ServiceKind;

pub use cache::UserCache;
pub use upstream::{RetryPolicy, UpstreamClient, UpstreamError};

/// Response of `GET /internal/users/batch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBatch {
    pub users: HashMap<String, UserProfile>,
    pub missing: Vec<i64>,
}

/// Response of `GET /internal/groups/{id}/check-member/{user_id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberCheck {
    pub group_id: i64,
    pub user_id: i64,
    pub is_member: bool,
    pub role: Option<MemberRole>,
}

#[derive(Clone)]
pub struct AccountClient {
    upstream: UpstreamClient,
    cache: UserCache,
}

impl AccountClient {
    pub fn new(upstream: UpstreamClient, cache: UserCache) -> Self {
        Self { upstream, cache }
    }

    pub async fn user(&self, user_id: i64) -> Result<Option<UserProfile>, UpstreamError> {
        if let Some(profile) = self.cache.get(user_id).await {
            return Ok(Some(profile));
        }
        let profile: Option<UserProfile> = self
            .upstream
            .get_json(&format!("/internal/users/{}", user_id))
            .await?;
        if let Some(profile) = &profile {
            self.cache.insert(profile.clone()).await;
        }
        Ok(profile)
    }

    /// Profiles for many ids; unknown ids are simply absent from the map.
    pub async fn users(&self, user_ids: &[i64]) -> Result<HashMap<i64, UserProfile>, UpstreamError> {
        let mut found = HashMap::new();
        let mut to_fetch = Vec::new();
        for &id in user_ids {
            match self.cache.get(id).await {
                Some(profile) => {
                    found.insert(id, profile);
                }
                None => to_fetch.push(id),
            }
        }
        if to_fetch.is_empty() {
            return Ok(found);
        }

        // The account service caps the ids accepted per batch call
        for chunk in to_fetch.chunks(MAX_BATCH_IDS) {
            let ids = chunk.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
            let batch: Option<UserBatch> = self
                .upstream
                .get_json(&format!("/internal/users/batch?ids={}", ids))
                .await?;

            for profile in batch.map(|b| b.users.into_values().collect::<Vec<_>>()).unwrap_or_default() {
                self.cache.insert(profile.clone()).await;
                found.insert(profile.id, profile);
            }
        }
        Ok(found)
    }

    /// Best-effort enrichment: an unreachable account service yields no profiles.
    pub async fn users_or_empty(&self, user_ids: &[i64]) -> HashMap<i64, UserProfile> {
        match self.users(user_ids).await {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!("Profile lookup degraded: {}", e);
                HashMap::new()
            }
        }
    }
}

#[derive(Clone)]
pub struct GroupClient {
    upstream: UpstreamClient,
}

impl GroupClient {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    /// `Ok(None)` when the group does not exist.
    pub async fn check_member(&self, group_id: i64, user_id: i64) -> Result<Option<MemberCheck>, UpstreamError> {
        self.upstream
            .get_json(&format!("/internal/groups/{}/check-member/{}", group_id, user_id))
            .await
    }
}

#[derive(Clone)]
pub struct ProjectClient {
    upstream: UpstreamClient,
}

impl ProjectClient {
    pub fn new(upstream: UpstreamClient) -> Self {
        Self { upstream }
    }

    pub async fn project(&self, project_id: i64) -> Result<Option<ProjectSummary>, UpstreamError> {
        self.upstream
            .get_json(&format!("/internal/projects/{}", project_id))
            .await
    }
}

/// Clients for every sibling a data service may call, sharing one connection pool.
#[derive(Clone)]
pub struct ServiceClients {
    pub account: AccountClient,
    pub groups: GroupClient,
    pub projects: ProjectClient,
}

impl ServiceClients {
    pub fn from_config(config: &AppConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream.timeout_secs))
            .build()
            .map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;
        let retry = RetryPolicy::from_config(&config.upstream);
        let key = config.security.internal_api_key.clone();

        let client = |url: &str, service: ServiceKind| {
            UpstreamClient::new(http.clone(), url, service, retry, key.clone())
        };

        Ok(Self {
            account: AccountClient::new(
                client(&config.services.account_url, ServiceKind::Account)?,
                UserCache::new(Duration::from_secs(config.upstream.user_cache_ttl_secs)),
            ),
            groups: GroupClient::new(client(&config.services.group_url, ServiceKind::Groups)?),
            projects: ProjectClient::new(client(&config.services.project_url, ServiceKind::Projects)?),
        })
    }
}
