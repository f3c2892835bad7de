#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use teamhub_api::app::build_app;
use teamhub_api::config::AppConfig;
use teamhub_api::database::DatabaseManager;
use teamhub_api::types::ServiceKind;

pub const INTERNAL_KEY: &str = "test-internal-key";
pub const PASSWORD: &str = "Sup3r-Secret!";

/// Every data service plus the gateway, each on its own loopback port with
/// private in-memory databases. Dropped with the test's runtime.
pub struct TestStack {
    pub client: reqwest::Client,
    pub config: Arc<AppConfig>,
    pub gateway: String,
    urls: HashMap<ServiceKind, String>,
    storage_dir: PathBuf,
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

async fn bind() -> Result<(TcpListener, String)> {
    let listener = TcpListener::bind("127.0.0.1:0").await.context("failed to bind test port")?;
    let url = format!("http://{}", listener.local_addr()?);
    Ok((listener, url))
}

/// Serve one app built from `config` on a fresh loopback port and return its base URL.
pub async fn serve_app(kind: ServiceKind, config: AppConfig) -> Result<String> {
    let (listener, url) = bind().await?;
    let app = build_app(kind, Arc::new(config), &DatabaseManager::in_memory()).await?;
    tokio::spawn(async move { axum::serve(listener, app).await });
    Ok(url)
}

impl TestStack {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(|_| {}).await
    }

    /// Like `spawn`, with a chance to adjust the shared config first.
    pub async fn spawn_with(tweak: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let mut listeners = Vec::new();
        let mut urls = HashMap::new();
        for service in ServiceKind::DATA_SERVICES {
            let (listener, url) = bind().await?;
            urls.insert(service, url);
            listeners.push((service, listener));
        }
        let (gateway_listener, gateway) = bind().await?;

        let storage_dir = std::env::temp_dir().join(format!("teamhub-test-{}", uuid::Uuid::new_v4()));

        let mut config = AppConfig::development();
        config.security.internal_api_key = Some(INTERNAL_KEY.to_string());
        config.security.argon2_memory_kib = 256;
        config.security.argon2_iterations = 1;
        config.upstream.max_attempts = 1;
        config.upstream.retry_delay_ms = 0;
        config.upstream.timeout_secs = 5;
        config.storage.root_dir = storage_dir.display().to_string();
        config.storage.max_file_size_bytes = 64 * 1024;
        config.services.account_url = urls[&ServiceKind::Account].clone();
        config.services.group_url = urls[&ServiceKind::Groups].clone();
        config.services.project_url = urls[&ServiceKind::Projects].clone();
        config.services.file_url = urls[&ServiceKind::Files].clone();
        config.services.process_url = urls[&ServiceKind::Process].clone();
        tweak(&mut config);
        let config = Arc::new(config);

        for (service, listener) in listeners {
            let app = build_app(service, config.clone(), &DatabaseManager::in_memory()).await?;
            tokio::spawn(async move { axum::serve(listener, app).await });
        }
        let app = build_app(ServiceKind::Gateway, config.clone(), &DatabaseManager::in_memory()).await?;
        tokio::spawn(async move { axum::serve(gateway_listener, app).await });

        Ok(Self {
            client: reqwest::Client::new(),
            config,
            gateway,
            urls,
            storage_dir,
        })
    }

    pub fn url(&self, service: ServiceKind, path: &str) -> String {
        format!("{}{}", self.urls[&service], path)
    }

    pub fn get(&self, service: ServiceKind, path: &str, user: &TestUser) -> RequestBuilder {
        self.client.get(self.url(service, path)).bearer_auth(&user.token)
    }

    pub fn post(&self, service: ServiceKind, path: &str, user: &TestUser, body: Value) -> RequestBuilder {
        self.client.post(self.url(service, path)).bearer_auth(&user.token).json(&body)
    }

    pub fn put(&self, service: ServiceKind, path: &str, user: &TestUser, body: Value) -> RequestBuilder {
        self.client.put(self.url(service, path)).bearer_auth(&user.token).json(&body)
    }

    pub fn patch(&self, service: ServiceKind, path: &str, user: &TestUser, body: Value) -> RequestBuilder {
        self.client.patch(self.url(service, path)).bearer_auth(&user.token).json(&body)
    }

    pub fn delete(&self, service: ServiceKind, path: &str, user: &TestUser) -> RequestBuilder {
        self.client.delete(self.url(service, path)).bearer_auth(&user.token)
    }

    pub fn internal(&self, service: ServiceKind, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(service, path))
            .header("x-internal-key", INTERNAL_KEY)
    }

    pub async fn register(&self, username: &str) -> Result<TestUser> {
        let res = self
            .client
            .post(self.url(ServiceKind::Account, "/auth/register"))
            .json(&json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": PASSWORD,
                "full_name": format!("{} Example", username),
            }))
            .send()
            .await?;
        let body = expect(res, StatusCode::CREATED).await?;
        Ok(TestUser {
            id: body["data"]["user"]["id"].as_i64().context("missing user id")?,
            username: username.to_string(),
            token: body["data"]["access_token"]
                .as_str()
                .context("missing access token")?
                .to_string(),
        })
    }

    /// Create a group owned by `owner` and return its id.
    pub async fn group(&self, owner: &TestUser, name: &str) -> Result<i64> {
        let res = self
            .post(ServiceKind::Groups, "/groups", owner, json!({ "name": name }))
            .send()
            .await?;
        let body = expect(res, StatusCode::CREATED).await?;
        body["data"]["id"].as_i64().context("missing group id")
    }

    /// Add `user` to the group as an active member.
    pub async fn add_member(&self, owner: &TestUser, group_id: i64, user: &TestUser) -> Result<()> {
        let res = self
            .post(
                ServiceKind::Groups,
                &format!("/groups/{}/members", group_id),
                owner,
                json!({ "user_id": user.id }),
            )
            .send()
            .await?;
        expect(res, StatusCode::CREATED).await?;
        Ok(())
    }

    /// Create a project in `group_id` and return its id.
    pub async fn project(&self, owner: &TestUser, group_id: i64, name: &str) -> Result<i64> {
        let res = self
            .post(
                ServiceKind::Projects,
                "/projects",
                owner,
                json!({ "name": name, "group_id": group_id }),
            )
            .send()
            .await?;
        let body = expect(res, StatusCode::CREATED).await?;
        body["data"]["id"].as_i64().context("missing project id")
    }
}

impl Drop for TestStack {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.storage_dir);
    }
}

/// Assert the status and return the JSON body.
pub async fn expect(res: Response, status: StatusCode) -> Result<Value> {
    let actual = res.status();
    let text = res.text().await?;
    anyhow::ensure!(actual == status, "expected {} but got {}: {}", status, actual, text);
    if text.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}

/// Assert an error response with the given status and message.
pub async fn expect_error(res: Response, status: StatusCode, message: &str) -> Result<Value> {
    let body = expect(res, status).await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], message, "unexpected error body: {}", body);
    Ok(body)
}
