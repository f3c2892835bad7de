use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use super::routes::{is_internal, RouteMatch, RouteTable};
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::types::ServiceKind;

pub const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request headers passed through to the upstream service.
const FORWARDED_REQUEST: [HeaderName; 3] = [header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT];

/// Response headers relayed back to the caller.
const FORWARDED_RESPONSE: [HeaderName; 3] = [header::CONTENT_TYPE, header::CONTENT_DISPOSITION, REQUEST_ID];

pub struct Proxy {
    http: reqwest::Client,
    table: RouteTable,
    upstreams: HashMap<ServiceKind, String>,
}

impl Proxy {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.upstream.timeout_secs))
            .build()?;

        let mut upstreams = HashMap::new();
        for (service, url) in [
            (ServiceKind::Account, &config.services.account_url),
            (ServiceKind::Groups, &config.services.group_url),
            (ServiceKind::Projects, &config.services.project_url),
            (ServiceKind::Files, &config.services.file_url),
            (ServiceKind::Process, &config.services.process_url),
        ] {
            Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid {} service URL {}: {}", service, url, e))?;
            upstreams.insert(service, url.trim_end_matches('/').to_string());
        }

        Ok(Self {
            http,
            table: RouteTable::standard(),
            upstreams,
        })
    }

    pub fn upstreams(&self) -> impl Iterator<Item = (ServiceKind, &str)> {
        ServiceKind::DATA_SERVICES
            .iter()
            .filter_map(|service| self.upstreams.get(service).map(|url| (*service, url.as_str())))
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn target_url(&self, route: &RouteMatch, query: Option<&str>) -> Result<String, ApiError> {
        let base = self
            .upstreams
            .get(&route.service)
            .ok_or_else(|| ApiError::internal_server_error(format!("No upstream for {}", route.service)))?;
        let raw = match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", base, route.path, q),
            _ => format!("{}{}", base, route.path),
        };
        let url = Url::parse(&raw).map_err(|_| ApiError::not_found("Route not found"))?;

        // Judge the path the upstream will actually see, after normalization
        let prefix = Url::parse(base).map(|b| b.path().trim_end_matches('/').to_string()).unwrap_or_default();
        let upstream_path = url.path().strip_prefix(prefix.as_str()).unwrap_or(url.path());
        if !upstream_path.starts_with('/') || is_internal(upstream_path) {
            return Err(ApiError::not_found("Route not found"));
        }
        Ok(url.to_string())
    }

    async fn forward(
        &self,
        route: RouteMatch,
        uri: &Uri,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, ApiError> {
        let url = self.target_url(&route, uri.query())?;
        let request_id = headers
            .get(&REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        debug!("[{}] {} {} -> {}", request_id, route.method, uri.path(), url);

        let mut request = self.http.request(route.method.clone(), &url).header(&REQUEST_ID, &request_id);
        for name in FORWARDED_REQUEST.iter() {
            if let Some(value) = headers.get(name) {
                request = request.header(name, value);
            }
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let service = route.service.display_name();
        let upstream = request.send().await.map_err(|e| {
            warn!("[{}] {} service request failed: {}", request_id, service, e);
            if e.is_timeout() {
                ApiError::gateway_timeout(format!("{} service did not respond in time", service))
            } else {
                ApiError::bad_gateway(format!("Cannot connect to {} service", service))
            }
        })?;

        let status = upstream.status();
        let mut relayed = HeaderMap::new();
        for name in FORWARDED_RESPONSE.iter() {
            if let Some(value) = upstream.headers().get(name) {
                relayed.insert(name.clone(), value.clone());
            }
        }
        if !relayed.contains_key(&REQUEST_ID) {
            if let Ok(value) = HeaderValue::from_str(&request_id) {
                relayed.insert(REQUEST_ID, value);
            }
        }

        let bytes = upstream.bytes().await.map_err(|e| {
            warn!("[{}] {} service response was cut short: {}", request_id, service, e);
            ApiError::bad_gateway(format!("Cannot connect to {} service", service))
        })?;

        Ok((status, relayed, bytes).into_response())
    }
}

/// Fallback handler: every request the gateway does not answer itself.
pub async fn forward(
    State(proxy): State<Arc<Proxy>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if is_internal(uri.path()) {
        return Err(ApiError::not_found("Route not found"));
    }

    let route = proxy
        .table
        .resolve(&method, uri.path())
        .ok_or_else(|| ApiError::not_found("Route not found"))?;

    proxy.forward(route, &uri, &headers, body).await
}
