// API gateway: one public entry point that forwards to the data services.

pub mod proxy;
pub mod routes;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use futures::future::join_all;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::handlers::files::upload_body_limit;
pub use proxy::Proxy;
pub use routes::{RouteMatch, RouteTable};

pub fn routes(config: Arc<AppConfig>) -> anyhow::Result<Router> {
    let proxy = Arc::new(Proxy::from_config(&config)?);

    Ok(Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .fallback(proxy::forward)
        .layer(DefaultBodyLimit::max(upload_body_limit(&config)))
        .with_state(proxy))
}

async fn root(State(proxy): State<Arc<Proxy>>) -> Json<Value> {
    let services: Map<String, Value> = proxy
        .upstreams()
        .map(|(service, url)| (service.as_str().to_string(), Value::String(url.to_string())))
        .collect();

    Json(json!({
        "success": true,
        "data": {
            "name": "TeamHub API gateway",
            "version": env!("CARGO_PKG_VERSION"),
            "services": services,
        }
    }))
}

/// Polls every upstream `/health` concurrently; degraded when any is down.
async fn health(State(proxy): State<Arc<Proxy>>) -> impl IntoResponse {
    let checks = proxy.upstreams().map(|(service, url)| {
        let request = proxy.http().get(format!("{}/health", url));
        async move {
            let status = match request.send().await {
                Ok(resp) if resp.status().is_success() => "ok",
                Ok(_) => "degraded",
                Err(_) => "unreachable",
            };
            (service, status)
        }
    });

    let results = join_all(checks).await;
    let healthy = results.iter().all(|(_, status)| *status == "ok");
    let services: Map<String, Value> = results
        .into_iter()
        .map(|(service, status)| (service.as_str().to_string(), Value::from(status)))
        .collect();

    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(json!({
            "status": if healthy { "ok" } else { "degraded" },
            "service": "gateway",
            "services": services,
        })),
    )
}
