// Router assembly: one axum Router per service, or every data service merged into one.

use anyhow::Context;
use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::{HashCost, JwtKeys};
use crate::clients::ServiceClients;
use crate::config::AppConfig;
use crate::database::DatabaseManager;
use crate::services::{
    AccountService, FileService, FileStorage, GroupService, MembershipService, ProcessService, ProjectService,
};
use crate::types::ServiceKind;
use crate::{gateway, handlers};

/// Shared state of one data service.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pool: SqlitePool,
    pub jwt: JwtKeys,
    pub clients: ServiceClients,
    pub storage: FileStorage,
}

impl AppState {
    pub fn accounts(&self) -> AccountService {
        AccountService::new(
            self.pool.clone(),
            self.jwt.clone(),
            HashCost::from_config(&self.config.security),
        )
    }

    pub fn groups(&self) -> GroupService {
        GroupService::new(self.pool.clone(), self.config.clone(), self.clients.account.clone())
    }

    pub fn memberships(&self) -> MembershipService {
        MembershipService::new(self.pool.clone(), self.config.clone(), self.clients.account.clone())
    }

    pub fn projects(&self) -> ProjectService {
        ProjectService::new(
            self.pool.clone(),
            self.config.clone(),
            self.clients.groups.clone(),
            self.clients.account.clone(),
        )
    }

    pub fn files(&self) -> FileService {
        FileService::new(
            self.pool.clone(),
            self.config.clone(),
            self.clients.projects.clone(),
            self.storage.clone(),
        )
    }

    pub fn process(&self) -> ProcessService {
        ProcessService::new(self.pool.clone(), self.config.clone(), self.clients.projects.clone())
    }
}

#[derive(Clone)]
struct HealthState {
    service: ServiceKind,
    pools: Vec<(ServiceKind, SqlitePool)>,
}

/// Build the router for `kind`. Opening a pool also creates its tables.
pub async fn build_app(kind: ServiceKind, config: Arc<AppConfig>, db: &DatabaseManager) -> anyhow::Result<Router> {
    let router = match kind {
        ServiceKind::Gateway => gateway::routes(config.clone())?,
        _ => {
            let jwt = JwtKeys::from_config(&config.security)?;
            let clients = ServiceClients::from_config(&config)?;
            let storage = FileStorage::new(&config.storage.root_dir);

            let services: Vec<ServiceKind> = match kind {
                ServiceKind::All => ServiceKind::DATA_SERVICES.to_vec(),
                single => vec![single],
            };

            let mut router = Router::new();
            let mut pools = Vec::with_capacity(services.len());
            for service in services {
                let pool = db.pool(service).await?;
                pools.push((service, pool.clone()));
                let state = AppState {
                    config: config.clone(),
                    pool,
                    jwt: jwt.clone(),
                    clients: clients.clone(),
                    storage: storage.clone(),
                };
                router = router.merge(service_routes(service, state));
            }

            router.merge(
                Router::new()
                    .route("/", get(root))
                    .route("/health", get(health))
                    .with_state(HealthState { service: kind, pools }),
            )
        }
    };

    Ok(with_common_layers(router, &config))
}

/// Bind `host:port` and serve `kind` until ctrl-c.
pub async fn serve(kind: ServiceKind, config: Arc<AppConfig>, host: &str, port: u16) -> anyhow::Result<()> {
    config.validate()?;

    let db = DatabaseManager::new(&config.database);
    let app = build_app(kind, config.clone(), &db).await?;

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!(
        "TeamHub {} listening on http://{} ({:?})",
        kind.display_name(),
        bind_addr,
        config.environment
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close_all().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

fn service_routes(service: ServiceKind, state: AppState) -> Router {
    match service {
        ServiceKind::Account => handlers::account::routes(state),
        ServiceKind::Groups => handlers::groups::routes(state),
        ServiceKind::Projects => handlers::projects::routes(state),
        ServiceKind::Files => handlers::files::routes(state),
        ServiceKind::Process => handlers::process::routes(state),
        ServiceKind::Gateway | ServiceKind::All => Router::new(),
    }
}

pub fn with_common_layers(router: Router, config: &AppConfig) -> Router {
    let router = if config.security.enable_cors {
        router.layer(cors_layer(&config.security.cors_origins))
    } else {
        router
    };
    router.layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

async fn root(State(state): State<HealthState>) -> Json<serde_json::Value> {
    let services: Vec<&str> = state.pools.iter().map(|(s, _)| s.as_str()).collect();
    Json(json!({
        "success": true,
        "data": {
            "name": format!("TeamHub {} service", state.service.display_name()),
            "version": env!("CARGO_PKG_VERSION"),
            "services": services,
        }
    }))
}

async fn health(State(state): State<HealthState>) -> impl IntoResponse {
    let mut failed = Vec::new();
    for (service, pool) in &state.pools {
        if let Err(e) = DatabaseManager::health_check(pool).await {
            warn!("Health check failed for {}: {}", service, e);
            failed.push(service.as_str());
        }
    }

    if failed.is_empty() {
        (
            StatusCode::OK,
            Json(json!({ "status": "ok", "service": state.service.as_str(), "database": "ok" })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "service": state.service.as_str(),
                "database": "unavailable",
                "failed": failed,
            })),
        )
    }
}
