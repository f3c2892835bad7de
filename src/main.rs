use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use teamhub_api::{app, config, types::ServiceKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, SERVICE, *_SERVICE_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let kind = match std::env::var("SERVICE") {
        Ok(name) => name.parse::<ServiceKind>().map_err(anyhow::Error::msg)?,
        Err(_) => ServiceKind::All,
    };

    // Initialize configuration (this loads the config singleton)
    let config = Arc::new(config::config().clone());
    let port = config.server.port.unwrap_or_else(|| kind.default_port());
    let host = config.server.host.clone();

    app::serve(kind, config, &host, port).await
}
