use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::app;
use crate::cli::load_config;
use crate::types::ServiceKind;

#[derive(Args)]
pub struct ServeArgs {
    #[arg(value_enum, default_value = "all", help = "Service to run")]
    pub service: ServiceKind,

    #[arg(long, help = "Bind address (defaults to the configured host)")]
    pub host: Option<String>,

    #[arg(long, help = "Port (defaults to the configured port, then the service default)")]
    pub port: Option<u16>,

    #[arg(long, help = "YAML configuration file")]
    pub config: Option<PathBuf>,
}

pub async fn handle(args: ServeArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args
        .port
        .or(config.server.port)
        .unwrap_or_else(|| args.service.default_port());

    app::serve(args.service, Arc::new(config), &host, port).await
}
