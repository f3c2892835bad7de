pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{self, AppConfig};

#[derive(Parser)]
#[command(name = "teamhub")]
#[command(about = "TeamHub CLI - run services and manage tokens for the team workspace backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run a service (or every data service, or the gateway)")]
    Serve(commands::serve::ServeArgs),

    #[command(about = "Issue and verify access tokens")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },

    #[command(about = "Hash passwords and check them against the password policy")]
    Password {
        #[command(subcommand)]
        cmd: commands::password::PasswordCommands,
    },

    #[command(about = "Health check one or more running services")]
    Ping {
        #[arg(required = true, help = "Base URLs, e.g. http://127.0.0.1:8001")]
        urls: Vec<String>,
    },

    #[command(about = "Inspect the effective configuration")]
    Config {
        #[command(subcommand)]
        cmd: commands::config::ConfigCommands,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// The YAML file at `path` when given, otherwise the process-wide configuration.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => Ok(AppConfig::from_yaml_file(path)?),
        None => Ok(config::config().clone()),
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Serve(args) => commands::serve::handle(args).await,
        Commands::Token { cmd } => commands::token::handle(cmd, output_format),
        Commands::Password { cmd } => commands::password::handle(cmd, output_format).await,
        Commands::Ping { urls } => commands::ping::handle(urls, output_format).await,
        Commands::Config { cmd } => commands::config::handle(cmd, output_format),
    }
}
