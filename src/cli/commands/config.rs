use clap::Subcommand;
use std::path::PathBuf;

use crate::cli::{load_config, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Print the effective configuration with secrets redacted")]
    Show {
        #[arg(long, help = "YAML configuration file")]
        config: Option<PathBuf>,
    },
}

pub fn handle(cmd: ConfigCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show { config } => {
            let effective = load_config(config.as_deref())?.redacted();
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&effective)?),
                OutputFormat::Text => print!("{}", serde_yaml::to_string(&effective)?),
            }
            Ok(())
        }
    }
}
