use clap::Subcommand;
use serde_json::json;

use crate::auth::{hash_password, password_policy_violations, verify_password, HashCost};
use crate::cli::output::{output_failure, output_success};
use crate::cli::{load_config, OutputFormat};

#[derive(Subcommand)]
pub enum PasswordCommands {
    #[command(about = "Hash a password with the configured Argon2id cost")]
    Hash {
        #[arg(help = "Plaintext password")]
        password: String,
    },

    #[command(about = "Check a password against the policy, and optionally against a stored hash")]
    Check {
        #[arg(help = "Plaintext password")]
        password: String,
        #[arg(long, help = "Stored Argon2 hash to verify against")]
        hash: Option<String>,
    },
}

pub async fn handle(cmd: PasswordCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PasswordCommands::Hash { password } => {
            let cost = HashCost::from_config(&load_config(None)?.security);
            let hash = tokio::task::spawn_blocking(move || hash_password(&password, cost)).await??;
            output_success(output_format, "Password hashed", Some(json!({ "hash": hash })))
        }
        PasswordCommands::Check { password, hash } => {
            let problems = password_policy_violations(&password);
            let matches = match hash {
                Some(stored) => Some(verify_password(&password, &stored)?),
                None => None,
            };

            let data = json!({ "problems": problems, "matches_hash": matches });
            if !problems.is_empty() {
                output_failure(output_format, "Password does not meet the policy", Some(data))?;
                if output_format == OutputFormat::Text {
                    for problem in &problems {
                        eprintln!("  - {}", problem);
                    }
                }
                anyhow::bail!("password rejected");
            }
            if matches == Some(false) {
                output_failure(output_format, "Password does not match the hash", Some(data))?;
                anyhow::bail!("password rejected");
            }
            output_success(output_format, "Password accepted", Some(data))
        }
    }
}
