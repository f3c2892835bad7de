use clap::Subcommand;
use serde_json::json;

use crate::auth::{JwtKeys, TokenSubject};
use crate::cli::output::output_success;
use crate::cli::{load_config, OutputFormat};

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Issue an access token signed with the configured secret")]
    Issue {
        #[arg(long, help = "User id")]
        user_id: i64,
        #[arg(long, help = "Username")]
        username: String,
        #[arg(long, help = "Email")]
        email: String,
        #[arg(long, help = "Full name")]
        full_name: Option<String>,
    },

    #[command(about = "Verify a token and print its claims")]
    Verify {
        #[arg(help = "Access token")]
        token: String,
    },
}

pub fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = load_config(None)?;
    let keys = JwtKeys::from_config(&config.security)?;

    match cmd {
        TokenCommands::Issue {
            user_id,
            username,
            email,
            full_name,
        } => {
            let issued = keys.issue(TokenSubject {
                user_id,
                username: &username,
                email: &email,
                full_name: full_name.as_deref(),
            })?;
            output_success(
                output_format,
                &format!("Issued token for {}", username),
                Some(serde_json::to_value(&issued)?),
            )
        }
        TokenCommands::Verify { token } => {
            let claims = keys.verify(&token)?;
            output_success(
                output_format,
                "Token is valid",
                Some(json!({ "claims": claims })),
            )
        }
    }
}
