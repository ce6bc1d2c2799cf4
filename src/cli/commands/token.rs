use clap::Subcommand;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::services::{TokenClient, TokenError};

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Exchange an OAuth authorization code for a token pair")]
    Exchange {
        #[arg(help = "Authorization code from the Keap consent redirect")]
        code: String,
    },

    #[command(about = "Refresh an access token")]
    Refresh {
        #[arg(help = "Refresh token")]
        refresh_token: String,
    },
}

pub async fn handle(cmd: TokenCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = TokenClient::new(config)?;

    match cmd {
        TokenCommands::Exchange { code } => {
            let pair = client.exchange_code(&code).await?;
            output_success(&output_format, "Token endpoint responded", Some(pair.0))
        }
        TokenCommands::Refresh { refresh_token } => match client.refresh(&refresh_token).await {
            Ok(pair) => output_success(&output_format, "Access token refreshed", Some(pair.0)),
            Err(TokenError::Rejected { status, body }) => {
                output_error(&output_format, &format!("Keap rejected the refresh token: {}", body), Some(status.as_u16()))?;
                anyhow::bail!("token refresh failed with status {}", status)
            }
            Err(e) => Err(e.into()),
        },
    }
}
