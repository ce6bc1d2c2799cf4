use clap::Subcommand;

use crate::cli::utils::{output_empty_collection, output_events, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::database::{DatabaseManager, PgWebhookStore, WebhookStore};

#[derive(Subcommand)]
pub enum WebhookCommands {
    #[command(about = "Create the webhook events table if it does not exist")]
    Init,

    #[command(about = "Show the most recent webhook events")]
    Recent {
        #[arg(long, default_value_t = 20, help = "Number of events to show")]
        limit: i64,
    },
}

pub async fn handle(cmd: WebhookCommands, config: &AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = DatabaseManager::connect_lazy(&config.database)?;
    let store = PgWebhookStore::new(manager.clone());

    let result = run(cmd, &store, &output_format).await;
    manager.close().await;
    result
}

async fn run(cmd: WebhookCommands, store: &PgWebhookStore, output_format: &OutputFormat) -> anyhow::Result<()> {
    match cmd {
        WebhookCommands::Init => {
            store.ensure_schema().await?;
            output_success(output_format, "Webhook table ready", None)
        }
        WebhookCommands::Recent { limit } => {
            let events = store.recent(limit.max(1)).await?;
            if events.is_empty() {
                output_empty_collection(output_format, "events", "No webhook events stored")
            } else {
                output_events(output_format, &events)
            }
        }
    }
}
