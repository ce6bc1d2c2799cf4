use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use keap_proxy::config::AppConfig;
use keap_proxy::database::{DatabaseManager, PgWebhookStore, WebhookStore};
use keap_proxy::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up KEAP_* and DATABASE_URL
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env();
    tracing::info!("Starting Keap proxy in {:?} mode", config.environment);
    // Missing upstream URLs are reported but do not stop the server
    config.log_issues();

    let database = match config.database.url {
        Some(_) => match DatabaseManager::connect_lazy(&config.database) {
            Ok(manager) => Some(manager),
            Err(e) => {
                tracing::error!("Webhook storage disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let webhooks: Option<Arc<dyn WebhookStore>> = match &database {
        Some(manager) => {
            let store = PgWebhookStore::new(manager.clone());
            if let Err(e) = store.ensure_schema().await {
                tracing::error!("Failed to prepare webhook table: {}", e);
            }
            Some(Arc::new(store) as Arc<dyn WebhookStore>)
        }
        None => None,
    };

    let port = config.server.port;
    let mount = config.server.mount_path.clone();
    let app = router(AppState::new(config, webhooks)?);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Keap proxy listening on http://{} (proxy mounted at {:?})", bind_addr, mount);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(manager) = database {
        manager.close().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
