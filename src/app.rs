use std::sync::Arc;

use axum::{
    middleware,
    routing::{any, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::database::WebhookStore;
use crate::handlers;
use crate::middleware::cors_middleware;
use crate::services::{Forwarder, TokenClient};

/// Shared application state passed to all route handlers.
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Client for Keap's OAuth token endpoint.
    pub tokens: TokenClient,
    /// REST / XML-RPC forwarder.
    pub forwarder: Forwarder,
    /// Webhook storage; `None` when no database is configured.
    pub webhooks: Option<Arc<dyn WebhookStore>>,
}

impl AppState {
    pub fn new(config: AppConfig, webhooks: Option<Arc<dyn WebhookStore>>) -> anyhow::Result<Arc<Self>> {
        let tokens = TokenClient::new(&config)?;
        let forwarder = Forwarder::new(&config)?;
        Ok(Arc::new(Self {
            config: Arc::new(config),
            tokens,
            forwarder,
            webhooks,
        }))
    }
}

/// Build the full axum router.
///
/// Routes (`{mount}` defaults to `/api/keap`):
/// - GET  /
/// - GET  /health
/// - POST /webhooks/keap, GET /webhooks/keap
/// - POST {mount}/auth
/// - POST {mount}/auth/refresh
/// - ANY  {mount}/*path                 forwarded to Keap
///
/// `OPTIONS` on any path is answered by the CORS middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let mount = state.config.server.mount_path.clone();

    Router::new()
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .merge(webhook_routes())
        .merge(proxy_routes(&mount))
        .with_state(state)
        // Global middleware, outermost first
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(cors_middleware)),
        )
}

fn webhook_routes() -> Router<Arc<AppState>> {
    use handlers::webhooks;

    Router::new().route("/webhooks/keap", post(webhooks::receive).get(webhooks::recent))
}

fn proxy_routes(mount: &str) -> Router<Arc<AppState>> {
    use handlers::{proxy, token};

    // Non-POST calls to the token paths are ordinary proxy traffic.
    Router::new()
        .route(&format!("{}/auth", mount), post(token::exchange).fallback(proxy::forward))
        .route(&format!("{}/auth/refresh", mount), post(token::refresh).fallback(proxy::forward))
        .route(&format!("{}/*path", mount), any(proxy::forward))
}
