use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET / - Service description
pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");
    let mount = &state.config.server.mount_path;

    Json(json!({
        "success": true,
        "data": {
            "name": "Keap API Proxy",
            "version": version,
            "mount": mount,
            "endpoints": {
                "home": "/ (public)",
                "health": "/health",
                "auth": format!("{}/auth (POST, exchange authorization code)", mount),
                "refresh": format!("{}/auth/refresh (POST, refresh access token)", mount),
                "proxy": format!("{}/* (any method, forwarded to Keap REST or XML-RPC)", mount),
                "webhooks": "/webhooks/keap (POST ingest, GET recent)",
            }
        }
    }))
}

/// GET /health - Liveness plus upstream configuration and database status
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let keap = &state.config.keap;
    let upstream = json!({
        "rest": keap.api_base_url.is_some(),
        "xmlrpc": keap.xmlrpc_url.is_some(),
        "token": keap.token_url.is_some(),
    });

    let Some(store) = state.webhooks.as_ref() else {
        return (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "upstream": upstream,
                    "database": "disabled"
                }
            })),
        );
    };

    match store.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "upstream": upstream,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "upstream": upstream,
                    "database_error": e.to_string()
                }
            })),
        ),
    }
}
