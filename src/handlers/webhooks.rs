// handlers/webhooks.rs - Keap webhook ingestion
//
// POST /webhooks/keap  store one delivery (or confirm a subscription)
// GET  /webhooks/keap  recent deliveries, newest first

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::{NewWebhookEvent, WebhookEvent, WebhookStore};
use crate::error::ApiError;

/// Sent by Keap when a hook subscription is created; must be echoed back.
pub const HOOK_SECRET: HeaderName = HeaderName::from_static("x-hook-secret");

pub const DEFAULT_RECENT_LIMIT: i64 = 50;
pub const MAX_RECENT_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<i64>,
}

fn store(state: &AppState) -> Result<&Arc<dyn WebhookStore>, ApiError> {
    state
        .webhooks
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Webhook storage is not configured"))
}

/// POST /webhooks/keap - Persist an incoming Keap webhook event
///
/// One row per delivery. No dedup, no ordering guarantees.
///
/// Expected Output (Success):
/// ```json
/// { "success": true, "id": 42 }
/// ```
pub async fn receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    if let Some(secret) = headers.get(&HOOK_SECRET) {
        tracing::info!("Confirming Keap webhook subscription");
        return Ok((StatusCode::OK, [(HOOK_SECRET, secret.clone())]).into_response());
    }

    let store = store(&state)?;

    let payload: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request("Invalid webhook payload"))?;
    let event = NewWebhookEvent::from_payload(payload);
    let event_key = event.event_key.clone();

    let id = store.insert(event).await?;
    tracing::info!(id, event_key = event_key.as_deref().unwrap_or("-"), "Stored Keap webhook event");

    Ok(Json(json!({ "success": true, "id": id })).into_response())
}

/// GET /webhooks/keap?limit=N - Most recent stored events
pub async fn recent(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<WebhookEvent>>, ApiError> {
    let store = store(&state)?;
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT).clamp(1, MAX_RECENT_LIMIT);
    Ok(Json(store.recent(limit).await?))
}
