use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::{ProxyRequest, UpstreamResponse};

/// ANY {mount}/* - Forward to Keap over REST or XML-RPC
///
/// Upstream answers of any status are relayed as-is. A request that never
/// got an answer comes back as an opaque 500.
pub async fn forward(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<UpstreamResponse, ApiError> {
    let request = ProxyRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };

    Ok(state.forwarder.forward(request).await?)
}
