// handlers/token.rs - OAuth token endpoints
//
// POST {mount}/auth          exchange an authorization code
// POST {mount}/auth/refresh  trade a refresh token for a new pair
//
// Keap's token responses are passed back untouched; the dashboard stores them.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, Json};
use serde::{de::DeserializeOwned, Deserialize};

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::TokenPair;

#[derive(Debug, Default, Deserialize)]
pub struct AuthCodeRequest {
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// POST {mount}/auth - Exchange an OAuth authorization code
///
/// Expected Input:
/// ```json
/// { "code": "string" }
/// ```
///
/// Output: the token endpoint's body, verbatim, with status 200 even when
/// Keap reports an OAuth error in it.
pub async fn exchange(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TokenPair>, ApiError> {
    let payload: AuthCodeRequest = parse_lenient(&body);
    let code = non_blank(payload.code).ok_or_else(|| ApiError::bad_request("No auth code provided"))?;

    let pair = state
        .tokens
        .exchange_code(&code)
        .await
        .map_err(ApiError::from_exchange)?;

    Ok(Json(pair))
}

/// POST {mount}/auth/refresh - Refresh an access token
///
/// Expected Input:
/// ```json
/// { "refresh_token": "string" }
/// ```
///
/// Any upstream rejection is answered with 500; the upstream status is in
/// the `upstream_status` field of the body.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TokenPair>, ApiError> {
    let payload: RefreshRequest = parse_lenient(&body);
    let refresh_token =
        non_blank(payload.refresh_token).ok_or_else(|| ApiError::bad_request("No refresh token provided"))?;

    let pair = state
        .tokens
        .refresh(&refresh_token)
        .await
        .map_err(ApiError::from_refresh)?;

    Ok(Json(pair))
}

/// Missing, empty or malformed bodies read as "no fields supplied".
fn parse_lenient<T: DeserializeOwned + Default>(body: &[u8]) -> T {
    serde_json::from_slice(body).unwrap_or_default()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
