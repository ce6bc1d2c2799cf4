// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::database::DatabaseError;
use crate::services::{ForwardError, TokenError};

/// Opaque body returned when an upstream call produced no response.
pub const PROXY_FAILURE: &str = "Proxy request failed";

/// HTTP API error with appropriate status codes and client-facing bodies
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 500 Internal Server Error: token exchange never reached Keap
    TokenExchange(String),

    // 500 Internal Server Error: Keap refused the refresh; status collapsed
    TokenRefresh { upstream_status: Option<u16>, detail: String },

    // 500 Internal Server Error: no upstream response, detail withheld
    Proxy,

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TokenExchange(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::TokenRefresh { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Proxy => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::BadRequest(message) | ApiError::ServiceUnavailable(message) => {
                json!({ "message": message })
            }
            ApiError::TokenExchange(detail) => json!({
                "message": "Failed to exchange auth code",
                "error": detail,
            }),
            ApiError::TokenRefresh { upstream_status, detail } => json!({
                "message": "Token refresh failed: internal error",
                "error": detail,
                "upstream_status": upstream_status,
            }),
            ApiError::Proxy => json!({ "error": PROXY_FAILURE }),
            ApiError::InternalServerError(message) => json!({ "error": message }),
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    /// Maps a failed code exchange. The exchange only errors when Keap was
    /// never reached, so the detail is the transport error.
    pub fn from_exchange(err: TokenError) -> Self {
        tracing::error!("Token exchange failed: {}", err);
        ApiError::TokenExchange(err.to_string())
    }

    /// Maps a failed refresh. Every failure becomes a 500; an upstream
    /// status, when there was one, is reported in the body only.
    pub fn from_refresh(err: TokenError) -> Self {
        let upstream_status = match &err {
            TokenError::Rejected { status, .. } => Some(status.as_u16()),
            _ => None,
        };
        ApiError::TokenRefresh {
            upstream_status,
            detail: err.to_string(),
        }
    }
}

impl From<ForwardError> for ApiError {
    fn from(err: ForwardError) -> Self {
        // Transport failures are logged by the forwarder with the request id
        match &err {
            ForwardError::MissingUpstream(key) => {
                tracing::error!("Cannot forward request, {} is not configured", key);
            }
            ForwardError::Transport(_) => {}
            other => tracing::error!("Cannot forward request: {}", other),
        }
        ApiError::Proxy
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::ConfigMissing(_) => {
                ApiError::service_unavailable("Webhook storage is not configured")
            }
            other => {
                // Log the real error but return generic message
                tracing::error!("Database error: {}", other);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => write!(f, "{}", msg),
            ApiError::TokenExchange(detail) => write!(f, "token exchange failed: {}", detail),
            ApiError::TokenRefresh { detail, .. } => write!(f, "token refresh failed: {}", detail),
            ApiError::Proxy => write!(f, "{}", PROXY_FAILURE),
        }
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status_code(), Json(self.to_json())).into_response()
    }
}
