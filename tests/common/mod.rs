#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use http_body_util::BodyExt as _;
use serde_json::{json, Value};
use tower::ServiceExt as _;

use keap_proxy::config::AppConfig;
use keap_proxy::database::{DatabaseError, NewWebhookEvent, WebhookEvent, WebhookStore};
use keap_proxy::{router, AppState};

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";

/// A request as received by the mock Keap upstream.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn form(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(&self.body).into_owned().collect()
    }

    pub fn form_value(&self, key: &str) -> Option<String> {
        self.form().into_iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}

/// Stand-in for the Keap API: REST under `/crm/rest`, XML-RPC at
/// `/crm/xmlrpc/v1`, OAuth at `/token`. Every request is recorded.
pub struct MockKeap {
    pub base_url: String,
    recorded: Arc<Mutex<Vec<Recorded>>>,
}

impl MockKeap {
    pub async fn start() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind mock upstream")?;

        let recorded = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().fallback(mock_handler).with_state(recorded.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            recorded,
        })
    }

    pub fn rest_url(&self) -> String {
        format!("{}/crm/rest", self.base_url)
    }

    pub fn xmlrpc_url(&self) -> String {
        format!("{}/crm/xmlrpc/v1", self.base_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/token", self.base_url)
    }

    /// Proxy configuration wired to this mock.
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.keap.api_base_url = Some(self.rest_url());
        config.keap.xmlrpc_url = Some(self.xmlrpc_url());
        config.keap.token_url = Some(self.token_url());
        config.keap.client_id = CLIENT_ID.to_string();
        config.keap.client_secret = CLIENT_SECRET.to_string();
        config.keap.redirect_uri = "http://localhost:5173/oauth/callback".to_string();
        config
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.requests().pop().expect("mock upstream received no request")
    }
}

async fn mock_handler(
    State(recorded): State<Arc<Mutex<Vec<Recorded>>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let entry = Recorded { method, uri: uri.clone(), headers, body };
    recorded.lock().unwrap().push(entry.clone());

    match uri.path() {
        "/token" => token_endpoint(&entry),
        "/crm/xmlrpc/v1" => (
            [(header::CONTENT_TYPE, "text/xml")],
            "<?xml version=\"1.0\"?><methodResponse><params><param><value><i4>1</i4></value></param></params></methodResponse>",
        )
            .into_response(),
        "/crm/rest/v1/missing" => (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"fault":"X"}"#,
        )
            .into_response(),
        "/crm/rest/v1/slow" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            StatusCode::OK.into_response()
        }
        path if path.starts_with("/crm/rest/") => {
            let echoed = if entry.body.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&entry.body).unwrap_or(Value::Null)
            };
            axum::Json(json!({ "path": path, "query": uri.query(), "echo": echoed })).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn token_endpoint(entry: &Recorded) -> Response {
    let grant_type = entry.form_value("grant_type").unwrap_or_default();
    match grant_type.as_str() {
        "authorization_code" if entry.form_value("code").as_deref() == Some("bad-code") => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({"error": "invalid_grant", "error_description": "Invalid authorization code"})),
        )
            .into_response(),
        "authorization_code" => axum::Json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 86399,
            "token_type": "bearer",
            "scope": "full"
        }))
        .into_response(),
        "refresh_token" if entry.form_value("refresh_token").as_deref() == Some("revoked") => {
            (StatusCode::UNAUTHORIZED, r#"{"error":"invalid_grant"}"#).into_response()
        }
        "refresh_token" => axum::Json(json!({
            "access_token": "access-2",
            "refresh_token": "refresh-2",
            "expires_in": 86399,
            "token_type": "bearer"
        }))
        .into_response(),
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// Webhook storage kept in memory.
#[derive(Default)]
pub struct MemoryWebhookStore {
    events: Mutex<Vec<WebhookEvent>>,
}

impl MemoryWebhookStore {
    pub fn events(&self) -> Vec<WebhookEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebhookStore for MemoryWebhookStore {
    async fn insert(&self, event: NewWebhookEvent) -> Result<i64, DatabaseError> {
        let mut events = self.events.lock().unwrap();
        let id = events.len() as i64 + 1;
        events.push(WebhookEvent {
            id,
            event_key: event.event_key,
            object_type: event.object_type,
            payload: event.payload,
            received_at: chrono::Utc::now(),
        });
        Ok(id)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<WebhookEvent>, DatabaseError> {
        let events = self.events.lock().unwrap();
        Ok(events.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

pub fn app(config: AppConfig) -> Router {
    router(AppState::new(config, None).expect("failed to build app state"))
}

pub fn app_with_store(config: AppConfig, store: Arc<MemoryWebhookStore>) -> Router {
    let store: Arc<dyn WebhookStore> = store;
    router(AppState::new(config, Some(store)).expect("failed to build app state"))
}

/// Sends one request through the proxy router in-process.
pub async fn send(app: Router, request: Request<Body>) -> Result<(StatusCode, HeaderMap, Bytes)> {
    let response = app.oneshot(request).await?;
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await?.to_bytes();
    Ok((status, headers, body))
}

pub fn json_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}
