use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use super::manager::{DatabaseError, DatabaseManager};

pub const TABLE_NAME: &str = "keap_webhook_events";

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS keap_webhook_events (
        id BIGSERIAL PRIMARY KEY,
        event_key TEXT,
        object_type TEXT,
        payload JSONB NOT NULL,
        received_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
"#;

/// A stored webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WebhookEvent {
    pub id: i64,
    pub event_key: Option<String>,
    pub object_type: Option<String>,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

/// A webhook delivery about to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWebhookEvent {
    pub event_key: Option<String>,
    pub object_type: Option<String>,
    pub payload: Value,
}

impl NewWebhookEvent {
    /// Keap deliveries look like
    /// `{"event_key":"contact.add","object_type":"contact","object_keys":[..],"api_url":".."}`.
    /// The payload is kept whole; the two indexed fields are copied out if present.
    pub fn from_payload(payload: Value) -> Self {
        let field = |name: &str| payload.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            event_key: field("event_key"),
            object_type: field("object_type"),
            payload,
        }
    }
}

/// Storage for incoming webhook events.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    /// Inserts one event and returns its id.
    async fn insert(&self, event: NewWebhookEvent) -> Result<i64, DatabaseError>;

    /// Most recent events first.
    async fn recent(&self, limit: i64) -> Result<Vec<WebhookEvent>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

pub struct PgWebhookStore {
    manager: DatabaseManager,
}

impl PgWebhookStore {
    pub fn new(manager: DatabaseManager) -> Self {
        Self { manager }
    }

    pub async fn ensure_schema(&self) -> Result<(), DatabaseError> {
        sqlx::query(CREATE_TABLE).execute(self.manager.pool()).await?;
        tracing::info!("Ensured table {}", TABLE_NAME);
        Ok(())
    }
}

#[async_trait]
impl WebhookStore for PgWebhookStore {
    async fn insert(&self, event: NewWebhookEvent) -> Result<i64, DatabaseError> {
        let mut conn = self.manager.pool().acquire().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO keap_webhook_events (event_key, object_type, payload)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(&event.event_key)
        .bind(&event.object_type)
        .bind(&event.payload)
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<WebhookEvent>, DatabaseError> {
        let mut conn = self.manager.pool().acquire().await?;

        let events = sqlx::query_as::<_, WebhookEvent>(
            "SELECT id, event_key, object_type, payload, received_at
             FROM keap_webhook_events
             ORDER BY received_at DESC, id DESC
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        Ok(events)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.manager.health_check().await
    }
}
