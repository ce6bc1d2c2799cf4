pub mod manager;
pub mod webhook_events;

pub use manager::{DatabaseError, DatabaseManager};
pub use webhook_events::{NewWebhookEvent, PgWebhookStore, WebhookEvent, WebhookStore};
