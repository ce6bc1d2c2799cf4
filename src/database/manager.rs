use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager and the stores built on it
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Owns the Postgres pool used for webhook storage.
///
/// The pool is built once at process start and handed to whoever needs it;
/// connections are checked out per operation and go back to the pool when
/// the guard drops, on success and error paths alike.
#[derive(Clone, Debug)]
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    /// Builds the pool without opening a connection. The first query
    /// connects, so a database that is down at startup does not stop the
    /// proxy from serving.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let raw = config.url.as_deref().ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let url = url::Url::parse(raw).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(url.as_str())?;

        info!(
            "Created database pool for: {}{} (max {} connections)",
            url.host_str().unwrap_or("localhost"),
            url.path(),
            config.max_connections.max(1)
        );

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
