//! Connection pool wrapper.

use crate::error::DbError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Default maximum number of pooled connections.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default connection acquire timeout.
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// Wrapper around the sqlx PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct DbPool {
    pool: PgPool,
}

impl DbPool {
    /// Connect with default pool settings.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        Self::connect_with(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect with a custom connection limit.
    pub async fn connect_with(database_url: &str, max_connections: u32) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(DEFAULT_ACQUIRE_TIMEOUT)
            .connect(database_url)
            .await
            .map_err(DbError::ConnectionFailed)?;

        Ok(Self { pool })
    }

    /// The underlying sqlx pool.
    #[must_use]
    pub fn inner(&self) -> &PgPool {
        &self.pool
    }
}
