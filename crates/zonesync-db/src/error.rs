//! Error types for the zonesync-db crate.

use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to establish or acquire a database connection.
    #[error("Database connection failed: {0}")]
    ConnectionFailed(#[source] sqlx::Error),

    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),

    /// A database query failed to execute.
    #[error("Query failed: {0}")]
    QueryFailed(#[from] sqlx::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation failed.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
