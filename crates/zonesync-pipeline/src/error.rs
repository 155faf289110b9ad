//! Pipeline error taxonomy.
//!
//! The retry orchestrator keys off [`PipelineError::is_retryable`]: transient
//! network and upstream failures are retried, validation and integrity
//! failures surface immediately, and a partial batch is a resumable state
//! rather than a fatal one.

use thiserror::Error;
use zonesync_db::DbError;
use zonesync_navio::NavioError;

/// Errors raised by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Transient network failure (timeout, connection reset, 5xx upstream).
    #[error("Transient network failure: {message}")]
    NetworkTransient { message: String },

    /// The upstream provider is rate limiting us; backoff is mandatory.
    #[error("Upstream rate limited{}", retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    UpstreamRateLimited { retry_after_secs: Option<u64> },

    /// Input or state validation failed; retrying cannot help.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// Some units completed, the remainder is still pending. Resumable.
    #[error("Partial batch: {completed} completed, {remaining} remaining: {message}")]
    PartialBatch {
        completed: u32,
        remaining: u32,
        message: String,
    },

    /// The persisted state contradicts itself; surfaced, never silently
    /// healed.
    #[error("Data integrity error: {message}")]
    DataIntegrity { message: String },

    /// Entity lookup failed.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization of cached state failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a data integrity error.
    pub fn data_integrity(message: impl Into<String>) -> Self {
        Self::DataIntegrity {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create a partial batch error.
    pub fn partial_batch(completed: u32, remaining: u32, message: impl Into<String>) -> Self {
        Self::PartialBatch {
            completed,
            remaining,
            message: message.into(),
        }
    }

    /// Whether the retry orchestrator may repeat the failed step.
    ///
    /// Safe because every wrapped step (process one city, commit one city)
    /// is idempotent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkTransient { .. } | Self::UpstreamRateLimited { .. } | Self::Database(_)
        )
    }
}

impl From<NavioError> for PipelineError {
    fn from(err: NavioError) -> Self {
        match err {
            NavioError::Transport(e) => Self::NetworkTransient {
                message: e.to_string(),
            },
            NavioError::Server { status } => Self::NetworkTransient {
                message: format!("provider returned HTTP {status}"),
            },
            NavioError::RateLimited { retry_after_secs } => {
                Self::UpstreamRateLimited { retry_after_secs }
            }
            NavioError::Rejected { status, body } => Self::Validation {
                message: format!("provider rejected request: HTTP {status}: {body}"),
            },
            NavioError::Decode(message) => Self::Validation {
                message: format!("provider response malformed: {message}"),
            },
        }
    }
}

impl From<DbError> for PipelineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConnectionFailed(e) | DbError::QueryFailed(e) => Self::Database(e),
            DbError::MigrationFailed(e) => Self::Validation {
                message: e.to_string(),
            },
            DbError::NotFound(message) => Self::NotFound {
                entity: "record".into(),
                id: message,
            },
            DbError::ValidationFailed(message) => Self::Validation { message },
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_kinds_are_retryable() {
        assert!(PipelineError::NetworkTransient {
            message: "timeout".into()
        }
        .is_retryable());
        assert!(PipelineError::UpstreamRateLimited {
            retry_after_secs: None
        }
        .is_retryable());
        assert!(PipelineError::Database(sqlx::Error::PoolTimedOut).is_retryable());
    }

    #[test]
    fn terminal_kinds_are_not_retryable() {
        assert!(!PipelineError::validation("bad input").is_retryable());
        assert!(!PipelineError::data_integrity("dangling area").is_retryable());
        assert!(!PipelineError::partial_batch(2, 3, "paused").is_retryable());
        assert!(!PipelineError::not_found("StagingCity", "x").is_retryable());
    }

    #[test]
    fn navio_errors_map_onto_the_taxonomy() {
        let err: PipelineError = NavioError::Server { status: 502 }.into();
        assert!(err.is_retryable());

        let err: PipelineError = NavioError::Rejected {
            status: 400,
            body: "bad".into(),
        }
        .into();
        assert!(!err.is_retryable());

        let err: PipelineError = NavioError::RateLimited {
            retry_after_secs: Some(3),
        }
        .into();
        assert!(matches!(
            err,
            PipelineError::UpstreamRateLimited {
                retry_after_secs: Some(3)
            }
        ));
    }
}
