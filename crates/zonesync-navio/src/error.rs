//! Navio client errors with retryability classification.

use thiserror::Error;

/// Errors from the Navio provider client.
#[derive(Debug, Error)]
pub enum NavioError {
    /// Connection-level failure (DNS, connect, reset, timeout).
    #[error("Navio request failed: {0}")]
    Transport(#[source] reqwest::Error),

    /// The provider returned 429.
    #[error("Navio rate limited{}", retry_after_secs.map(|s| format!(", retry after {s}s")).unwrap_or_default())]
    RateLimited {
        /// Parsed Retry-After header, if present.
        retry_after_secs: Option<u64>,
    },

    /// The provider returned a 5xx status.
    #[error("Navio server error: HTTP {status}")]
    Server { status: u16 },

    /// The provider returned a non-retryable 4xx status.
    #[error("Navio request rejected: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The response body did not match the expected wire shape.
    #[error("Navio response could not be parsed: {0}")]
    Decode(String),
}

impl NavioError {
    /// Whether a retry can reasonably succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited { .. } | Self::Server { .. }
        )
    }
}

/// Result type for Navio operations.
pub type NavioResult<T> = Result<T, NavioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_and_rate_limit_errors_are_retryable() {
        assert!(NavioError::Server { status: 503 }.is_retryable());
        assert!(NavioError::RateLimited {
            retry_after_secs: Some(2)
        }
        .is_retryable());
    }

    #[test]
    fn rejected_and_decode_errors_are_not() {
        let rejected = NavioError::Rejected {
            status: 403,
            body: "forbidden".into(),
        };
        assert!(!rejected.is_retryable());
        assert!(!NavioError::Decode("bad json".into()).is_retryable());
    }
}
