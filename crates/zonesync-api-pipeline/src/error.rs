//! Error types for the zone pipeline API.
//!
//! Uses RFC 7807 Problem Details for HTTP APIs. The pipeline taxonomy maps
//! onto statuses as: validation → 400, not found → 404, partial batch → 409,
//! transient upstream → 502, rate limited → 503 (with a Retry-After header),
//! everything else → 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zonesync_pipeline::PipelineError;

/// Base URL for error type URIs.
const ERROR_BASE_URL: &str = "https://zonesync.dev/errors/zones";

/// RFC 7807 Problem Details structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// URI identifying the problem type.
    #[serde(rename = "type")]
    pub error_type: String,

    /// Short human-readable summary.
    pub title: String,

    /// HTTP status code.
    pub status: u16,

    /// Human-readable explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// URI of the specific occurrence.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
}

impl ProblemDetails {
    /// Create a new `ProblemDetails` instance.
    #[must_use]
    pub fn new(error_type: &str, title: &str, status: StatusCode) -> Self {
        Self {
            error_type: format!("{ERROR_BASE_URL}/{error_type}"),
            title: title.to_string(),
            status: status.as_u16(),
            detail: None,
            instance: None,
        }
    }

    /// Add detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Zone pipeline API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request shape or parameters are invalid for the chosen mode.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Requested entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Pipeline failure; the status depends on the error kind.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Database error outside the pipeline.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Pipeline(err) => match err {
                PipelineError::Validation { .. } => StatusCode::BAD_REQUEST,
                PipelineError::NotFound { .. } => StatusCode::NOT_FOUND,
                PipelineError::PartialBatch { .. } => StatusCode::CONFLICT,
                PipelineError::NetworkTransient { .. } => StatusCode::BAD_GATEWAY,
                PipelineError::UpstreamRateLimited { .. } => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::DataIntegrity { .. }
                | PipelineError::Database(_)
                | PipelineError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to `ProblemDetails`.
    pub fn to_problem_details(&self) -> ProblemDetails {
        match self {
            ApiError::BadRequest(msg) => {
                ProblemDetails::new("bad-request", "Bad Request", StatusCode::BAD_REQUEST)
                    .with_detail(msg.clone())
            }

            ApiError::NotFound(what) => {
                ProblemDetails::new("not-found", "Not Found", StatusCode::NOT_FOUND)
                    .with_detail(format!("{what} was not found."))
            }

            ApiError::Pipeline(err) => match err {
                PipelineError::Validation { message } => ProblemDetails::new(
                    "validation-failed",
                    "Validation Failed",
                    StatusCode::BAD_REQUEST,
                )
                .with_detail(message.clone()),

                PipelineError::NotFound { entity, id } => {
                    ProblemDetails::new("not-found", "Not Found", StatusCode::NOT_FOUND)
                        .with_detail(format!("{entity} {id} was not found."))
                }

                PipelineError::PartialBatch {
                    completed,
                    remaining,
                    message,
                } => ProblemDetails::new(
                    "partial-batch",
                    "Batch Partially Processed",
                    StatusCode::CONFLICT,
                )
                .with_detail(format!(
                    "{message} ({completed} completed, {remaining} remaining; the batch is resumable)"
                )),

                PipelineError::NetworkTransient { message } => ProblemDetails::new(
                    "upstream-unavailable",
                    "Upstream Unavailable",
                    StatusCode::BAD_GATEWAY,
                )
                .with_detail(message.clone()),

                PipelineError::UpstreamRateLimited { retry_after_secs } => {
                    let mut problem = ProblemDetails::new(
                        "upstream-rate-limited",
                        "Upstream Rate Limited",
                        StatusCode::SERVICE_UNAVAILABLE,
                    );
                    if let Some(secs) = retry_after_secs {
                        problem = problem.with_detail(format!("Retry after {secs} seconds."));
                    }
                    problem
                }

                PipelineError::DataIntegrity { message } => {
                    tracing::error!(error = %message, "Data integrity error in pipeline API");
                    ProblemDetails::new(
                        "data-integrity",
                        "Data Integrity Error",
                        StatusCode::INTERNAL_SERVER_ERROR,
                    )
                    .with_detail(message.clone())
                }

                PipelineError::Database(err) => {
                    tracing::error!(error = %err, "Database error in pipeline API");
                    ProblemDetails::new(
                        "database-error",
                        "Database Error",
                        StatusCode::INTERNAL_SERVER_ERROR,
                    )
                    .with_detail("A database error occurred. Please try again later.")
                }

                PipelineError::Serialization(err) => {
                    tracing::error!(error = %err, "Serialization error in pipeline API");
                    ProblemDetails::new(
                        "internal-error",
                        "Internal Server Error",
                        StatusCode::INTERNAL_SERVER_ERROR,
                    )
                    .with_detail("An internal error occurred. Please try again later.")
                }
            },

            ApiError::Database(err) => {
                tracing::error!(error = %err, "Database error in pipeline API");
                ProblemDetails::new(
                    "database-error",
                    "Database Error",
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
                .with_detail("A database error occurred. Please try again later.")
            }
        }
    }

    /// Retry-After hint for rate-limited responses.
    fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::Pipeline(PipelineError::UpstreamRateLimited {
                retry_after_secs: Some(secs),
            }) => Some(*secs),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after = self.retry_after();
        let problem = self.to_problem_details();

        let mut response = (status, Json(problem)).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        if let Some(secs) = retry_after {
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response
                    .headers_mut()
                    .insert(axum::http::header::RETRY_AFTER, value);
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_onto_statuses() {
        let cases = [
            (
                ApiError::Pipeline(PipelineError::validation("bad")),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Pipeline(PipelineError::not_found("StagingCity", "x")),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Pipeline(PipelineError::partial_batch(2, 3, "paused")),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Pipeline(PipelineError::NetworkTransient {
                    message: "down".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Pipeline(PipelineError::UpstreamRateLimited {
                    retry_after_secs: Some(7),
                }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ApiError::Pipeline(PipelineError::data_integrity("broken")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
            assert_eq!(err.to_problem_details().status, status.as_u16());
        }
    }

    #[test]
    fn partial_batch_detail_carries_the_counts() {
        let err = ApiError::Pipeline(PipelineError::partial_batch(2, 3, "commit interrupted"));
        let detail = err.to_problem_details().detail.unwrap();
        assert!(detail.contains("2 completed"));
        assert!(detail.contains("3 remaining"));
    }

    #[test]
    fn rate_limited_response_sets_retry_after() {
        let err = ApiError::Pipeline(PipelineError::UpstreamRateLimited {
            retry_after_secs: Some(12),
        });
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response
                .headers()
                .get(axum::http::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
            Some("12")
        );
    }
}
