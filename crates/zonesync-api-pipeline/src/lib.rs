//! Admin HTTP API for the delivery-zone import pipeline.
//!
//! This crate provides REST endpoints for:
//! - The multiplexed pipeline endpoint (delta check, staging, commit,
//!   geo-sync, coverage audit), one bounded unit of work per call
//! - Staging tree review with cascading approve/reject decisions
//! - Manual resolution of areas flagged by the classifier
//! - The operation history log
//!
//! # Example
//!
//! ```rust,ignore
//! use zonesync_api_pipeline::{pipeline_router, PipelineState};
//! use axum::Router;
//!
//! let state = PipelineState::new(pool, navio, classifier, retry, thresholds);
//! let app = Router::new().merge(pipeline_router(state));
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;

pub use error::{ApiError, ProblemDetails};
pub use router::{pipeline_router, PipelineState};
