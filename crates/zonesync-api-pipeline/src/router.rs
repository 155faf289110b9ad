//! Router and state for the zone pipeline API.

use axum::{
    routing::{get, post},
    Extension, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use zonesync_navio::NavioClient;
use zonesync_pipeline::classify::Classifier;
use zonesync_pipeline::coverage::CoverageThresholds;
use zonesync_pipeline::retry::RetryPolicy;

use crate::handlers;

/// Shared state for the pipeline routes.
#[derive(Clone)]
pub struct PipelineState {
    /// Database connection pool.
    pub pool: PgPool,
    /// Provider client.
    pub navio: NavioClient,
    /// AI classification collaborator.
    pub classifier: Arc<dyn Classifier>,
    /// Backoff policy for upstream calls and commit steps.
    pub retry: RetryPolicy,
    /// Coverage health thresholds.
    pub thresholds: CoverageThresholds,
}

impl PipelineState {
    /// Create a new `PipelineState`.
    pub fn new(
        pool: PgPool,
        navio: NavioClient,
        classifier: Arc<dyn Classifier>,
        retry: RetryPolicy,
        thresholds: CoverageThresholds,
    ) -> Self {
        Self {
            pool,
            navio,
            classifier,
            retry,
            thresholds,
        }
    }
}

/// Create the zone pipeline router.
///
/// Routes:
/// - POST /admin/zones/pipeline                  — One unit of pipeline work
/// - GET  /admin/zones/pipeline/batch            — Active cached batch
/// - GET  /`admin/zones/staging/:batch_id`         — Staging tree for review
/// - POST /admin/zones/staging/approve           — Approve cities (cascading)
/// - POST /admin/zones/staging/reject            — Reject cities (cascading)
/// - POST /admin/zones/staging/resolve-mapping   — Resolve a flagged area name
/// - GET  /admin/zones/operations                — Recent operation log
pub fn pipeline_router(state: PipelineState) -> Router {
    Router::new()
        .route("/admin/zones/pipeline", post(handlers::pipeline::run_pipeline))
        .route(
            "/admin/zones/pipeline/batch",
            get(handlers::pipeline::get_active_batch),
        )
        .route(
            "/admin/zones/staging/:batch_id",
            get(handlers::staging::get_staging_tree),
        )
        .route(
            "/admin/zones/staging/approve",
            post(handlers::staging::approve_cities),
        )
        .route(
            "/admin/zones/staging/reject",
            post(handlers::staging::reject_cities),
        )
        .route(
            "/admin/zones/staging/resolve-mapping",
            post(handlers::staging::resolve_mapping),
        )
        .route(
            "/admin/zones/operations",
            get(handlers::operations::list_operations),
        )
        .layer(Extension(state))
}
