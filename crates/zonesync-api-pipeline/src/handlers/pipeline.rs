//! Multiplexed pipeline handler.
//!
//! - POST /admin/zones/pipeline — one bounded unit of pipeline work per call
//! - GET  /admin/zones/pipeline/batch — the active cached batch, if any

use axum::{Extension, Json};
use serde_json::json;
use zonesync_core::BatchId;
use zonesync_db::models::{ImportQueueEntry, OperationLogEntry, OperationStatus};
use zonesync_navio::ProviderZone;
use zonesync_pipeline::commit::CommitEngine;
use zonesync_pipeline::coverage::CoverageEngine;
use zonesync_pipeline::driver::CommitDriver;
use zonesync_pipeline::staging::StagingBuilder;
use zonesync_pipeline::{delta, PipelineError};

use crate::error::ApiError;
use crate::models::{
    ActiveBatchResponse, BatchStatus, CityProgress, PipelineMode, PipelineRequest,
    PipelineResponse,
};
use crate::router::PipelineState;

/// POST /admin/zones/pipeline
///
/// Executes one unit of work for the requested mode. Mutating modes are
/// recorded in the operation log; read-only checks are not. The log is
/// observability only: a failed audit write never changes what the caller
/// gets back.
pub async fn run_pipeline(
    Extension(state): Extension<PipelineState>,
    Json(request): Json<PipelineRequest>,
) -> Result<Json<PipelineResponse>, ApiError> {
    let mode = request.mode;
    if matches!(mode, PipelineMode::DeltaCheck | PipelineMode::CoverageCheck) {
        return execute(&state, request).await.map(Json);
    }

    let entry = match OperationLogEntry::start(
        &state.pool,
        mode_name(mode),
        json!({ "batch_id": request.batch_id }),
    )
    .await
    {
        Ok(entry) => Some(entry),
        Err(err) => {
            tracing::warn!(operation = mode_name(mode), error = %err, "Failed to record operation start");
            None
        }
    };

    let result = execute(&state, request).await;
    if let Some(entry) = entry {
        let (status, details) = match &result {
            Ok(response) => (OperationStatus::Completed, success_details(response)),
            Err(err) => (OperationStatus::Failed, json!({ "error": err.to_string() })),
        };
        record_outcome(&state.pool, entry.id, status, details).await;
    }
    result.map(Json)
}

/// Best-effort close of an audit record. The real outcome has already been
/// decided; a failed write here is only logged.
async fn record_outcome(
    pool: &sqlx::PgPool,
    entry_id: uuid::Uuid,
    status: OperationStatus,
    details: serde_json::Value,
) {
    if let Err(err) = OperationLogEntry::finish(pool, entry_id, status, details).await {
        tracing::warn!(error = %err, "Failed to record operation outcome");
    }
}

/// GET /admin/zones/pipeline/batch
///
/// The most recent cached batch with per-city progress, so a client can
/// offer both "resume" and "start fresh". `batch: null` when nothing is
/// cached.
pub async fn get_active_batch(
    Extension(state): Extension<PipelineState>,
) -> Result<Json<ActiveBatchResponse>, ApiError> {
    let Some(batch_id) = ImportQueueEntry::latest_batch(&state.pool).await? else {
        return Ok(Json(ActiveBatchResponse { batch: None }));
    };

    let entries = ImportQueueEntry::list_by_batch(&state.pool, batch_id).await?;
    Ok(Json(ActiveBatchResponse {
        batch: Some(BatchStatus {
            batch_id,
            cities: entries.iter().map(CityProgress::from).collect(),
        }),
    }))
}

async fn execute(
    state: &PipelineState,
    request: PipelineRequest,
) -> Result<PipelineResponse, ApiError> {
    match request.mode {
        PipelineMode::DeltaCheck => {
            let zones = fetch_zones(state).await?;
            let report = delta::check(&state.pool, &zones).await?;
            Ok(PipelineResponse::DeltaCheck { report })
        }

        PipelineMode::Initialize => {
            let builder = StagingBuilder::new(state.pool.clone(), state.classifier.clone());
            if let Some(existing) = ImportQueueEntry::latest_batch(&state.pool).await? {
                if request.fresh {
                    builder.discard(BatchId::from_uuid(existing)).await?;
                } else if ImportQueueEntry::count_unfinished(&state.pool, existing).await? > 0 {
                    return Err(ApiError::BadRequest(format!(
                        "batch {existing} is still in progress; resume it or pass fresh: true"
                    )));
                }
            }
            let zones = fetch_zones(state).await?;
            let result = builder.initialize(zones).await?;
            Ok(PipelineResponse::Initialize { result })
        }

        PipelineMode::ProcessCity => {
            let batch_id = require_batch(&request)?;
            let builder = StagingBuilder::new(state.pool.clone(), state.classifier.clone());
            let outcome = builder.process_next_city(batch_id).await?;
            Ok(PipelineResponse::ProcessCity { outcome })
        }

        PipelineMode::Finalize => {
            let batch_id = require_batch(&request)?;
            let builder = StagingBuilder::new(state.pool.clone(), state.classifier.clone());
            let result = builder.finalize(batch_id).await?;
            Ok(PipelineResponse::Finalize { result })
        }

        PipelineMode::CommitCity => {
            let batch_id = require_batch(&request)?;
            let engine = CommitEngine::new(state.pool.clone());
            let step = engine.commit_next_city(batch_id).await?;
            Ok(PipelineResponse::CommitCity { step })
        }

        PipelineMode::Commit => {
            let batch_id = require_batch(&request)?;
            let engine = CommitEngine::new(state.pool.clone());
            let driver = CommitDriver::new(engine, state.retry.clone());
            // A paused run surfaces as a 409 partial batch with the counts;
            // completed and cancelled runs return their outcome.
            let outcome = driver.drive(batch_id).await.into_result()?;
            Ok(PipelineResponse::Commit { outcome })
        }

        PipelineMode::SyncGeo => {
            let zones = fetch_zones(state).await?;
            let engine = CommitEngine::new(state.pool.clone());
            let step = engine.sync_geo_next(&zones, request.cursor.as_deref()).await?;
            Ok(PipelineResponse::SyncGeo { step })
        }

        PipelineMode::CoverageCheck => {
            let zones = fetch_zones(state).await?;
            let engine = CoverageEngine::new(state.pool.clone(), state.thresholds.clone());
            let report = engine.run(&zones).await?;
            Ok(PipelineResponse::CoverageCheck { report })
        }

        PipelineMode::DeactivateOrphans => {
            if !request.confirm {
                return Err(ApiError::BadRequest(
                    "deactivating orphaned areas requires confirm: true".to_string(),
                ));
            }
            if request.area_ids.is_empty() {
                return Err(ApiError::BadRequest(
                    "no area ids given for deactivation".to_string(),
                ));
            }
            let engine = CoverageEngine::new(state.pool.clone(), state.thresholds.clone());
            let deactivated = engine.deactivate_orphans(&request.area_ids).await?;
            Ok(PipelineResponse::DeactivateOrphans { deactivated })
        }
    }
}

/// Fetch live zones through the retry policy.
async fn fetch_zones(state: &PipelineState) -> Result<Vec<ProviderZone>, ApiError> {
    let zones = state
        .retry
        .run(
            || async { state.navio.fetch_zones().await.map_err(PipelineError::from) },
            |_, _| {},
        )
        .await?;
    Ok(zones)
}

fn require_batch(request: &PipelineRequest) -> Result<BatchId, ApiError> {
    request.batch_id.ok_or_else(|| {
        ApiError::BadRequest(format!(
            "mode {} requires batch_id",
            mode_name(request.mode)
        ))
    })
}

fn mode_name(mode: PipelineMode) -> &'static str {
    match mode {
        PipelineMode::DeltaCheck => "delta_check",
        PipelineMode::Initialize => "initialize",
        PipelineMode::ProcessCity => "process_city",
        PipelineMode::Finalize => "finalize",
        PipelineMode::CommitCity => "commit_city",
        PipelineMode::Commit => "commit",
        PipelineMode::SyncGeo => "sync_geo",
        PipelineMode::CoverageCheck => "coverage_check",
        PipelineMode::DeactivateOrphans => "deactivate_orphans",
    }
}

/// Compact success summary for the operation log.
fn success_details(response: &PipelineResponse) -> serde_json::Value {
    match response {
        PipelineResponse::DeltaCheck { report } => json!({ "summary": &report.summary }),
        PipelineResponse::Initialize { result } => json!({
            "batch_id": result.batch_id,
            "cities": result.cities.len(),
            "total_zones": result.total_zones,
        }),
        PipelineResponse::ProcessCity { outcome } => json!({
            "city": &outcome.city_name,
            "city_finished": outcome.city_finished,
            "batch_finished": outcome.batch_finished,
        }),
        PipelineResponse::Finalize { result } => json!({ "snapshot_rows": result.snapshot_rows }),
        PipelineResponse::CommitCity { step } => json!({
            "committed_city": &step.committed_city,
            "remaining": step.remaining,
        }),
        PipelineResponse::Commit { outcome } => json!({
            "status": outcome.status,
            "committed": &outcome.committed,
            "retries": outcome.retries,
        }),
        PipelineResponse::SyncGeo { step } => json!({
            "synced_city": &step.synced_city,
            "updated_areas": step.updated_areas,
            "remaining": step.remaining,
        }),
        PipelineResponse::CoverageCheck { report } => json!({ "health": report.health }),
        PipelineResponse::DeactivateOrphans { deactivated } => {
            json!({ "deactivated": deactivated })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use std::time::Duration;
    use uuid::Uuid;

    #[tokio::test]
    async fn a_failed_audit_write_does_not_surface() {
        // Pool pointing at a port nothing listens on, so the update can only
        // fail; the close must swallow it.
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(100))
            .connect_lazy("postgres://zonesync@127.0.0.1:1/zonesync")
            .expect("lazy pool");

        record_outcome(
            &pool,
            Uuid::new_v4(),
            OperationStatus::Failed,
            serde_json::json!({}),
        )
        .await;
    }
}
