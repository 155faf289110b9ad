//! Operation log handler.
//!
//! - GET /admin/zones/operations — recent entries, newest first

use axum::{extract::Query, Extension, Json};
use zonesync_db::models::OperationLogEntry;

use crate::error::ApiError;
use crate::models::{OperationView, OperationsQuery, OperationsResponse};
use crate::router::PipelineState;

/// Default and maximum page sizes for the history view.
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// GET /admin/zones/operations
pub async fn list_operations(
    Extension(state): Extension<PipelineState>,
    Query(query): Query<OperationsQuery>,
) -> Result<Json<OperationsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let entries = OperationLogEntry::list_recent(&state.pool, limit).await?;

    let operations = entries
        .into_iter()
        .map(|entry| OperationView {
            id: entry.id,
            operation_type: entry.operation_type,
            status: entry.status,
            started_at: entry.started_at,
            completed_at: entry.completed_at,
            details: entry.details,
        })
        .collect();

    Ok(Json(OperationsResponse { operations }))
}
