//! Staging review handlers.
//!
//! - GET  /`admin/zones/staging/:batch_id` — full tree for human review
//! - POST /admin/zones/staging/approve — cascade-approve cities
//! - POST /admin/zones/staging/reject — cascade-reject cities
//! - POST /admin/zones/staging/resolve-mapping — human name for a flagged area

use axum::{extract::Path, Extension, Json};
use zonesync_core::BatchId;
use zonesync_db::models::{StagingArea, StagingCity, StagingDistrict};
use zonesync_pipeline::approval::ApprovalMachine;

use crate::error::ApiError;
use crate::models::{
    DecisionRequest, DecisionResponse, ResolveMappingRequest, ResolveMappingResponse,
    StagingAreaNode, StagingCityNode, StagingDistrictNode, StagingTreeResponse,
};
use crate::router::PipelineState;

/// GET /`admin/zones/staging/:batch_id`
pub async fn get_staging_tree(
    Extension(state): Extension<PipelineState>,
    Path(batch_id): Path<BatchId>,
) -> Result<Json<StagingTreeResponse>, ApiError> {
    let batch = *batch_id.as_uuid();
    let cities = StagingCity::list_by_batch(&state.pool, batch).await?;
    if cities.is_empty() {
        return Err(ApiError::NotFound(format!("staging batch {batch_id}")));
    }

    let mut nodes = Vec::with_capacity(cities.len());
    for city in &cities {
        let districts = StagingDistrict::list_by_city(&state.pool, city.id).await?;
        let mut district_nodes = Vec::with_capacity(districts.len());
        for district in &districts {
            let areas = StagingArea::list_by_district(&state.pool, district.id).await?;
            district_nodes.push(StagingDistrictNode::new(district, &areas));
        }
        nodes.push(StagingCityNode::new(city, district_nodes));
    }

    Ok(Json(StagingTreeResponse {
        batch_id: batch,
        cities: nodes,
    }))
}

/// POST /admin/zones/staging/approve
pub async fn approve_cities(
    Extension(state): Extension<PipelineState>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let machine = ApprovalMachine::new(state.pool.clone());
    let affected_rows = machine
        .approve(request.batch_id, &request.city_ids)
        .await?;
    Ok(Json(DecisionResponse {
        cities: request.city_ids.len(),
        affected_rows,
    }))
}

/// POST /admin/zones/staging/reject
pub async fn reject_cities(
    Extension(state): Extension<PipelineState>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let machine = ApprovalMachine::new(state.pool.clone());
    let affected_rows = machine.reject(request.batch_id, &request.city_ids).await?;
    Ok(Json(DecisionResponse {
        cities: request.city_ids.len(),
        affected_rows,
    }))
}

/// POST /admin/zones/staging/resolve-mapping
///
/// Only matches areas still flagged `needs_mapping`; anything else is a 404
/// so a stale UI cannot silently rename a resolved area.
pub async fn resolve_mapping(
    Extension(state): Extension<PipelineState>,
    Json(request): Json<ResolveMappingRequest>,
) -> Result<Json<ResolveMappingResponse>, ApiError> {
    if request.proposed_name.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "proposed_name must not be empty".to_string(),
        ));
    }

    let area = StagingArea::resolve_mapping(
        &state.pool,
        request.area_id,
        request.proposed_name.trim(),
    )
    .await?
    .ok_or_else(|| {
        ApiError::NotFound(format!("unresolved staging area {}", request.area_id))
    })?;

    Ok(Json(ResolveMappingResponse {
        area: StagingAreaNode::from(&area),
    }))
}
