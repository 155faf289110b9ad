//! Request/response models for the zone pipeline API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zonesync_core::BatchId;
use zonesync_db::models::{ImportQueueEntry, StagingArea, StagingCity, StagingDistrict};
use zonesync_pipeline::commit::{CommitStepResult, GeoSyncStepResult};
use zonesync_pipeline::coverage::CoverageReport;
use zonesync_pipeline::delta::DeltaReport;
use zonesync_pipeline::driver::DriveOutcome;
use zonesync_pipeline::staging::{FinalizeResult, InitializeResult, ProcessOutcome};

/// The unit of work requested from the multiplexed pipeline endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Diff live zones against the snapshot. Read-only.
    DeltaCheck,
    /// Create a new import batch (optionally discarding a cached one).
    Initialize,
    /// Advance staging by one unit of classification work.
    ProcessCity,
    /// Replace the snapshot from the fully staged batch.
    Finalize,
    /// Commit exactly one approved city to production.
    CommitCity,
    /// Drive all approved cities of the batch to production.
    Commit,
    /// Refresh one production city's geofences from live data.
    SyncGeo,
    /// Run the three-way coverage audit. Read-only.
    CoverageCheck,
    /// Disable delivery for confirmed orphaned areas.
    DeactivateOrphans,
}

/// Request body for `POST /admin/zones/pipeline`.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineRequest {
    pub mode: PipelineMode,

    /// Required for batch-scoped modes.
    #[serde(default)]
    pub batch_id: Option<BatchId>,

    /// `initialize` only: discard the cached batch and start fresh.
    #[serde(default)]
    pub fresh: bool,

    /// `sync_geo` only: external key of the last synced city.
    #[serde(default)]
    pub cursor: Option<String>,

    /// `deactivate_orphans` only: the confirmed area ids.
    #[serde(default)]
    pub area_ids: Vec<Uuid>,

    /// `deactivate_orphans` only: explicit confirmation gate.
    #[serde(default)]
    pub confirm: bool,
}

/// Typed per-mode response payloads.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PipelineResponse {
    DeltaCheck {
        report: DeltaReport,
    },
    Initialize {
        #[serde(flatten)]
        result: InitializeResult,
    },
    ProcessCity {
        #[serde(flatten)]
        outcome: ProcessOutcome,
    },
    Finalize {
        #[serde(flatten)]
        result: FinalizeResult,
    },
    CommitCity {
        #[serde(flatten)]
        step: CommitStepResult,
    },
    Commit {
        #[serde(flatten)]
        outcome: DriveOutcome,
    },
    SyncGeo {
        #[serde(flatten)]
        step: GeoSyncStepResult,
    },
    CoverageCheck {
        report: CoverageReport,
    },
    DeactivateOrphans {
        deactivated: u64,
    },
}

/// Per-city progress of a cached batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityProgress {
    pub city_name: String,
    pub status: String,
    pub districts_found: i32,
    pub areas_found: i32,
    pub processed_count: i32,
    pub total_zones: i32,
}

impl From<&ImportQueueEntry> for CityProgress {
    fn from(entry: &ImportQueueEntry) -> Self {
        Self {
            city_name: entry.city_name.clone(),
            status: entry.status.clone(),
            districts_found: entry.districts_found,
            areas_found: entry.areas_found,
            processed_count: entry.processed_count,
            total_zones: entry.total_zones,
        }
    }
}

/// The active cached batch, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatus {
    pub batch_id: Uuid,
    pub cities: Vec<CityProgress>,
}

/// Response for `GET /admin/zones/pipeline/batch`.
///
/// `batch: null` means there is nothing to resume; the client should offer
/// "start fresh" only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveBatchResponse {
    pub batch: Option<BatchStatus>,
}

/// Leaf node of the staging review tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingAreaNode {
    pub id: Uuid,
    pub provider_zone_id: String,
    pub proposed_name: String,
    pub upstream_name: String,
    pub status: String,
    pub confidence: Option<f32>,
    pub has_geofence: bool,
}

impl From<&StagingArea> for StagingAreaNode {
    fn from(area: &StagingArea) -> Self {
        Self {
            id: area.id,
            provider_zone_id: area.provider_zone_id.clone(),
            proposed_name: area.proposed_name.clone(),
            upstream_name: area.upstream_name.clone(),
            status: area.status.clone(),
            confidence: area.confidence,
            has_geofence: area.geofence.is_some(),
        }
    }
}

/// District node of the staging review tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingDistrictNode {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub areas: Vec<StagingAreaNode>,
}

impl StagingDistrictNode {
    pub fn new(district: &StagingDistrict, areas: &[StagingArea]) -> Self {
        Self {
            id: district.id,
            name: district.name.clone(),
            status: district.status.clone(),
            areas: areas.iter().map(StagingAreaNode::from).collect(),
        }
    }
}

/// City node of the staging review tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingCityNode {
    pub id: Uuid,
    pub name: String,
    pub country_code: Option<String>,
    pub status: String,
    pub districts: Vec<StagingDistrictNode>,
}

impl StagingCityNode {
    pub fn new(city: &StagingCity, districts: Vec<StagingDistrictNode>) -> Self {
        Self {
            id: city.id,
            name: city.name.clone(),
            country_code: city.country_code.clone(),
            status: city.status.clone(),
            districts,
        }
    }
}

/// Response for `GET /admin/zones/staging/:batch_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingTreeResponse {
    pub batch_id: Uuid,
    pub cities: Vec<StagingCityNode>,
}

/// Request body for the approve/reject endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionRequest {
    pub batch_id: BatchId,
    pub city_ids: Vec<Uuid>,
}

/// Response for the approve/reject endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub cities: usize,
    /// Rows touched per cascade statement, in application order.
    pub affected_rows: Vec<u64>,
}

/// Request body for `POST /admin/zones/staging/resolve-mapping`.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveMappingRequest {
    pub area_id: Uuid,
    pub proposed_name: String,
}

/// Response for the resolve-mapping endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveMappingResponse {
    pub area: StagingAreaNode,
}

/// Query parameters for `GET /admin/zones/operations`.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationsQuery {
    pub limit: Option<i64>,
}

/// One operation log entry as rendered to the admin UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationView {
    pub id: Uuid,
    pub operation_type: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub details: serde_json::Value,
}

/// Response for `GET /admin/zones/operations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationsResponse {
    pub operations: Vec<OperationView>,
}
