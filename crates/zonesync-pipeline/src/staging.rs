//! Staging hierarchy builder.
//!
//! Advances AI-assisted classification one unit of work per invocation: a
//! unit is "start the next city" or "continue the current city's districts".
//! Every partial result is persisted immediately (queue cursor + staging
//! rows), so an interruption loses at most the single in-flight unit.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use zonesync_core::BatchId;
use zonesync_db::models::{
    CreateImportQueueEntry, CreateSnapshotRecord, CreateStagingArea, CreateStagingCity,
    CreateStagingDistrict, ImportQueueEntry, StagingArea, StagingCity, StagingDistrict,
    StagingStatus, ZoneSnapshotRecord,
};
use zonesync_navio::ProviderZone;

use crate::classify::Classifier;
use crate::error::{PipelineError, PipelineResult};

/// Default number of zones classified per processing step.
const DEFAULT_CHUNK_SIZE: usize = 25;

/// Result of batch initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeResult {
    pub batch_id: BatchId,
    pub cities: Vec<String>,
    pub total_zones: u32,
}

/// Result of one processing unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    /// City touched by this unit; `None` when the batch had nothing left.
    pub city_name: Option<String>,
    /// Whether that city is now fully staged.
    pub city_finished: bool,
    /// Whether every city of the batch is fully staged.
    pub batch_finished: bool,
    pub districts_found: i32,
    pub areas_found: i32,
    /// Zones staged so far for the city.
    pub processed: i32,
    pub total: i32,
}

/// Result of finalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeResult {
    pub snapshot_rows: u64,
}

/// Builds the staging tree for a batch, one bounded unit per call.
pub struct StagingBuilder {
    pool: PgPool,
    classifier: Arc<dyn Classifier>,
    chunk_size: usize,
}

impl StagingBuilder {
    /// Create a builder with the default chunk size.
    pub fn new(pool: PgPool, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            pool,
            classifier,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the number of zones classified per step.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Create a new batch: group live zones into cities and enqueue one
    /// import-queue row per city with the raw zones cached for resumption.
    #[instrument(skip(self, zones))]
    pub async fn initialize(&self, zones: Vec<ProviderZone>) -> PipelineResult<InitializeResult> {
        let active: Vec<ProviderZone> = zones.into_iter().filter(|z| z.is_active).collect();
        if active.is_empty() {
            return Err(PipelineError::validation(
                "provider returned no active zones to import",
            ));
        }

        let groups = self.classifier.group_cities(&active).await?;
        if groups.is_empty() {
            return Err(PipelineError::validation("classifier returned no city groups"));
        }

        let by_id: HashMap<&str, &ProviderZone> =
            active.iter().map(|z| (z.id.as_str(), z)).collect();
        let mut assigned = 0usize;

        let batch_id = BatchId::new();
        let mut cities = Vec::with_capacity(groups.len());

        for group in &groups {
            let mut city_zones = Vec::with_capacity(group.zone_ids.len());
            for zone_id in &group.zone_ids {
                let zone = by_id.get(zone_id.as_str()).ok_or_else(|| {
                    PipelineError::validation(format!(
                        "classifier assigned unknown zone {zone_id} to {}",
                        group.city_name
                    ))
                })?;
                city_zones.push((*zone).clone());
            }
            assigned += city_zones.len();

            StagingCity::create(
                self.pool_ref(),
                &CreateStagingCity {
                    batch_id: *batch_id.as_uuid(),
                    name: group.city_name.clone(),
                    country_code: group.country_code.clone(),
                },
            )
            .await?;

            ImportQueueEntry::create(
                self.pool_ref(),
                &CreateImportQueueEntry {
                    batch_id: *batch_id.as_uuid(),
                    city_name: group.city_name.clone(),
                    total_zones: city_zones.len() as i32,
                    raw_zones: serde_json::to_value(&city_zones)?,
                },
            )
            .await?;

            cities.push(group.city_name.clone());
        }

        if assigned != active.len() {
            // Ambiguous zones must be flagged by the classifier inside a
            // group, never dropped between groups.
            return Err(PipelineError::validation(format!(
                "classifier grouped {assigned} of {} zones",
                active.len()
            )));
        }

        info!(batch_id = %batch_id, cities = cities.len(), zones = assigned, "Initialized import batch");

        Ok(InitializeResult {
            batch_id,
            cities,
            total_zones: assigned as u32,
        })
    }

    /// Discard a cached batch entirely ("start fresh").
    pub async fn discard(&self, batch_id: BatchId) -> PipelineResult<()> {
        ImportQueueEntry::delete_batch(self.pool_ref(), *batch_id.as_uuid()).await?;
        StagingCity::delete_batch(self.pool_ref(), *batch_id.as_uuid()).await?;
        info!(batch_id = %batch_id, "Discarded batch");
        Ok(())
    }

    /// Advance classification by one unit of work.
    ///
    /// Continues the in-flight city if one exists, otherwise claims the next
    /// pending one. Large cities take multiple calls; the queue row's
    /// `processed_count` is the resume cursor.
    #[instrument(skip(self))]
    pub async fn process_next_city(&self, batch_id: BatchId) -> PipelineResult<ProcessOutcome> {
        let batch_uuid = *batch_id.as_uuid();

        let entry = match ImportQueueEntry::find_processing(self.pool_ref(), batch_uuid).await? {
            Some(entry) => Some(entry),
            None => ImportQueueEntry::claim_next(self.pool_ref(), batch_uuid).await?,
        };

        let Some(entry) = entry else {
            let unfinished = ImportQueueEntry::count_unfinished(self.pool_ref(), batch_uuid).await?;
            if unfinished > 0 {
                return Err(PipelineError::data_integrity(format!(
                    "no city claimable but {unfinished} queue rows unfinished"
                )));
            }
            return Ok(ProcessOutcome {
                city_name: None,
                city_finished: true,
                batch_finished: true,
                districts_found: 0,
                areas_found: 0,
                processed: 0,
                total: 0,
            });
        };

        let city = StagingCity::find_by_name(self.pool_ref(), batch_uuid, &entry.city_name)
            .await?
            .ok_or_else(|| {
                PipelineError::data_integrity(format!(
                    "queue row for '{}' has no staging city",
                    entry.city_name
                ))
            })?;

        let zones: Vec<ProviderZone> = serde_json::from_value(entry.raw_zones.clone())?;
        let start = entry.processed_count.max(0) as usize;
        let end = (start + self.chunk_size).min(zones.len());
        let slice = &zones[start..end];

        if !slice.is_empty() {
            let classification = self
                .classifier
                .classify_city(&entry.city_name, slice)
                .await?;
            self.persist_proposals(&entry, &city, slice, classification)
                .await?;
        }

        let districts_found =
            StagingDistrict::list_by_city(self.pool_ref(), city.id).await?.len() as i32;
        let areas_found =
            StagingArea::count_by_city(self.pool_ref(), batch_uuid, city.id).await? as i32;
        let processed = end as i32;

        ImportQueueEntry::update_progress(
            self.pool_ref(),
            entry.id,
            districts_found,
            areas_found,
            processed,
        )
        .await?;

        let city_finished = end >= zones.len();
        if city_finished {
            ImportQueueEntry::mark_completed(self.pool_ref(), entry.id).await?;
        }

        let batch_finished = city_finished
            && ImportQueueEntry::count_unfinished(self.pool_ref(), batch_uuid).await? == 0;

        info!(
            batch_id = %batch_id,
            city = %entry.city_name,
            processed,
            total = entry.total_zones,
            city_finished,
            "Processed staging unit"
        );

        Ok(ProcessOutcome {
            city_name: Some(entry.city_name),
            city_finished,
            batch_finished,
            districts_found,
            areas_found,
            processed,
            total: entry.total_zones,
        })
    }

    async fn persist_proposals(
        &self,
        entry: &ImportQueueEntry,
        city: &StagingCity,
        slice: &[ProviderZone],
        classification: crate::classify::CityClassification,
    ) -> PipelineResult<()> {
        let by_id: HashMap<&str, &ProviderZone> =
            slice.iter().map(|z| (z.id.as_str(), z)).collect();

        for district in classification.districts {
            let district_row = StagingDistrict::upsert(
                self.pool_ref(),
                &CreateStagingDistrict {
                    batch_id: entry.batch_id,
                    city_id: city.id,
                    name: district.name.clone(),
                },
            )
            .await?;

            for area in district.areas {
                let zone = by_id.get(area.zone_id.as_str()).ok_or_else(|| {
                    PipelineError::validation(format!(
                        "classifier referenced zone {} outside the current chunk",
                        area.zone_id
                    ))
                })?;

                let status = if area.needs_mapping {
                    StagingStatus::NeedsMapping
                } else {
                    StagingStatus::Pending
                };
                let proposed_name = if area.proposed_name.trim().is_empty() {
                    zone.name.clone()
                } else {
                    area.proposed_name.clone()
                };
                let geofence = match &zone.geofence {
                    Some(fence) => Some(fence.to_json()?),
                    None => None,
                };

                StagingArea::upsert(
                    self.pool_ref(),
                    &CreateStagingArea {
                        batch_id: entry.batch_id,
                        district_id: district_row.id,
                        provider_zone_id: zone.id.as_str().to_string(),
                        proposed_name,
                        upstream_name: zone.name.clone(),
                        status,
                        geofence,
                        confidence: Some(area.confidence),
                    },
                )
                .await?;
            }
        }
        Ok(())
    }

    /// Replace the snapshot wholesale from the batch's cached zones.
    ///
    /// Only valid once every city of the batch is fully staged.
    #[instrument(skip(self))]
    pub async fn finalize(&self, batch_id: BatchId) -> PipelineResult<FinalizeResult> {
        let batch_uuid = *batch_id.as_uuid();

        let unfinished = ImportQueueEntry::count_unfinished(self.pool_ref(), batch_uuid).await?;
        if unfinished > 0 {
            return Err(PipelineError::validation(format!(
                "cannot finalize: {unfinished} cities still unprocessed"
            )));
        }

        let entries = ImportQueueEntry::list_by_batch(self.pool_ref(), batch_uuid).await?;
        if entries.is_empty() {
            return Err(PipelineError::not_found("ImportBatch", batch_id));
        }

        let mut records = Vec::new();
        for entry in &entries {
            let zones: Vec<ProviderZone> = serde_json::from_value(entry.raw_zones.clone())?;
            for zone in zones {
                let geofence = match &zone.geofence {
                    Some(fence) => Some(fence.to_json()?),
                    None => None,
                };
                records.push(CreateSnapshotRecord {
                    provider_zone_id: zone.id.as_str().to_string(),
                    name: zone.name,
                    display_name: zone.display_name,
                    city_name: Some(entry.city_name.clone()),
                    country_code: zone.country_code,
                    geofence,
                    is_active: zone.is_active,
                });
            }
        }

        let snapshot_rows = ZoneSnapshotRecord::replace_all(self.pool_ref(), &records).await?;
        info!(batch_id = %batch_id, snapshot_rows, "Finalized import batch");

        Ok(FinalizeResult { snapshot_rows })
    }

    fn pool_ref(&self) -> &PgPool {
        &self.pool
    }
}
