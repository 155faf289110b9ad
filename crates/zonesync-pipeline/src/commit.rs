//! Incremental commit engine.
//!
//! Promotes exactly one approved city per step from staging into production.
//! Production rows are matched by stable external key, so re-running a step
//! after a crash updates rows instead of duplicating them; per-city
//! granularity bounds the blast radius of a mid-batch failure.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use std::collections::HashSet;
use tracing::{info, instrument};
use zonesync_core::{BatchId, Geofence, LngLat};
use zonesync_db::models::{
    ProductionArea, ProductionCity, ProductionDistrict, StagingArea, StagingCity, StagingDistrict,
    StagingStatus, UpsertProductionArea, UpsertProductionCity, UpsertProductionDistrict,
};
use zonesync_navio::ProviderZone;

use crate::approval::CascadePlan;
use crate::error::{PipelineError, PipelineResult};

/// Result of one commit step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitStepResult {
    /// True when no approved cities remain for the batch.
    pub completed: bool,
    /// Approved cities still waiting after this step.
    pub remaining: u32,
    /// The city promoted by this step, if any.
    pub committed_city: Option<String>,
}

/// Result of one geofence-sync step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoSyncStepResult {
    pub completed: bool,
    pub synced_city: Option<String>,
    /// Pass back as `cursor` on the next call.
    pub next_cursor: Option<String>,
    pub updated_areas: u32,
    pub remaining: u32,
}

/// Derive a stable slug from a display name.
///
/// Lowercased, alphanumerics kept, everything else collapsed to single
/// hyphens. Deterministic across runs; it feeds the external keys.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true;
    for ch in name.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                slug.push(lower);
            }
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Promotes approved staging subtrees into production, one city per step.
pub struct CommitEngine {
    pool: PgPool,
}

impl CommitEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Commit the next approved city of the batch.
    ///
    /// Idempotent: production upserts match by external key and the staging
    /// subtree is only flipped to `committed` afterwards, so repeating the
    /// step after a partial failure converges.
    #[instrument(skip(self))]
    pub async fn commit_next_city(&self, batch_id: BatchId) -> PipelineResult<CommitStepResult> {
        let batch_uuid = *batch_id.as_uuid();

        let approved =
            StagingCity::list_by_status(&self.pool, batch_uuid, StagingStatus::Approved).await?;
        let Some(city) = approved.first() else {
            return Ok(CommitStepResult {
                completed: true,
                remaining: 0,
                committed_city: None,
            });
        };

        let districts = StagingDistrict::list_by_city(&self.pool, city.id).await?;
        let mut areas_by_district: HashMap<uuid::Uuid, Vec<StagingArea>> = HashMap::new();
        for district in &districts {
            let areas = StagingArea::list_by_district(&self.pool, district.id).await?;
            for area in &areas {
                if area.status() == StagingStatus::NeedsMapping {
                    return Err(PipelineError::data_integrity(format!(
                        "approved city '{}' contains unresolved area '{}'",
                        city.name, area.upstream_name
                    )));
                }
            }
            areas_by_district.insert(district.id, areas);
        }

        let city_slug = slugify(&city.name);
        let mut district_slugs = HashSet::new();
        for district in &districts {
            if !district_slugs.insert(slugify(&district.name)) {
                return Err(PipelineError::validation(format!(
                    "districts '{}' collide on slug within city '{}'",
                    district.name, city.name
                )));
            }
        }

        let mut tx = self.pool.begin().await?;

        let production_city = ProductionCity::upsert(
            &mut tx,
            &UpsertProductionCity {
                external_key: city_slug.clone(),
                name: city.name.clone(),
                country_code: city.country_code.clone(),
            },
        )
        .await?;

        for district in &districts {
            let production_district = ProductionDistrict::upsert(
                &mut tx,
                &UpsertProductionDistrict {
                    external_key: format!("{city_slug}/{}", slugify(&district.name)),
                    city_id: production_city.id,
                    name: district.name.clone(),
                },
            )
            .await?;

            for area in &areas_by_district[&district.id] {
                ProductionArea::upsert(
                    &mut tx,
                    &UpsertProductionArea {
                        external_key: area.provider_zone_id.clone(),
                        district_id: production_district.id,
                        provider_zone_id: area.provider_zone_id.clone(),
                        name: area.proposed_name.clone(),
                        upstream_name: Some(area.upstream_name.clone()),
                        geofence: area.geofence.clone(),
                    },
                )
                .await?;
            }
        }

        tx.commit().await?;

        // Flip the subtree after the production transaction: a crash in
        // between re-runs the (idempotent) upserts on the next attempt.
        CascadePlan::mark_committed(batch_id, vec![city.id])
            .apply(&self.pool)
            .await?;

        let remaining =
            StagingCity::count_by_status(&self.pool, batch_uuid, StagingStatus::Approved).await?
                as u32;

        info!(batch_id = %batch_id, city = %city.name, remaining, "Committed city to production");

        Ok(CommitStepResult {
            completed: remaining == 0,
            remaining,
            committed_city: Some(city.name.clone()),
        })
    }

    /// Refresh production geofences from live provider data, one city per
    /// step. `cursor` is the external key of the last synced city.
    #[instrument(skip(self, zones))]
    pub async fn sync_geo_next(
        &self,
        zones: &[ProviderZone],
        cursor: Option<&str>,
    ) -> PipelineResult<GeoSyncStepResult> {
        let mut cities = ProductionCity::list_all(&self.pool).await?;
        cities.sort_by(|a, b| a.external_key.cmp(&b.external_key));

        let position = cities
            .iter()
            .position(|c| Some(c.external_key.as_str()) > cursor);
        let Some(position) = position else {
            return Ok(GeoSyncStepResult {
                completed: true,
                synced_city: None,
                next_cursor: cursor.map(str::to_string),
                updated_areas: 0,
                remaining: 0,
            });
        };
        let city = &cities[position];

        let by_zone_id: HashMap<&str, &ProviderZone> = zones
            .iter()
            .filter(|z| z.is_active)
            .map(|z| (z.id.as_str(), z))
            .collect();

        let mut updated_areas = 0u32;
        for area in ProductionArea::list_by_city(&self.pool, city.id).await? {
            let Some(zone) = by_zone_id.get(area.provider_zone_id.as_str()) else {
                continue;
            };
            let Some(live_fence) = &zone.geofence else {
                continue;
            };
            let stored = area
                .geofence
                .as_ref()
                .and_then(|v| Geofence::<LngLat>::from_json(v).ok());
            if stored.as_ref() != Some(live_fence) {
                ProductionArea::update_geofence(
                    &self.pool,
                    &area.external_key,
                    &live_fence.to_json()?,
                )
                .await?;
                updated_areas += 1;
            }
        }

        let remaining = (cities.len() - position - 1) as u32;
        info!(city = %city.name, updated_areas, remaining, "Synced production geofences");

        Ok(GeoSyncStepResult {
            completed: remaining == 0,
            synced_city: Some(city.name.clone()),
            next_cursor: Some(city.external_key.clone()),
            updated_areas,
            remaining,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs_are_stable_and_lowercase() {
        assert_eq!(slugify("Oslo"), "oslo");
        assert_eq!(slugify("Grünerløkka"), "grünerløkka");
        assert_eq!(slugify("St. Hanshaugen"), "st-hanshaugen");
        assert_eq!(slugify("  Gamle   Oslo  "), "gamle-oslo");
    }

    #[test]
    fn slug_collisions_are_detectable() {
        assert_eq!(slugify("St-Hanshaugen"), slugify("St. Hanshaugen"));
    }
}
