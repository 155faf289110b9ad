//! Coverage reconciliation engine.
//!
//! Read-mostly three-way audit of live provider zones, the snapshot, and
//! committed production areas. The audit never mutates; deactivating
//! orphaned areas is a separate, explicitly confirmed action because it
//! changes live delivery availability.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, instrument};
use uuid::Uuid;
use zonesync_core::{Geofence, LngLat};
use zonesync_db::models::{ProductionArea, ZoneSnapshotRecord};
use zonesync_navio::ProviderZone;

use crate::delta::SnapshotZone;
use crate::error::PipelineResult;

/// Health thresholds. Absolute counts, not percentages, to stay sensitive at
/// small scale; all configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageThresholds {
    /// Uncovered provider zones above this count degrade health to warning.
    #[serde(default = "default_uncovered_warning")]
    pub uncovered_warning: u32,
    /// Uncovered provider zones above this count degrade health to critical.
    #[serde(default = "default_uncovered_critical")]
    pub uncovered_critical: u32,
    /// Orphaned production areas above this count degrade health to warning.
    #[serde(default = "default_orphaned_warning")]
    pub orphaned_warning: u32,
}

fn default_uncovered_warning() -> u32 {
    5
}

fn default_uncovered_critical() -> u32 {
    25
}

fn default_orphaned_warning() -> u32 {
    5
}

impl Default for CoverageThresholds {
    fn default() -> Self {
        Self {
            uncovered_warning: default_uncovered_warning(),
            uncovered_critical: default_uncovered_critical(),
            orphaned_warning: default_orphaned_warning(),
        }
    }
}

/// Overall audit verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

/// Snapshot freshness relative to the live provider list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotFreshness {
    pub provider_total: u32,
    pub snapshot_total: u32,
    /// Live zone ids the snapshot has never seen.
    pub missing_from_snapshot: Vec<String>,
    /// Snapshot zone ids no longer present upstream.
    pub removed_from_provider: Vec<String>,
}

/// Alignment between live provider zones and production areas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageCounts {
    pub navio_areas_total: u32,
    pub navio_areas_covered: u32,
    pub navio_areas_uncovered: u32,
    pub production_areas_total: u32,
    pub production_areas_aligned: u32,
    pub production_areas_orphaned: u32,
}

/// Differently-named production areas sharing one identical geofence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedPolygonGroup {
    pub area_names: Vec<String>,
}

/// Polygon sharing across production areas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolygonSharing {
    /// Distinct geofences among production areas.
    pub unique_polygons: u32,
    pub shared_groups: Vec<SharedPolygonGroup>,
}

/// A production area whose backing zone is gone or inactive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanCandidate {
    pub area_id: Uuid,
    pub external_key: String,
    pub name: String,
    pub provider_zone_id: String,
}

/// Production area view used by the pure audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionAreaView {
    pub id: Uuid,
    pub external_key: String,
    pub name: String,
    pub provider_zone_id: String,
    pub delivery_enabled: bool,
    pub geofence: Option<serde_json::Value>,
}

impl From<&ProductionArea> for ProductionAreaView {
    fn from(area: &ProductionArea) -> Self {
        Self {
            id: area.id,
            external_key: area.external_key.clone(),
            name: area.name.clone(),
            provider_zone_id: area.provider_zone_id.clone(),
            delivery_enabled: area.delivery_enabled,
            geofence: area.geofence.clone(),
        }
    }
}

/// Full reconciliation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageReport {
    pub freshness: SnapshotFreshness,
    pub counts: CoverageCounts,
    pub polygons: PolygonSharing,
    pub health: HealthStatus,
    pub orphan_candidates: Vec<OrphanCandidate>,
}

/// Pure three-way audit.
#[must_use]
pub fn audit(
    zones: &[ProviderZone],
    snapshot: &[SnapshotZone],
    production: &[ProductionAreaView],
    thresholds: &CoverageThresholds,
) -> CoverageReport {
    let live_ids: HashSet<&str> = zones.iter().map(|z| z.id.as_str()).collect();
    let active_ids: HashSet<&str> = zones
        .iter()
        .filter(|z| z.is_active)
        .map(|z| z.id.as_str())
        .collect();
    let snapshot_ids: HashSet<&str> = snapshot
        .iter()
        .map(|z| z.provider_zone_id.as_str())
        .collect();
    let production_zone_ids: HashSet<&str> = production
        .iter()
        .map(|a| a.provider_zone_id.as_str())
        .collect();

    let mut missing_from_snapshot: Vec<String> = live_ids
        .difference(&snapshot_ids)
        .map(|id| (*id).to_string())
        .collect();
    missing_from_snapshot.sort();
    let mut removed_from_provider: Vec<String> = snapshot_ids
        .difference(&live_ids)
        .map(|id| (*id).to_string())
        .collect();
    removed_from_provider.sort();

    let freshness = SnapshotFreshness {
        provider_total: zones.len() as u32,
        snapshot_total: snapshot.len() as u32,
        missing_from_snapshot,
        removed_from_provider,
    };

    let navio_areas_total = active_ids.len() as u32;
    let navio_areas_covered = active_ids
        .iter()
        .filter(|id| production_zone_ids.contains(**id))
        .count() as u32;

    let production_areas_total = production.len() as u32;
    let production_areas_aligned = production
        .iter()
        .filter(|a| active_ids.contains(a.provider_zone_id.as_str()))
        .count() as u32;

    let counts = CoverageCounts {
        navio_areas_total,
        navio_areas_covered,
        navio_areas_uncovered: navio_areas_total - navio_areas_covered,
        production_areas_total,
        production_areas_aligned,
        production_areas_orphaned: production_areas_total - production_areas_aligned,
    };

    let orphan_candidates: Vec<OrphanCandidate> = production
        .iter()
        .filter(|a| a.delivery_enabled && !active_ids.contains(a.provider_zone_id.as_str()))
        .map(|a| OrphanCandidate {
            area_id: a.id,
            external_key: a.external_key.clone(),
            name: a.name.clone(),
            provider_zone_id: a.provider_zone_id.clone(),
        })
        .collect();

    let mut by_fingerprint: BTreeMap<u64, Vec<String>> = BTreeMap::new();
    for area in production {
        let Some(value) = &area.geofence else { continue };
        let Ok(fence) = Geofence::<LngLat>::from_json(value) else {
            continue;
        };
        by_fingerprint
            .entry(fence.fingerprint())
            .or_default()
            .push(area.name.clone());
    }
    let unique_polygons = by_fingerprint.len() as u32;
    let shared_groups: Vec<SharedPolygonGroup> = by_fingerprint
        .into_values()
        .filter_map(|mut names| {
            names.sort();
            names.dedup();
            (names.len() > 1).then_some(SharedPolygonGroup { area_names: names })
        })
        .collect();

    let health = if counts.navio_areas_uncovered > thresholds.uncovered_critical {
        HealthStatus::Critical
    } else if counts.navio_areas_uncovered > thresholds.uncovered_warning
        || counts.production_areas_orphaned > thresholds.orphaned_warning
    {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    };

    CoverageReport {
        freshness,
        counts,
        polygons: PolygonSharing {
            unique_polygons,
            shared_groups,
        },
        health,
        orphan_candidates,
    }
}

/// Runs audits against the persisted stores.
pub struct CoverageEngine {
    pool: PgPool,
    thresholds: CoverageThresholds,
}

impl CoverageEngine {
    pub fn new(pool: PgPool, thresholds: CoverageThresholds) -> Self {
        Self { pool, thresholds }
    }

    /// Audit live zones against snapshot and production.
    #[instrument(skip(self, zones))]
    pub async fn run(&self, zones: &[ProviderZone]) -> PipelineResult<CoverageReport> {
        let snapshot_records = ZoneSnapshotRecord::list_all(&self.pool).await?;
        let snapshot: Vec<SnapshotZone> = snapshot_records.iter().map(SnapshotZone::from).collect();
        let production_rows = ProductionArea::list_all(&self.pool).await?;
        let production: Vec<ProductionAreaView> =
            production_rows.iter().map(ProductionAreaView::from).collect();

        let report = audit(zones, &snapshot, &production, &self.thresholds);
        info!(
            health = ?report.health,
            uncovered = report.counts.navio_areas_uncovered,
            orphaned = report.counts.production_areas_orphaned,
            "Coverage audit complete"
        );
        Ok(report)
    }

    /// Disable delivery for the given production areas.
    ///
    /// Explicit, user-confirmed action; never triggered by the audit itself.
    #[instrument(skip(self))]
    pub async fn deactivate_orphans(&self, area_ids: &[Uuid]) -> PipelineResult<u64> {
        if area_ids.is_empty() {
            return Ok(0);
        }
        let updated = ProductionArea::set_delivery_enabled(&self.pool, area_ids, false).await?;
        info!(updated, "Deactivated orphaned production areas");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_core::ProviderZoneId;

    fn zone(id: &str, active: bool) -> ProviderZone {
        ProviderZone {
            id: ProviderZoneId::new(id),
            name: format!("zone {id}"),
            display_name: None,
            is_active: active,
            geofence: None,
            postal_codes: vec![],
            city_hint: Some("Oslo".into()),
            country_code: None,
        }
    }

    fn snap(id: &str) -> SnapshotZone {
        SnapshotZone {
            provider_zone_id: id.to_string(),
            name: format!("zone {id}"),
            city_name: Some("Oslo".into()),
            geofence: None,
        }
    }

    fn area(id_seed: u128, zone_id: &str, name: &str) -> ProductionAreaView {
        ProductionAreaView {
            id: Uuid::from_u128(id_seed),
            external_key: zone_id.to_string(),
            name: name.to_string(),
            provider_zone_id: zone_id.to_string(),
            delivery_enabled: true,
            geofence: None,
        }
    }

    fn fence_json(offset: f64) -> serde_json::Value {
        Geofence::<LngLat>::polygon(vec![vec![
            [offset, offset],
            [offset + 1.0, offset],
            [offset, offset],
        ]])
        .to_json()
        .unwrap()
    }

    #[test]
    fn coverage_arithmetic_always_balances() {
        let zones = vec![zone("1", true), zone("2", true), zone("3", false)];
        let production = vec![area(1, "1", "Sentrum"), area(2, "9", "Ghost")];

        let report = audit(&zones, &[snap("1")], &production, &CoverageThresholds::default());
        let c = &report.counts;

        assert_eq!(c.navio_areas_covered + c.navio_areas_uncovered, c.navio_areas_total);
        assert_eq!(
            c.production_areas_aligned + c.production_areas_orphaned,
            c.production_areas_total
        );
        // Zone 3 is inactive: not part of the coverage universe.
        assert_eq!(c.navio_areas_total, 2);
        assert_eq!(c.navio_areas_covered, 1);
        assert_eq!(c.production_areas_orphaned, 1);
    }

    #[test]
    fn freshness_tracks_both_directions() {
        let zones = vec![zone("1", true), zone("2", true)];
        let snapshot = vec![snap("1"), snap("5")];

        let report = audit(&zones, &snapshot, &[], &CoverageThresholds::default());

        assert_eq!(report.freshness.provider_total, 2);
        assert_eq!(report.freshness.snapshot_total, 2);
        assert_eq!(report.freshness.missing_from_snapshot, vec!["2".to_string()]);
        assert_eq!(report.freshness.removed_from_provider, vec!["5".to_string()]);
    }

    #[test]
    fn orphan_candidates_exclude_already_disabled_areas() {
        let mut disabled = area(1, "9", "Ghost");
        disabled.delivery_enabled = false;
        let production = vec![disabled, area(2, "8", "Stale")];

        let report = audit(&[], &[], &production, &CoverageThresholds::default());

        assert_eq!(report.counts.production_areas_orphaned, 2);
        // Only still-enabled areas are offered for deactivation.
        assert_eq!(report.orphan_candidates.len(), 1);
        assert_eq!(report.orphan_candidates[0].name, "Stale");
    }

    #[test]
    fn shared_polygons_are_grouped_and_deduplicated() {
        let mut a = area(1, "1", "Sentrum Vest");
        a.geofence = Some(fence_json(1.0));
        let mut b = area(2, "2", "Sentrum Øst");
        b.geofence = Some(fence_json(1.0));
        let mut c = area(3, "3", "Frogner");
        c.geofence = Some(fence_json(2.0));

        let report = audit(&[], &[], &[a, b, c], &CoverageThresholds::default());

        assert_eq!(report.polygons.unique_polygons, 2);
        assert_eq!(report.polygons.shared_groups.len(), 1);
        assert_eq!(
            report.polygons.shared_groups[0].area_names,
            vec!["Sentrum Vest".to_string(), "Sentrum Øst".to_string()]
        );
    }

    #[test]
    fn health_thresholds_are_configurable() {
        let zones: Vec<ProviderZone> = (0..10).map(|i| zone(&i.to_string(), true)).collect();

        let default_report = audit(&zones, &[], &[], &CoverageThresholds::default());
        assert_eq!(default_report.health, HealthStatus::Warning);

        let relaxed = CoverageThresholds {
            uncovered_warning: 50,
            uncovered_critical: 100,
            orphaned_warning: 50,
        };
        let relaxed_report = audit(&zones, &[], &[], &relaxed);
        assert_eq!(relaxed_report.health, HealthStatus::Healthy);

        let strict = CoverageThresholds {
            uncovered_warning: 1,
            uncovered_critical: 5,
            orphaned_warning: 1,
        };
        let strict_report = audit(&zones, &[], &[], &strict);
        assert_eq!(strict_report.health, HealthStatus::Critical);
    }
}
