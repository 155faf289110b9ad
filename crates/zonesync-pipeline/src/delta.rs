//! Delta engine: classify every zone as new / removed / changed / unchanged.
//!
//! Pure diff of the live provider list against the snapshot, keyed by
//! provider id. Read-only; any failure aborts without touching state.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::collections::HashMap;
use zonesync_core::{Geofence, LngLat};
use zonesync_db::models::ZoneSnapshotRecord;
use zonesync_navio::ProviderZone;

use crate::error::PipelineResult;

/// Snapshot row view used by the diff. Decoupled from the table model so the
/// diff can be exercised without a database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotZone {
    pub provider_zone_id: String,
    pub name: String,
    pub city_name: Option<String>,
    pub geofence: Option<serde_json::Value>,
}

impl From<&ZoneSnapshotRecord> for SnapshotZone {
    fn from(record: &ZoneSnapshotRecord) -> Self {
        Self {
            provider_zone_id: record.provider_zone_id.clone(),
            name: record.name.clone(),
            city_name: record.city_name.clone(),
            geofence: record.geofence.clone(),
        }
    }
}

/// Per-bucket counts.
///
/// `new + removed + changed + unchanged` partitions the id union of live and
/// snapshot zones. `geofence_changed` is a qualifier on `changed`, not a
/// fifth bucket: a zone that is renamed and reshaped counts once in
/// `changed` and also increments `geofence_changed`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub new: u32,
    pub removed: u32,
    pub changed: u32,
    pub geofence_changed: u32,
    pub unchanged: u32,
}

/// A zone present in both sets with differing content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangedZone {
    pub zone: ProviderZone,
    pub previous_name: String,
    pub renamed: bool,
    pub geofence_changed: bool,
}

/// A zone that disappeared from (or went inactive in) the live list.
///
/// Removal is a deactivation candidate for the operator, never a hard delete
/// performed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedZone {
    pub provider_zone_id: String,
    pub name: String,
    pub city_name: Option<String>,
}

/// Full delta report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaReport {
    pub has_changes: bool,
    pub summary: DeltaSummary,
    /// Distinct city names touched by new/removed/changed zones; lets the
    /// next import skip untouched cities entirely.
    pub affected_cities: Vec<String>,
    pub new_areas: Vec<ProviderZone>,
    pub removed_areas: Vec<RemovedZone>,
    pub changed_areas: Vec<ChangedZone>,
    pub is_first_import: bool,
}

/// Structural geofence comparison between a live zone and a snapshot row.
///
/// An unparseable stored geofence counts as differing: the snapshot cannot
/// vouch for it, so the zone is resurfaced as changed.
fn geofence_differs(live: &Option<Geofence<LngLat>>, stored: &Option<serde_json::Value>) -> bool {
    let stored = match stored {
        None => return live.is_some(),
        Some(value) => match Geofence::<LngLat>::from_json(value) {
            Ok(fence) => Some(fence),
            Err(_) => return true,
        },
    };
    live != &stored
}

/// Diff the live zone list against the snapshot.
#[must_use]
pub fn compute_delta(current: &[ProviderZone], snapshot: &[SnapshotZone]) -> DeltaReport {
    let is_first_import = snapshot.is_empty();

    let snapshot_by_id: HashMap<&str, &SnapshotZone> = snapshot
        .iter()
        .map(|z| (z.provider_zone_id.as_str(), z))
        .collect();
    let current_by_id: HashMap<&str, &ProviderZone> =
        current.iter().map(|z| (z.id.as_str(), z)).collect();

    let mut summary = DeltaSummary::default();
    let mut new_areas = Vec::new();
    let mut removed_areas = Vec::new();
    let mut changed_areas = Vec::new();
    let mut affected_cities = BTreeSet::new();

    for zone in current {
        match snapshot_by_id.get(zone.id.as_str()) {
            None => {
                summary.new += 1;
                if let Some(city) = &zone.city_hint {
                    affected_cities.insert(city.clone());
                }
                new_areas.push(zone.clone());
            }
            Some(prev) if !zone.is_active => {
                // Still listed upstream but switched off: deactivation
                // candidate, classified as removed.
                summary.removed += 1;
                if let Some(city) = &prev.city_name {
                    affected_cities.insert(city.clone());
                }
                removed_areas.push(RemovedZone {
                    provider_zone_id: zone.id.as_str().to_string(),
                    name: prev.name.clone(),
                    city_name: prev.city_name.clone(),
                });
            }
            Some(prev) => {
                let renamed = zone.name != prev.name;
                let reshaped = geofence_differs(&zone.geofence, &prev.geofence);
                if renamed || reshaped {
                    summary.changed += 1;
                    if reshaped {
                        summary.geofence_changed += 1;
                    }
                    if let Some(city) = &zone.city_hint {
                        affected_cities.insert(city.clone());
                    }
                    changed_areas.push(ChangedZone {
                        zone: zone.clone(),
                        previous_name: prev.name.clone(),
                        renamed,
                        geofence_changed: reshaped,
                    });
                } else {
                    summary.unchanged += 1;
                }
            }
        }
    }

    for prev in snapshot {
        if !current_by_id.contains_key(prev.provider_zone_id.as_str()) {
            summary.removed += 1;
            if let Some(city) = &prev.city_name {
                affected_cities.insert(city.clone());
            }
            removed_areas.push(RemovedZone {
                provider_zone_id: prev.provider_zone_id.clone(),
                name: prev.name.clone(),
                city_name: prev.city_name.clone(),
            });
        }
    }

    let has_changes = summary.new + summary.removed + summary.changed > 0;

    DeltaReport {
        has_changes,
        summary,
        affected_cities: affected_cities.into_iter().collect(),
        new_areas,
        removed_areas,
        changed_areas,
        is_first_import,
    }
}

/// Delta check against the persisted snapshot.
pub async fn check(pool: &PgPool, live_zones: &[ProviderZone]) -> PipelineResult<DeltaReport> {
    let records = ZoneSnapshotRecord::list_all(pool).await?;
    let snapshot: Vec<SnapshotZone> = records.iter().map(SnapshotZone::from).collect();
    Ok(compute_delta(live_zones, &snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zonesync_core::ProviderZoneId;

    fn zone(id: &str, name: &str, city: &str) -> ProviderZone {
        ProviderZone {
            id: ProviderZoneId::new(id),
            name: name.to_string(),
            display_name: None,
            is_active: true,
            geofence: None,
            postal_codes: vec![],
            city_hint: Some(city.to_string()),
            country_code: Some("NO".to_string()),
        }
    }

    fn snap(id: &str, name: &str, city: &str) -> SnapshotZone {
        SnapshotZone {
            provider_zone_id: id.to_string(),
            name: name.to_string(),
            city_name: Some(city.to_string()),
            geofence: None,
        }
    }

    fn fence(offset: f64) -> Geofence<LngLat> {
        Geofence::polygon(vec![vec![
            [offset, offset],
            [offset + 1.0, offset],
            [offset, offset + 1.0],
            [offset, offset],
        ]])
    }

    #[test]
    fn empty_snapshot_is_first_import() {
        let report = compute_delta(&[zone("1", "Sentrum", "Oslo")], &[]);
        assert!(report.is_first_import);
        assert!(report.has_changes);
        assert_eq!(report.summary.new, 1);
        assert_eq!(report.new_areas.len(), 1);
    }

    #[test]
    fn scenario_one_new_one_unchanged() {
        // snapshot = [{id:1, "Oslo Sentrum"}]; live adds id 2 in Grünerløkka.
        let live = vec![
            zone("1", "Oslo Sentrum", "Oslo"),
            zone("2", "Grünerløkka", "Oslo"),
        ];
        let snapshot = vec![snap("1", "Oslo Sentrum", "Oslo")];

        let report = compute_delta(&live, &snapshot);

        assert!(report.has_changes);
        assert!(!report.is_first_import);
        assert_eq!(report.summary.new, 1);
        assert_eq!(report.summary.unchanged, 1);
        assert!(report.affected_cities.contains(&"Oslo".to_string()));
    }

    #[test]
    fn missing_and_inactive_zones_are_removed() {
        let mut inactive = zone("2", "Gamle Oslo", "Oslo");
        inactive.is_active = false;

        let live = vec![zone("1", "Sentrum", "Oslo"), inactive];
        let snapshot = vec![
            snap("1", "Sentrum", "Oslo"),
            snap("2", "Gamle Oslo", "Oslo"),
            snap("3", "Frogner", "Oslo"),
        ];

        let report = compute_delta(&live, &snapshot);

        assert_eq!(report.summary.removed, 2);
        assert_eq!(report.summary.unchanged, 1);
        let removed_ids: Vec<&str> = report
            .removed_areas
            .iter()
            .map(|r| r.provider_zone_id.as_str())
            .collect();
        assert_eq!(removed_ids, vec!["2", "3"]);
    }

    #[test]
    fn rename_counts_as_changed_without_geofence_change() {
        let live = vec![zone("1", "Sentrum Øst", "Oslo")];
        let snapshot = vec![snap("1", "Sentrum", "Oslo")];

        let report = compute_delta(&live, &snapshot);

        assert_eq!(report.summary.changed, 1);
        assert_eq!(report.summary.geofence_changed, 0);
        assert!(report.changed_areas[0].renamed);
        assert_eq!(report.changed_areas[0].previous_name, "Sentrum");
    }

    #[test]
    fn reshape_increments_both_changed_and_geofence_changed() {
        let mut live_zone = zone("1", "Sentrum", "Oslo");
        live_zone.geofence = Some(fence(1.0));
        let mut stored = snap("1", "Sentrum", "Oslo");
        stored.geofence = Some(fence(2.0).to_json().unwrap());

        let report = compute_delta(&[live_zone], &[stored]);

        assert_eq!(report.summary.changed, 1);
        assert_eq!(report.summary.geofence_changed, 1);
        assert!(report.changed_areas[0].geofence_changed);
        assert!(!report.changed_areas[0].renamed);
    }

    #[test]
    fn rename_plus_reshape_counts_once_in_changed() {
        let mut live_zone = zone("1", "Sentrum Øst", "Oslo");
        live_zone.geofence = Some(fence(1.0));
        let mut stored = snap("1", "Sentrum", "Oslo");
        stored.geofence = Some(fence(2.0).to_json().unwrap());

        let report = compute_delta(&[live_zone], &[stored]);

        assert_eq!(report.summary.changed, 1);
        assert_eq!(report.summary.geofence_changed, 1);
        let change = &report.changed_areas[0];
        assert!(change.renamed && change.geofence_changed);
    }

    #[test]
    fn identical_geofences_are_unchanged() {
        let mut live_zone = zone("1", "Sentrum", "Oslo");
        live_zone.geofence = Some(fence(1.0));
        let mut stored = snap("1", "Sentrum", "Oslo");
        stored.geofence = Some(fence(1.0).to_json().unwrap());

        let report = compute_delta(&[live_zone], &[stored]);

        assert_eq!(report.summary.unchanged, 1);
        assert!(!report.has_changes);
    }

    #[test]
    fn every_id_lands_in_exactly_one_bucket() {
        // Union of live and snapshot ids must be fully accounted for.
        let mut inactive = zone("4", "Nordnes", "Bergen");
        inactive.is_active = false;
        let live = vec![
            zone("1", "Sentrum", "Oslo"),
            zone("2", "Grünerløkka", "Oslo"),
            zone("3", "Renamed", "Bergen"),
            inactive,
        ];
        let snapshot = vec![
            snap("1", "Sentrum", "Oslo"),
            snap("3", "Original", "Bergen"),
            snap("4", "Nordnes", "Bergen"),
            snap("5", "Gone", "Bergen"),
        ];

        let report = compute_delta(&live, &snapshot);
        let s = &report.summary;

        // ids: 1 unchanged, 2 new, 3 changed, 4 removed (inactive), 5 removed.
        assert_eq!(s.new, 1);
        assert_eq!(s.changed, 1);
        assert_eq!(s.removed, 2);
        assert_eq!(s.unchanged, 1);
        assert_eq!(s.new + s.removed + s.changed + s.unchanged, 5);
    }
}
