//! Approval state machine over the staging tree.
//!
//! Transitions: `pending → approved → committed`; `pending|approved →
//! rejected` (terminal). A decision is planned as an explicit ordered
//! write-set over the city-id set and then applied statement by statement:
//! approve updates parent-before-child, reject deletes child-before-parent.
//! Every statement is scoped to the batch and re-appliable, so a crash
//! mid-cascade is repaired by re-running the same plan.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;
use zonesync_core::BatchId;
use zonesync_db::models::{StagingArea, StagingCity, StagingDistrict, StagingStatus};

use crate::error::{PipelineError, PipelineResult};

/// One idempotent cascade statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeWrite {
    /// Set the cities themselves to the target status.
    SetCities(StagingStatus),
    /// Set every district under the cities to the target status.
    SetDistrictsOfCities(StagingStatus),
    /// Set every area under the cities to the target status.
    SetAreasOfCities(StagingStatus),
    /// Delete every area under the cities.
    DeleteAreasOfCities,
    /// Delete every district under the cities.
    DeleteDistrictsOfCities,
    /// Delete the cities themselves.
    DeleteCities,
}

/// An ordered write-set for one decision over one set of cities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadePlan {
    pub batch_id: BatchId,
    pub city_ids: Vec<Uuid>,
    pub writes: Vec<CascadeWrite>,
}

impl CascadePlan {
    /// Plan an approve cascade: parent rows first, then children.
    #[must_use]
    pub fn approve(batch_id: BatchId, city_ids: Vec<Uuid>) -> Self {
        Self {
            batch_id,
            city_ids,
            writes: vec![
                CascadeWrite::SetCities(StagingStatus::Approved),
                CascadeWrite::SetDistrictsOfCities(StagingStatus::Approved),
                CascadeWrite::SetAreasOfCities(StagingStatus::Approved),
            ],
        }
    }

    /// Plan a reject cascade: child rows first, then parents, respecting
    /// referential integrity.
    #[must_use]
    pub fn reject(batch_id: BatchId, city_ids: Vec<Uuid>) -> Self {
        Self {
            batch_id,
            city_ids,
            writes: vec![
                CascadeWrite::DeleteAreasOfCities,
                CascadeWrite::DeleteDistrictsOfCities,
                CascadeWrite::DeleteCities,
            ],
        }
    }

    /// Plan marking a committed subtree: same ordering as approve.
    #[must_use]
    pub fn mark_committed(batch_id: BatchId, city_ids: Vec<Uuid>) -> Self {
        Self {
            batch_id,
            city_ids,
            writes: vec![
                CascadeWrite::SetCities(StagingStatus::Committed),
                CascadeWrite::SetDistrictsOfCities(StagingStatus::Committed),
                CascadeWrite::SetAreasOfCities(StagingStatus::Committed),
            ],
        }
    }

    /// Apply the plan in order. Returns rows affected per write.
    ///
    /// Not one atomic transaction by design: each statement is individually
    /// idempotent, and re-applying the full plan after a crash converges to
    /// the same final tree.
    pub async fn apply(&self, pool: &PgPool) -> PipelineResult<Vec<u64>> {
        let batch = *self.batch_id.as_uuid();
        let mut affected = Vec::with_capacity(self.writes.len());
        for write in &self.writes {
            let rows = match write {
                CascadeWrite::SetCities(status) => {
                    StagingCity::set_status_many(pool, batch, &self.city_ids, *status).await?
                }
                CascadeWrite::SetDistrictsOfCities(status) => {
                    StagingDistrict::set_status_by_cities(pool, batch, &self.city_ids, *status)
                        .await?
                }
                CascadeWrite::SetAreasOfCities(status) => {
                    StagingArea::set_status_by_cities(pool, batch, &self.city_ids, *status).await?
                }
                CascadeWrite::DeleteAreasOfCities => {
                    StagingArea::delete_by_cities(pool, batch, &self.city_ids).await?
                }
                CascadeWrite::DeleteDistrictsOfCities => {
                    StagingDistrict::delete_by_cities(pool, batch, &self.city_ids).await?
                }
                CascadeWrite::DeleteCities => {
                    StagingCity::delete_many(pool, batch, &self.city_ids).await?
                }
            };
            affected.push(rows);
        }
        Ok(affected)
    }
}

/// Drives approval decisions for a batch.
pub struct ApprovalMachine {
    pool: PgPool,
}

impl ApprovalMachine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Approve a set of cities and cascade to all descendants.
    ///
    /// Refuses while any descendant area is `needs_mapping`; those must be
    /// resolved by a human first. Re-approving an already approved city is a
    /// no-op.
    #[instrument(skip(self))]
    pub async fn approve(&self, batch_id: BatchId, city_ids: &[Uuid]) -> PipelineResult<Vec<u64>> {
        self.ensure_cities_exist(batch_id, city_ids).await?;

        let blocked = StagingArea::count_needs_mapping_by_cities(
            &self.pool,
            *batch_id.as_uuid(),
            city_ids,
        )
        .await?;
        if blocked > 0 {
            return Err(PipelineError::validation(format!(
                "{blocked} areas still need manual name mapping before approval"
            )));
        }

        for id in city_ids {
            let city = StagingCity::find(&self.pool, *id).await?.ok_or_else(|| {
                PipelineError::not_found("StagingCity", id)
            })?;
            match city.status() {
                StagingStatus::Pending | StagingStatus::Approved => {}
                other => {
                    return Err(PipelineError::validation(format!(
                        "city '{}' cannot be approved from status {other}",
                        city.name
                    )))
                }
            }
        }

        let plan = CascadePlan::approve(batch_id, city_ids.to_vec());
        let affected = plan.apply(&self.pool).await?;
        info!(batch_id = %batch_id, cities = city_ids.len(), "Approved staging cities");
        Ok(affected)
    }

    /// Reject a set of cities: delete the whole subtree, leaving no orphans.
    #[instrument(skip(self))]
    pub async fn reject(&self, batch_id: BatchId, city_ids: &[Uuid]) -> PipelineResult<Vec<u64>> {
        self.ensure_cities_exist(batch_id, city_ids).await?;

        for id in city_ids {
            let city = StagingCity::find(&self.pool, *id).await?.ok_or_else(|| {
                PipelineError::not_found("StagingCity", id)
            })?;
            if city.status() == StagingStatus::Committed {
                return Err(PipelineError::validation(format!(
                    "city '{}' is already committed and cannot be rejected",
                    city.name
                )));
            }
        }

        let plan = CascadePlan::reject(batch_id, city_ids.to_vec());
        let affected = plan.apply(&self.pool).await?;
        info!(batch_id = %batch_id, cities = city_ids.len(), "Rejected staging cities");
        Ok(affected)
    }

    async fn ensure_cities_exist(
        &self,
        batch_id: BatchId,
        city_ids: &[Uuid],
    ) -> PipelineResult<()> {
        if city_ids.is_empty() {
            return Err(PipelineError::validation("no city ids given"));
        }
        let known = StagingCity::list_by_batch(&self.pool, *batch_id.as_uuid()).await?;
        for id in city_ids {
            if !known.iter().any(|c| c.id == *id) {
                return Err(PipelineError::not_found("StagingCity", id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approve_plan_orders_parent_before_child() {
        let plan = CascadePlan::approve(BatchId::new(), vec![Uuid::new_v4()]);
        assert_eq!(
            plan.writes,
            vec![
                CascadeWrite::SetCities(StagingStatus::Approved),
                CascadeWrite::SetDistrictsOfCities(StagingStatus::Approved),
                CascadeWrite::SetAreasOfCities(StagingStatus::Approved),
            ]
        );
    }

    #[test]
    fn reject_plan_orders_child_before_parent() {
        let plan = CascadePlan::reject(BatchId::new(), vec![Uuid::new_v4()]);
        assert_eq!(
            plan.writes,
            vec![
                CascadeWrite::DeleteAreasOfCities,
                CascadeWrite::DeleteDistrictsOfCities,
                CascadeWrite::DeleteCities,
            ]
        );
    }

    #[test]
    fn replanning_the_same_decision_is_identical() {
        // Re-application after a crash relies on the plan being a pure
        // function of (batch, cities, decision).
        let batch = BatchId::new();
        let cities = vec![Uuid::new_v4(), Uuid::new_v4()];
        assert_eq!(
            CascadePlan::approve(batch, cities.clone()),
            CascadePlan::approve(batch, cities)
        );
    }
}
