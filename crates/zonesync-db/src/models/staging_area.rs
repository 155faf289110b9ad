//! Staging area model - the leaf level of the review tree.
//!
//! Each area points back at exactly one provider zone; that id is unique
//! within a batch and becomes the production external key at commit time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use super::staging_status::StagingStatus;

/// A proposed delivery area within a staging district.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StagingArea {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub district_id: Uuid,
    pub provider_zone_id: String,
    pub proposed_name: String,
    pub upstream_name: String,
    pub status: String,
    pub geofence: Option<JsonValue>,
    pub confidence: Option<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a staging area row.
#[derive(Debug, Clone)]
pub struct CreateStagingArea {
    pub batch_id: Uuid,
    pub district_id: Uuid,
    pub provider_zone_id: String,
    pub proposed_name: String,
    pub upstream_name: String,
    pub status: StagingStatus,
    pub geofence: Option<JsonValue>,
    pub confidence: Option<f32>,
}

impl StagingArea {
    /// Get the status enum.
    #[must_use]
    pub fn status(&self) -> StagingStatus {
        self.status.parse().unwrap_or_default()
    }

    /// Create a staging area, or refresh the existing row for this provider
    /// zone. Re-running an interrupted processing step must not duplicate
    /// areas.
    pub async fn upsert(pool: &PgPool, input: &CreateStagingArea) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO staging_areas (
                batch_id, district_id, provider_zone_id, proposed_name,
                upstream_name, status, geofence, confidence
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (batch_id, provider_zone_id) DO UPDATE SET
                district_id = EXCLUDED.district_id,
                proposed_name = EXCLUDED.proposed_name,
                status = EXCLUDED.status,
                geofence = EXCLUDED.geofence,
                confidence = EXCLUDED.confidence,
                updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(input.batch_id)
        .bind(input.district_id)
        .bind(&input.provider_zone_id)
        .bind(&input.proposed_name)
        .bind(&input.upstream_name)
        .bind(input.status.to_string())
        .bind(&input.geofence)
        .bind(input.confidence)
        .fetch_one(pool)
        .await
    }

    /// Areas of one district, ordered by proposed name.
    pub async fn list_by_district(pool: &PgPool, district_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM staging_areas WHERE district_id = $1 ORDER BY proposed_name")
            .bind(district_id)
            .fetch_all(pool)
            .await
    }

    /// All areas of a batch.
    pub async fn list_by_batch(pool: &PgPool, batch_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM staging_areas WHERE batch_id = $1 ORDER BY proposed_name")
            .bind(batch_id)
            .fetch_all(pool)
            .await
    }

    /// Count staged areas for the zones of one city of the batch.
    pub async fn count_by_city(
        pool: &PgPool,
        batch_id: Uuid,
        city_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM staging_areas a
            JOIN staging_districts d ON d.id = a.district_id
            WHERE a.batch_id = $1 AND d.city_id = $2
            ",
        )
        .bind(batch_id)
        .bind(city_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Count areas under the given cities that block approval.
    pub async fn count_needs_mapping_by_cities(
        pool: &PgPool,
        batch_id: Uuid,
        city_ids: &[Uuid],
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            r"
            SELECT COUNT(*) FROM staging_areas a
            JOIN staging_districts d ON d.id = a.district_id
            WHERE a.batch_id = $1 AND d.city_id = ANY($2) AND a.status = 'needs_mapping'
            ",
        )
        .bind(batch_id)
        .bind(city_ids)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Set the status of every area under the given cities in one statement.
    pub async fn set_status_by_cities(
        pool: &PgPool,
        batch_id: Uuid,
        city_ids: &[Uuid],
        status: StagingStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE staging_areas
            SET status = $3, updated_at = NOW()
            WHERE batch_id = $1
              AND district_id IN (
                  SELECT id FROM staging_districts
                  WHERE batch_id = $1 AND city_id = ANY($2)
              )
            ",
        )
        .bind(batch_id)
        .bind(city_ids)
        .bind(status.to_string())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete every area under the given cities in one statement.
    pub async fn delete_by_cities(
        pool: &PgPool,
        batch_id: Uuid,
        city_ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            DELETE FROM staging_areas
            WHERE batch_id = $1
              AND district_id IN (
                  SELECT id FROM staging_districts
                  WHERE batch_id = $1 AND city_id = ANY($2)
              )
            ",
        )
        .bind(batch_id)
        .bind(city_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Resolve a `needs_mapping` area with a human-provided name.
    pub async fn resolve_mapping(
        pool: &PgPool,
        id: Uuid,
        proposed_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE staging_areas
            SET proposed_name = $2, status = 'pending', updated_at = NOW()
            WHERE id = $1 AND status = 'needs_mapping'
            RETURNING *
            ",
        )
        .bind(id)
        .bind(proposed_name)
        .fetch_optional(pool)
        .await
    }
}
