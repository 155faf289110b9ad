//! Production area model - the live delivery areas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// A live delivery area.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductionArea {
    pub id: Uuid,
    pub external_key: String,
    pub district_id: Uuid,
    pub provider_zone_id: String,
    pub name: String,
    pub upstream_name: Option<String>,
    pub geofence: Option<JsonValue>,
    pub delivery_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a production area upsert.
#[derive(Debug, Clone)]
pub struct UpsertProductionArea {
    pub external_key: String,
    pub district_id: Uuid,
    pub provider_zone_id: String,
    pub name: String,
    pub upstream_name: Option<String>,
    pub geofence: Option<JsonValue>,
}

impl ProductionArea {
    /// Insert or update by external key.
    ///
    /// The external key is the provider zone id, so re-committing a city
    /// after a partial failure updates rows instead of duplicating them.
    pub async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        input: &UpsertProductionArea,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO production_areas (
                external_key, district_id, provider_zone_id, name,
                upstream_name, geofence
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (external_key) DO UPDATE SET
                district_id = EXCLUDED.district_id,
                name = EXCLUDED.name,
                upstream_name = EXCLUDED.upstream_name,
                geofence = EXCLUDED.geofence,
                updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(&input.external_key)
        .bind(input.district_id)
        .bind(&input.provider_zone_id)
        .bind(&input.name)
        .bind(&input.upstream_name)
        .bind(&input.geofence)
        .fetch_one(&mut **tx)
        .await
    }

    /// All production areas.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM production_areas ORDER BY name")
            .fetch_all(pool)
            .await
    }

    /// Areas of one district, ordered by name.
    pub async fn list_by_district(pool: &PgPool, district_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM production_areas WHERE district_id = $1 ORDER BY name")
            .bind(district_id)
            .fetch_all(pool)
            .await
    }

    /// Areas of one city (via its districts), ordered by name.
    pub async fn list_by_city(pool: &PgPool, city_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            SELECT a.* FROM production_areas a
            JOIN production_districts d ON d.id = a.district_id
            WHERE d.city_id = $1
            ORDER BY a.name
            ",
        )
        .bind(city_id)
        .fetch_all(pool)
        .await
    }

    /// Count by stable external key. Used by the idempotence checks.
    pub async fn count_by_external_key(
        pool: &PgPool,
        external_key: &str,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM production_areas WHERE external_key = $1")
                .bind(external_key)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }

    /// Refresh the geofence of one area by external key.
    ///
    /// Returns true when a row was updated.
    pub async fn update_geofence(
        pool: &PgPool,
        external_key: &str,
        geofence: &JsonValue,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE production_areas
            SET geofence = $2, updated_at = NOW()
            WHERE external_key = $1
            ",
        )
        .bind(external_key)
        .bind(geofence)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Disable delivery for a set of areas.
    ///
    /// Only ever called from the explicit, user-confirmed deactivation
    /// action; the coverage audit itself never mutates.
    pub async fn set_delivery_enabled(
        pool: &PgPool,
        area_ids: &[Uuid],
        enabled: bool,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE production_areas
            SET delivery_enabled = $2, updated_at = NOW()
            WHERE id = ANY($1)
            ",
        )
        .bind(area_ids)
        .bind(enabled)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
