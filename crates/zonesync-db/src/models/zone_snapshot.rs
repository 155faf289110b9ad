//! Snapshot of the provider's zone set, used as the delta baseline.
//!
//! The snapshot is replaced wholesale inside one transaction after a
//! successful import cycle; it is never patched row by row mid-cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// One mirrored provider zone.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ZoneSnapshotRecord {
    pub id: Uuid,
    pub provider_zone_id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub city_name: Option<String>,
    pub country_code: Option<String>,
    pub geofence: Option<JsonValue>,
    pub is_active: bool,
    pub captured_at: DateTime<Utc>,
}

/// Input for one snapshot row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSnapshotRecord {
    pub provider_zone_id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub city_name: Option<String>,
    pub country_code: Option<String>,
    pub geofence: Option<JsonValue>,
    pub is_active: bool,
}

impl ZoneSnapshotRecord {
    /// All snapshot rows.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM zone_snapshot ORDER BY provider_zone_id")
            .fetch_all(pool)
            .await
    }

    /// Replace the whole snapshot with the given rows in one transaction.
    pub async fn replace_all(
        pool: &PgPool,
        records: &[CreateSnapshotRecord],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM zone_snapshot")
            .execute(&mut *tx)
            .await?;

        let mut inserted = 0u64;
        for record in records {
            sqlx::query(
                r"
                INSERT INTO zone_snapshot (
                    provider_zone_id, name, display_name, city_name,
                    country_code, geofence, is_active, captured_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
                ",
            )
            .bind(&record.provider_zone_id)
            .bind(&record.name)
            .bind(&record.display_name)
            .bind(&record.city_name)
            .bind(&record.country_code)
            .bind(&record.geofence)
            .bind(record.is_active)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;

        tracing::info!(rows = inserted, "Replaced zone snapshot");
        Ok(inserted)
    }
}
