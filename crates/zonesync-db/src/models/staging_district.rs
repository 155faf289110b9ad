//! Staging district model - the middle level of the review tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::staging_status::StagingStatus;

/// A proposed district within a staging city.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StagingDistrict {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub city_id: Uuid,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a staging district row.
#[derive(Debug, Clone)]
pub struct CreateStagingDistrict {
    pub batch_id: Uuid,
    pub city_id: Uuid,
    pub name: String,
}

impl StagingDistrict {
    /// Get the status enum.
    #[must_use]
    pub fn status(&self) -> StagingStatus {
        self.status.parse().unwrap_or_default()
    }

    /// Create a staging district, or return the existing row for this
    /// city/name pair. Re-running an interrupted processing step must not
    /// duplicate districts.
    pub async fn upsert(pool: &PgPool, input: &CreateStagingDistrict) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO staging_districts (batch_id, city_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (city_id, name) DO UPDATE SET updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(input.batch_id)
        .bind(input.city_id)
        .bind(&input.name)
        .fetch_one(pool)
        .await
    }

    /// Districts of one city, ordered by name.
    pub async fn list_by_city(pool: &PgPool, city_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM staging_districts WHERE city_id = $1 ORDER BY name")
            .bind(city_id)
            .fetch_all(pool)
            .await
    }

    /// Set the status of every district under the given cities in one
    /// statement.
    pub async fn set_status_by_cities(
        pool: &PgPool,
        batch_id: Uuid,
        city_ids: &[Uuid],
        status: StagingStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE staging_districts
            SET status = $3, updated_at = NOW()
            WHERE batch_id = $1 AND city_id = ANY($2)
            ",
        )
        .bind(batch_id)
        .bind(city_ids)
        .bind(status.to_string())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete every district under the given cities. Areas must be gone first.
    pub async fn delete_by_cities(
        pool: &PgPool,
        batch_id: Uuid,
        city_ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM staging_districts WHERE batch_id = $1 AND city_id = ANY($2)")
                .bind(batch_id)
                .bind(city_ids)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
