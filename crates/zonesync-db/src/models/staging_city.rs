//! Staging city model - the root level of the review tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::staging_status::StagingStatus;

/// A proposed city within one import batch.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StagingCity {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub name: String,
    pub country_code: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a staging city row.
#[derive(Debug, Clone)]
pub struct CreateStagingCity {
    pub batch_id: Uuid,
    pub name: String,
    pub country_code: Option<String>,
}

impl StagingCity {
    /// Get the status enum.
    #[must_use]
    pub fn status(&self) -> StagingStatus {
        self.status.parse().unwrap_or_default()
    }

    /// Create a staging city.
    pub async fn create(pool: &PgPool, input: &CreateStagingCity) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO staging_cities (batch_id, name, country_code)
            VALUES ($1, $2, $3)
            RETURNING *
            ",
        )
        .bind(input.batch_id)
        .bind(&input.name)
        .bind(&input.country_code)
        .fetch_one(pool)
        .await
    }

    /// Find by id.
    pub async fn find(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM staging_cities WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find by batch and name.
    pub async fn find_by_name(
        pool: &PgPool,
        batch_id: Uuid,
        name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM staging_cities WHERE batch_id = $1 AND name = $2")
            .bind(batch_id)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// All cities of a batch, ordered by name.
    pub async fn list_by_batch(pool: &PgPool, batch_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM staging_cities WHERE batch_id = $1 ORDER BY name")
            .bind(batch_id)
            .fetch_all(pool)
            .await
    }

    /// Cities of a batch in a given status, ordered by name.
    pub async fn list_by_status(
        pool: &PgPool,
        batch_id: Uuid,
        status: StagingStatus,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT * FROM staging_cities WHERE batch_id = $1 AND status = $2 ORDER BY name",
        )
        .bind(batch_id)
        .bind(status.to_string())
        .fetch_all(pool)
        .await
    }

    /// Count cities of a batch in a given status.
    pub async fn count_by_status(
        pool: &PgPool,
        batch_id: Uuid,
        status: StagingStatus,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM staging_cities WHERE batch_id = $1 AND status = $2",
        )
        .bind(batch_id)
        .bind(status.to_string())
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Set the status of a set of cities in one statement.
    ///
    /// Scoped to the batch; re-applying the same update is a no-op.
    pub async fn set_status_many(
        pool: &PgPool,
        batch_id: Uuid,
        city_ids: &[Uuid],
        status: StagingStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r"
            UPDATE staging_cities
            SET status = $3, updated_at = NOW()
            WHERE batch_id = $1 AND id = ANY($2)
            ",
        )
        .bind(batch_id)
        .bind(city_ids)
        .bind(status.to_string())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete a set of cities. Callers must have deleted descendants first.
    pub async fn delete_many(
        pool: &PgPool,
        batch_id: Uuid,
        city_ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM staging_cities WHERE batch_id = $1 AND id = ANY($2)")
            .bind(batch_id)
            .bind(city_ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every staging row of a batch (cities cascade to descendants).
    ///
    /// Used by "start fresh" to discard a cached batch.
    pub async fn delete_batch(pool: &PgPool, batch_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM staging_cities WHERE batch_id = $1")
            .bind(batch_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
