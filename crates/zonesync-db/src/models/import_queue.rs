//! Import queue model - per-city progress tracking for a batch.
//!
//! The queue is the persisted cursor of the staging pipeline: every step
//! claims exactly one city, persists partial results against it, and an
//! interruption loses at most the in-flight unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

/// Processing state of one queued city.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Not yet started.
    #[default]
    Pending,
    /// Claimed by the current step. At most one per batch.
    Processing,
    /// All zones of the city are staged.
    Completed,
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Unknown queue status: {}", s)),
        }
    }
}

/// One city's processing progress within a batch.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportQueueEntry {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub city_name: String,
    pub status: String,
    pub districts_found: i32,
    pub areas_found: i32,
    /// Number of cached zones already staged; the resume cursor.
    pub processed_count: i32,
    pub total_zones: i32,
    /// Cached raw provider zones assigned to this city.
    pub raw_zones: JsonValue,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for one queue row.
#[derive(Debug, Clone)]
pub struct CreateImportQueueEntry {
    pub batch_id: Uuid,
    pub city_name: String,
    pub total_zones: i32,
    pub raw_zones: JsonValue,
}

impl ImportQueueEntry {
    /// Get the status enum.
    #[must_use]
    pub fn status(&self) -> QueueStatus {
        self.status.parse().unwrap_or_default()
    }

    /// Create a queue row.
    pub async fn create(pool: &PgPool, input: &CreateImportQueueEntry) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO import_queue (batch_id, city_name, total_zones, raw_zones)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            ",
        )
        .bind(input.batch_id)
        .bind(&input.city_name)
        .bind(input.total_zones)
        .bind(&input.raw_zones)
        .fetch_one(pool)
        .await
    }

    /// The city currently claimed by a step, if any.
    pub async fn find_processing(pool: &PgPool, batch_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM import_queue WHERE batch_id = $1 AND status = 'processing'")
            .bind(batch_id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically claim the next pending city.
    ///
    /// The partial unique index on `(batch_id) WHERE status = 'processing'`
    /// plus the `NOT EXISTS` guard make this safe against double claims:
    /// either this statement claims one row or it claims nothing.
    pub async fn claim_next(pool: &PgPool, batch_id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            r"
            UPDATE import_queue
            SET status = 'processing', started_at = NOW(), updated_at = NOW()
            WHERE id = (
                SELECT id FROM import_queue
                WHERE batch_id = $1 AND status = 'pending'
                ORDER BY city_name
                LIMIT 1
            )
            AND NOT EXISTS (
                SELECT 1 FROM import_queue
                WHERE batch_id = $1 AND status = 'processing'
            )
            RETURNING *
            ",
        )
        .bind(batch_id)
        .fetch_optional(pool)
        .await
    }

    /// Persist partial progress for the in-flight city.
    pub async fn update_progress(
        pool: &PgPool,
        id: Uuid,
        districts_found: i32,
        areas_found: i32,
        processed_count: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE import_queue
            SET districts_found = $2, areas_found = $3, processed_count = $4,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(districts_found)
        .bind(areas_found)
        .bind(processed_count)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Mark the in-flight city completed.
    pub async fn mark_completed(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE import_queue
            SET status = 'completed', completed_at = NOW(), updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// All queue rows of a batch, ordered by city name.
    pub async fn list_by_batch(pool: &PgPool, batch_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM import_queue WHERE batch_id = $1 ORDER BY city_name")
            .bind(batch_id)
            .fetch_all(pool)
            .await
    }

    /// Count rows of a batch not yet completed.
    pub async fn count_unfinished(pool: &PgPool, batch_id: Uuid) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM import_queue WHERE batch_id = $1 AND status <> 'completed'",
        )
        .bind(batch_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// The most recently created batch id with queue rows, if any.
    ///
    /// Lets a restarted client rediscover a resumable batch.
    pub async fn latest_batch(pool: &PgPool) -> Result<Option<Uuid>, sqlx::Error> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT batch_id FROM import_queue ORDER BY created_at DESC LIMIT 1",
        )
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| r.0))
    }

    /// Delete every queue row of a batch ("start fresh").
    pub async fn delete_batch(pool: &PgPool, batch_id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM import_queue WHERE batch_id = $1")
            .bind(batch_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_status_round_trip() {
        for status in [QueueStatus::Pending, QueueStatus::Processing, QueueStatus::Completed] {
            let parsed: QueueStatus = status.to_string().parse().unwrap();
            assert_eq!(status, parsed);
        }
    }
}
