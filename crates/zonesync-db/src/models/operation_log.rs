//! Append-only operation log for history/audit display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

/// Outcome of a logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for OperationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown operation status: {}", s)),
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OperationLogEntry {
    pub id: Uuid,
    pub operation_type: String,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub details: JsonValue,
}

impl OperationLogEntry {
    /// Get the status enum.
    #[must_use]
    pub fn status(&self) -> OperationStatus {
        self.status.parse().unwrap_or(OperationStatus::Running)
    }

    /// Append a running record.
    pub async fn start(
        pool: &PgPool,
        operation_type: &str,
        details: JsonValue,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO operation_log (operation_type, details)
            VALUES ($1, $2)
            RETURNING *
            ",
        )
        .bind(operation_type)
        .bind(details)
        .fetch_one(pool)
        .await
    }

    /// Close a record with its final status and detail blob.
    pub async fn finish(
        pool: &PgPool,
        id: Uuid,
        status: OperationStatus,
        details: JsonValue,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r"
            UPDATE operation_log
            SET status = $2, completed_at = NOW(), details = details || $3
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(status.to_string())
        .bind(details)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Most recent records, newest first.
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM operation_log ORDER BY started_at DESC LIMIT $1")
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
