//! Production city model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// A live city in the delivery hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductionCity {
    pub id: Uuid,
    pub external_key: String,
    pub name: String,
    pub country_code: Option<String>,
    pub delivery_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a production city upsert.
#[derive(Debug, Clone)]
pub struct UpsertProductionCity {
    pub external_key: String,
    pub name: String,
    pub country_code: Option<String>,
}

impl ProductionCity {
    /// Insert or update by external key.
    pub async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        input: &UpsertProductionCity,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO production_cities (external_key, name, country_code)
            VALUES ($1, $2, $3)
            ON CONFLICT (external_key) DO UPDATE SET
                name = EXCLUDED.name,
                country_code = EXCLUDED.country_code,
                updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(&input.external_key)
        .bind(&input.name)
        .bind(&input.country_code)
        .fetch_one(&mut **tx)
        .await
    }

    /// All production cities, ordered by name.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM production_cities ORDER BY name")
            .fetch_all(pool)
            .await
    }
}
