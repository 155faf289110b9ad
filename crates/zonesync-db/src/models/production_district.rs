//! Production district model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// A live district in the delivery hierarchy.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProductionDistrict {
    pub id: Uuid,
    pub external_key: String,
    pub city_id: Uuid,
    pub name: String,
    pub delivery_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a production district upsert.
#[derive(Debug, Clone)]
pub struct UpsertProductionDistrict {
    pub external_key: String,
    pub city_id: Uuid,
    pub name: String,
}

impl ProductionDistrict {
    /// Insert or update by external key.
    pub async fn upsert(
        tx: &mut Transaction<'_, Postgres>,
        input: &UpsertProductionDistrict,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO production_districts (external_key, city_id, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (external_key) DO UPDATE SET
                city_id = EXCLUDED.city_id,
                name = EXCLUDED.name,
                updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(&input.external_key)
        .bind(input.city_id)
        .bind(&input.name)
        .fetch_one(&mut **tx)
        .await
    }

    /// Districts of one city, ordered by name.
    pub async fn list_by_city(pool: &PgPool, city_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM production_districts WHERE city_id = $1 ORDER BY name")
            .bind(city_id)
            .fetch_all(pool)
            .await
    }
}
