pub mod models;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};

use self::models::StoredReading;
use crate::metrics::AugmentedReading;

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn insert_reading(
    pool: &PgPool,
    input: &AugmentedReading,
) -> Result<StoredReading, sqlx::Error> {
    let r = &input.reading;
    sqlx::query_as::<_, StoredReading>(
        r#"
        INSERT INTO sensor_readings
            (community_id, voltage, current, power, temperature, ldr)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, community_id, recorded_at,
                  voltage, current, power, temperature, ldr
        "#,
    )
    .bind(&r.community_id)
    .bind(r.voltage)
    .bind(r.current)
    .bind(input.power)
    .bind(r.temperature)
    .bind(r.ldr)
    .fetch_one(pool)
    .await
}

/// Readings for one community, oldest first, optionally bounded in time
/// (both ends inclusive).
pub async fn readings_for_community(
    pool: &PgPool,
    community_id: &str,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<StoredReading>, sqlx::Error> {
    sqlx::query_as::<_, StoredReading>(
        r#"
        SELECT id, community_id, recorded_at,
               voltage, current, power, temperature, ldr
        FROM sensor_readings
        WHERE community_id = $1
          AND ($2::timestamptz IS NULL OR recorded_at >= $2)
          AND ($3::timestamptz IS NULL OR recorded_at <= $3)
        ORDER BY recorded_at ASC
        LIMIT $4
        "#,
    )
    .bind(community_id)
    .bind(from)
    .bind(to)
    .bind(limit)
    .fetch_all(pool)
    .await
}
