use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// A raw reading as stored in `sensor_readings`, with the power computed at
/// ingestion time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredReading {
    pub id: Uuid,
    pub community_id: String,
    pub recorded_at: DateTime<Utc>,
    /// Volts
    pub voltage: f64,
    /// Amperes
    pub current: f64,
    /// Watts
    pub power: f64,
    /// Degrees Celsius
    pub temperature: f64,
    /// Raw light-sensor value, 0–1023
    pub ldr: f64,
}
