use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

pub const DEFAULT_ALERT_LIMIT: i64 = 50;
pub const MAX_ALERT_LIMIT: i64 = 500;

/// Upper bound on rows returned by one readings query.
pub const MAX_READINGS: i64 = 10_000;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TimeRangeParams {
    /// Start of time range (RFC3339, inclusive).
    pub from: Option<DateTime<Utc>>,
    /// End of time range (RFC3339, inclusive).
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AlertsQuery {
    /// Only alerts raised for this community.
    pub community_id: Option<String>,
    /// Defaults to 50, capped at 500.
    pub limit: Option<i64>,
}

impl AlertsQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_ALERT_LIMIT)
            .clamp(1, MAX_ALERT_LIMIT)
    }
}
