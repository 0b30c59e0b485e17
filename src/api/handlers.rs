use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use super::{
    dto::{AlertsQuery, TimeRangeParams, MAX_READINGS},
    errors::AppError,
    AppState,
};
use crate::{
    db::{self, models::StoredReading},
    metrics::{
        alerts::ALERTS_COLLECTION, AugmentedReading, BatteryState, DerivedMetrics,
        MaintenanceAlert, SensorReading,
    },
    reading_cache::CommunitySnapshot,
    reports::{DailyMetricPoint, ReportRequest, ReportSummary},
    store::StoredDocument,
};

pub const DEVICE_KEY_HEADER: &str = "x-device-key";

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Accept a reading pushed by a household node.
///
/// The reading is stored and cached before derivation, so it survives a
/// failed completion call.
#[utoipa::path(
    post,
    path = "/ingest",
    request_body = SensorReading,
    params(
        ("x-device-key" = String, Header, description = "Pre-shared key of the reading's community"),
    ),
    responses(
        (status = 200, description = "Derived metrics for the reading", body = DerivedMetrics),
        (status = 401, description = "Missing or wrong device key"),
        (status = 422, description = "Reading failed validation"),
        (status = 502, description = "Derivation failed"),
        (status = 503, description = "Shutting down"),
    ),
    tag = "metrics"
)]
pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(reading): Json<SensorReading>,
) -> Result<Json<DerivedMetrics>, AppError> {
    let presented = headers
        .get(DEVICE_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !state.device_keys.verify(&reading.community_id, presented) {
        return Err(AppError::Unauthorized(reading.community_id));
    }
    reading.validate()?;

    let input = AugmentedReading::new(reading);
    let stored = db::insert_reading(&state.pool, &input).await?;
    state.cache.update_reading(&input).await;
    info!(community_id = %stored.community_id, reading_id = %stored.id, "Reading ingested");

    let metrics = state
        .derivation
        .derive_with_cancel(&input.reading, &state.shutdown)
        .await?;
    state.cache.update_metrics(&input, metrics.clone()).await;

    Ok(Json(metrics))
}

/// Derive metrics for a reading without storing it.
#[utoipa::path(
    post,
    path = "/metrics/derive",
    request_body = SensorReading,
    responses(
        (status = 200, description = "Derived metrics", body = DerivedMetrics),
        (status = 422, description = "Reading failed validation"),
        (status = 502, description = "Derivation failed"),
        (status = 503, description = "Shutting down"),
    ),
    tag = "metrics"
)]
pub async fn derive_metrics(
    State(state): State<AppState>,
    Json(reading): Json<SensorReading>,
) -> Result<Json<DerivedMetrics>, AppError> {
    let metrics = state
        .derivation
        .derive_with_cancel(&reading, &state.shutdown)
        .await?;
    Ok(Json(metrics))
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/reports/summary",
    request_body = ReportRequest,
    responses(
        (status = 200, description = "Analytical summary", body = ReportSummary),
        (status = 422, description = "Request failed validation"),
        (status = 502, description = "Summary generation failed"),
    ),
    tag = "reports"
)]
pub async fn summarize_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> Result<Json<ReportSummary>, AppError> {
    Ok(Json(state.reports.summarize(&request).await?))
}

// ---------------------------------------------------------------------------
// Communities
// ---------------------------------------------------------------------------

/// Latest reading, and metrics once derived, for every community seen since
/// startup.
#[utoipa::path(
    get,
    path = "/communities/latest",
    responses(
        (status = 200, description = "Latest snapshot per community", body = Vec<CommunitySnapshot>),
    ),
    tag = "communities"
)]
pub async fn get_latest_snapshots(State(state): State<AppState>) -> Json<Vec<CommunitySnapshot>> {
    Json(state.cache.all().await)
}

/// Stored raw readings for one community, oldest first.
#[utoipa::path(
    get,
    path = "/communities/{community_id}/readings",
    params(
        ("community_id" = String, Path, description = "Community identifier"),
        TimeRangeParams,
    ),
    responses(
        (status = 200, description = "Readings ordered by recorded_at ASC", body = Vec<StoredReading>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "communities"
)]
pub async fn get_community_readings(
    State(state): State<AppState>,
    Path(community_id): Path<String>,
    Query(params): Query<TimeRangeParams>,
) -> Result<Json<Vec<StoredReading>>, AppError> {
    let rows = db::readings_for_community(
        &state.pool,
        &community_id,
        params.from,
        params.to,
        MAX_READINGS,
    )
    .await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Most recently persisted maintenance alerts, newest first.
#[utoipa::path(
    get,
    path = "/alerts",
    params(AlertsQuery),
    responses(
        (status = 200, description = "Persisted alerts", body = Vec<StoredDocument>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "alerts"
)]
pub async fn get_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> Result<Json<Vec<StoredDocument>>, AppError> {
    let docs = state
        .documents
        .recent(
            ALERTS_COLLECTION,
            query.community_id.as_deref(),
            query.effective_limit(),
        )
        .await?;
    Ok(Json(docs))
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        ingest,
        derive_metrics,
        summarize_report,
        get_latest_snapshots,
        get_community_readings,
        get_alerts,
        health
    ),
    components(schemas(
        SensorReading,
        DerivedMetrics,
        BatteryState,
        MaintenanceAlert,
        ReportRequest,
        DailyMetricPoint,
        ReportSummary,
        CommunitySnapshot,
        StoredReading,
        StoredDocument
    )),
    tags(
        (name = "metrics", description = "Derived battery and solar metrics"),
        (name = "reports", description = "Natural-language energy reports"),
        (name = "communities", description = "Per-community readings"),
        (name = "alerts", description = "Persisted maintenance alerts"),
        (name = "system", description = "System endpoints"),
    ),
    info(
        title = "Microgrid Metrics API",
        version = "0.1.0",
        description = "REST API for solar microgrid readings, derived metrics and reports"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
