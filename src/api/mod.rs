pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{
    config::DeviceKeys, metrics::DerivationService, reading_cache::ReadingCache,
    reports::ReportService, store::DocumentStore,
};

/// Everything a handler needs. Cheap to clone; all members are shared.
#[derive(Clone)]
pub struct AppState {
    pub derivation: DerivationService,
    pub reports: ReportService,
    pub cache: ReadingCache,
    pub documents: Arc<dyn DocumentStore>,
    pub pool: PgPool,
    pub device_keys: Arc<DeviceKeys>,
    /// Cancelled on shutdown; aborts in-flight completion calls.
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/ingest", post(handlers::ingest))
        .route("/metrics/derive", post(handlers::derive_metrics))
        .route("/reports/summary", post(handlers::summarize_report))
        .route("/communities/latest", get(handlers::get_latest_snapshots))
        .route(
            "/communities/{community_id}/readings",
            get(handlers::get_community_readings),
        )
        .route("/alerts", get(handlers::get_alerts))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
