use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal, time};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use microgrid_service::{
    api::{self, AppState},
    config::Config,
    db,
    genai::GenAiClient,
    metrics::DerivationService,
    reading_cache::ReadingCache,
    reports::ReportService,
    store::PgDocumentStore,
};

/// Upper bound on waiting for alert writes once the server has stopped.
const ALERT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    // Env vars may be set externally
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env()?;
    config.log_config();
    if config.device_keys.is_empty() {
        warn!("DEVICE_KEYS is empty; every /ingest request will be rejected");
    }

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    info!("Database ready");

    let completion = Arc::new(GenAiClient::new(&config)?);
    let documents = Arc::new(PgDocumentStore::new(pool.clone()));
    let shutdown = CancellationToken::new();

    let derivation = DerivationService::new(completion.clone(), documents.clone());

    let state = AppState {
        derivation: derivation.clone(),
        reports: ReportService::new(completion),
        cache: ReadingCache::new(),
        documents,
        pool,
        device_keys: Arc::new(config.device_keys.clone()),
        shutdown: shutdown.clone(),
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        })
        .await?;

    if time::timeout(ALERT_DRAIN_TIMEOUT, derivation.drain_alerts())
        .await
        .is_err()
    {
        warn!(
            timeout_secs = ALERT_DRAIN_TIMEOUT.as_secs(),
            "Alert writes still pending at shutdown"
        );
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
