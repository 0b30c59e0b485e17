use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use super::models::MaintenanceAlert;
use crate::store::{DocumentStore, PersistenceError};

pub const ALERTS_COLLECTION: &str = "alerts";

/// Status every freshly generated alert starts in.
pub const NEW_ALERT_STATUS: &str = "new";

/// Shape of a persisted alert. `createdAt` is replaced by the store's clock.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AlertRecord<'a> {
    #[serde(flatten)]
    alert: &'a MaintenanceAlert,
    community_id: &'a str,
    created_at: DateTime<Utc>,
    status: &'static str,
}

/// Persist `alerts` on a task registered with `tracker`. Nobody awaits the
/// handle in production; writes outlive the request that caused them and are
/// drained through the tracker at shutdown.
pub fn spawn_persist(
    tracker: &TaskTracker,
    store: Arc<dyn DocumentStore>,
    community_id: String,
    alerts: Vec<MaintenanceAlert>,
) -> JoinHandle<usize> {
    tracker.spawn(async move { persist_alerts(store.as_ref(), &community_id, &alerts).await })
}

/// Append one record per alert, one after another. A failed write is logged
/// and skipped. Returns the number of records written.
pub async fn persist_alerts(
    store: &dyn DocumentStore,
    community_id: &str,
    alerts: &[MaintenanceAlert],
) -> usize {
    let mut written = 0;
    for alert in alerts {
        match append_alert(store, community_id, alert).await {
            Ok(()) => written += 1,
            Err(e) => warn!(
                community_id = %community_id,
                alert_id = %alert.id,
                error = %e,
                "Failed to persist maintenance alert"
            ),
        }
    }

    info!(
        community_id = %community_id,
        written,
        failed = alerts.len() - written,
        "Maintenance alerts persisted"
    );
    written
}

async fn append_alert(
    store: &dyn DocumentStore,
    community_id: &str,
    alert: &MaintenanceAlert,
) -> Result<(), PersistenceError> {
    let record = serde_json::to_value(AlertRecord {
        alert,
        community_id,
        created_at: Utc::now(),
        status: NEW_ALERT_STATUS,
    })?;
    store.append(ALERTS_COLLECTION, record).await
}
