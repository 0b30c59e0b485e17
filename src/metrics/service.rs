use std::sync::Arc;

use thiserror::Error;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, instrument};
use validator::{Validate, ValidationErrors};

use super::{
    alerts,
    models::{AugmentedReading, DerivedMetrics, SensorReading},
    prompt::derivation_prompt,
    reconcile::reconcile,
};
use crate::{
    genai::{self, CompletionError, CompletionService},
    store::DocumentStore,
};

#[derive(Debug, Error)]
pub enum DerivationError {
    #[error("invalid sensor reading: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("metric derivation failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("metric derivation failed: completion service returned no usable output")]
    NoOutput,

    #[error("metric derivation cancelled")]
    Cancelled,
}

/// Turns one sensor reading into [`DerivedMetrics`].
///
/// Cheap to clone; collaborators and the alert task tracker are shared.
#[derive(Clone)]
pub struct DerivationService {
    completion: Arc<dyn CompletionService>,
    store: Arc<dyn DocumentStore>,
    alert_tasks: TaskTracker,
}

impl DerivationService {
    pub fn new(completion: Arc<dyn CompletionService>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            completion,
            store,
            alert_tasks: TaskTracker::new(),
        }
    }

    /// Wait for every alert write handed off so far, including those from
    /// derivations whose token has since been cancelled.
    pub async fn drain_alerts(&self) {
        self.alert_tasks.close();
        info!(pending = self.alert_tasks.len(), "Draining alert writes");
        self.alert_tasks.wait().await;
    }

    pub async fn derive(&self, reading: &SensorReading) -> Result<DerivedMetrics, DerivationError> {
        self.derive_with_cancel(reading, &CancellationToken::new()).await
    }

    /// Validate, compute power, ask the model, reconcile, then hand any
    /// alerts to a detached persistence task and return without waiting.
    ///
    /// Cancelling `cancel` aborts the completion call only; once alerts are
    /// handed off they are written regardless.
    #[instrument(skip_all, fields(community_id = %reading.community_id))]
    pub async fn derive_with_cancel(
        &self,
        reading: &SensorReading,
        cancel: &CancellationToken,
    ) -> Result<DerivedMetrics, DerivationError> {
        reading.validate()?;

        let input = AugmentedReading::new(reading.clone());
        let prompt = derivation_prompt(&input);

        let generated = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DerivationError::Cancelled),
            result = genai::generate::<DerivedMetrics>(self.completion.as_ref(), prompt) => result?,
        };
        let metrics = reconcile(generated.ok_or(DerivationError::NoOutput)?, &input);

        if !metrics.maintenance_alerts.is_empty() {
            alerts::spawn_persist(
                &self.alert_tasks,
                Arc::clone(&self.store),
                reading.community_id.clone(),
                metrics.maintenance_alerts.clone(),
            );
        }

        info!(
            power = metrics.power,
            battery_state = %metrics.battery_state,
            battery_health = metrics.battery_health,
            alerts = metrics.maintenance_alerts.len(),
            "Metrics derived"
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;
    use crate::{
        metrics::models::BatteryState,
        testing::{FakeCompletion, PendingStore, RecordingStore},
    };

    fn reading(current: f64, temperature: f64) -> SensorReading {
        SensorReading {
            community_id: "Community A".to_owned(),
            voltage: 230.0,
            current,
            temperature,
            ldr: 512.0,
        }
    }

    const CALM: &str = r#"{
        "power": 1,
        "batteryHealth": 97,
        "batteryState": "Charging",
        "timeToFull": "4h 21m",
        "solarIrradiance": 500,
        "maintenanceAlerts": []
    }"#;

    const HOT: &str = r#"{
        "power": 1,
        "batteryHealth": 70,
        "batteryState": "Charging",
        "timeToFull": "4h 21m",
        "solarIrradiance": 500,
        "maintenanceAlerts": [
            {"id": "temp-high", "title": "High temperature", "description": "45 °C exceeds 40 °C"},
            {"id": "check-panel", "title": "Inspect panel", "description": "Low output"}
        ]
    }"#;

    fn service(fake: FakeCompletion, store: Arc<dyn DocumentStore>) -> DerivationService {
        DerivationService::new(Arc::new(fake), store)
    }

    async fn wait_for_records(store: &RecordingStore, n: usize) {
        timeout(Duration::from_secs(2), async {
            while store.records().len() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("alerts were not persisted in time");
    }

    #[tokio::test]
    async fn scenario_charging_reading() {
        let store = Arc::new(RecordingStore::new());
        let svc = service(FakeCompletion::with_responses([Some(CALM)]), store.clone());

        let m = svc.derive(&reading(5.0, 20.0)).await.unwrap();

        assert_eq!(m.power, 1150.0);
        assert_eq!(m.battery_state, BatteryState::Charging);
        assert_eq!(m.time_to_full, "4h 21m");
        assert_eq!(m.battery_health, 97.0);
        assert!(m.maintenance_alerts.is_empty());
    }

    #[tokio::test]
    async fn scenario_discharging_reading() {
        let store = Arc::new(RecordingStore::new());
        let svc = service(FakeCompletion::with_responses([Some(CALM)]), store);

        let m = svc.derive(&reading(-3.0, 20.0)).await.unwrap();

        assert_eq!(m.power, -690.0);
        assert_eq!(m.battery_state, BatteryState::Discharging);
        assert_eq!(m.time_to_full, "--");
    }

    #[tokio::test]
    async fn prompt_carries_precomputed_power() {
        let fake = FakeCompletion::with_responses([Some(CALM)]);
        let svc = DerivationService::new(Arc::new(fake.clone()), Arc::new(RecordingStore::new()));

        svc.derive(&reading(5.0, 20.0)).await.unwrap();

        let requests = fake.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].prompt.contains("Power: 1150 W"));
        assert_eq!(requests[0].response_schema["type"], "OBJECT");
    }

    #[tokio::test]
    async fn scenario_hot_reading_persists_alerts() {
        let store = Arc::new(RecordingStore::new());
        let svc = service(FakeCompletion::with_responses([Some(HOT)]), store.clone());

        let m = svc.derive(&reading(5.0, 45.0)).await.unwrap();
        assert!(!m.maintenance_alerts.is_empty());

        wait_for_records(&store, 2).await;
        let records = store.records();
        assert!(records.iter().all(|(c, r)| c == "alerts"
            && r["communityId"] == "Community A"
            && r["status"] == "new"));
    }

    #[tokio::test]
    async fn calm_reading_writes_nothing() {
        let store = Arc::new(RecordingStore::new());
        let svc = service(FakeCompletion::with_responses([Some(CALM)]), store.clone());

        svc.derive(&reading(5.0, 20.0)).await.unwrap();
        tokio::task::yield_now().await;

        assert_eq!(store.attempts(), 0);
    }

    #[tokio::test]
    async fn empty_output_fails_and_skips_persistence() {
        let store = Arc::new(RecordingStore::new());
        let svc = service(FakeCompletion::with_responses([None::<&str>]), store.clone());

        let err = svc.derive(&reading(5.0, 45.0)).await.unwrap_err();
        assert!(matches!(err, DerivationError::NoOutput));

        tokio::task::yield_now().await;
        assert_eq!(store.attempts(), 0);
    }

    #[tokio::test]
    async fn schema_violation_fails() {
        let store = Arc::new(RecordingStore::new());
        let svc = service(
            FakeCompletion::with_responses([Some(r#"{"batteryHealth": "great"}"#)]),
            store,
        );
        let err = svc.derive(&reading(5.0, 20.0)).await.unwrap_err();
        assert!(matches!(err, DerivationError::NoOutput));
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let svc = service(
            FakeCompletion::failing(500, "boom"),
            Arc::new(RecordingStore::new()),
        );
        let err = svc.derive(&reading(5.0, 20.0)).await.unwrap_err();
        assert!(matches!(err, DerivationError::Completion(_)));
    }

    #[tokio::test]
    async fn invalid_reading_never_reaches_the_model() {
        let fake = FakeCompletion::with_responses([Some(CALM)]);
        let svc = DerivationService::new(Arc::new(fake.clone()), Arc::new(RecordingStore::new()));

        let bad = SensorReading { ldr: 2048.0, ..reading(5.0, 20.0) };
        let err = svc.derive(&bad).await.unwrap_err();

        assert!(matches!(err, DerivationError::Validation(_)));
        assert!(fake.requests().is_empty());
    }

    #[tokio::test]
    async fn persistence_failures_do_not_fail_derivation() {
        let store = Arc::new(RecordingStore::failing_on(["temp-high"]));
        let svc = service(FakeCompletion::with_responses([Some(HOT)]), store.clone());

        let m = svc.derive(&reading(5.0, 45.0)).await.unwrap();
        assert_eq!(m.maintenance_alerts.len(), 2);

        timeout(Duration::from_secs(2), async {
            while store.attempts() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.records()[0].1["id"], "check-panel");
    }

    #[tokio::test]
    async fn result_does_not_wait_for_persistence() {
        let svc = service(
            FakeCompletion::with_responses([Some(HOT)]),
            Arc::new(PendingStore),
        );

        let m = timeout(Duration::from_secs(2), svc.derive(&reading(5.0, 45.0)))
            .await
            .expect("derive must not block on alert writes")
            .unwrap();
        assert_eq!(m.maintenance_alerts.len(), 2);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_completion_call() {
        let svc = service(FakeCompletion::never(), Arc::new(RecordingStore::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = svc
            .derive_with_cancel(&reading(5.0, 20.0), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, DerivationError::Cancelled));
    }

    #[tokio::test]
    async fn alert_writes_finish_after_cancellation() {
        let store = Arc::new(RecordingStore::new());
        let svc = service(FakeCompletion::with_responses([Some(HOT)]), store.clone());
        let cancel = CancellationToken::new();

        let m = svc
            .derive_with_cancel(&reading(5.0, 45.0), &cancel)
            .await
            .unwrap();
        cancel.cancel();

        timeout(Duration::from_secs(2), svc.drain_alerts())
            .await
            .expect("alert writes were not drained");
        assert_eq!(store.records().len(), m.maintenance_alerts.len());
    }

    #[tokio::test]
    async fn drain_waits_for_pending_writes() {
        let svc = service(FakeCompletion::with_responses([Some(HOT)]), Arc::new(PendingStore));

        svc.derive(&reading(5.0, 45.0)).await.unwrap();

        let drained = timeout(Duration::from_millis(100), svc.drain_alerts()).await;
        assert!(drained.is_err());
    }

    #[tokio::test]
    async fn sloppy_overwritten_fields_still_derive() {
        let sloppy = r#"{
            "power": null,
            "batteryHealth": 88,
            "batteryState": "discharging",
            "timeToFull": "1h 0m",
            "solarIrradiance": -0.1,
            "maintenanceAlerts": []
        }"#;
        let svc = service(
            FakeCompletion::with_responses([Some(sloppy)]),
            Arc::new(RecordingStore::new()),
        );

        let m = svc.derive(&reading(5.0, 20.0)).await.unwrap();

        assert_eq!(m.power, 1150.0);
        assert_eq!(m.battery_state, BatteryState::Charging);
        assert_eq!(m.solar_irradiance, 512.0 * 1000.0 / 1023.0);
        assert_eq!(m.battery_health, 88.0);
    }

    #[tokio::test]
    async fn concurrent_derivations_are_independent() {
        let store = Arc::new(RecordingStore::new());
        let svc = service(
            FakeCompletion::with_responses([Some(CALM), Some(CALM)]),
            store,
        );

        let (ra, rb) = (reading(5.0, 20.0), reading(-3.0, 20.0));
        let (a, b) = tokio::join!(svc.derive(&ra), svc.derive(&rb));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.power, 1150.0);
        assert_eq!(b.power, -690.0);
        assert_eq!(b.battery_state, BatteryState::Discharging);
    }
}
