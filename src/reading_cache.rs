use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::metrics::{AugmentedReading, DerivedMetrics};

/// Latest state of one community: its most recent reading and, once derived,
/// the metrics for that reading.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommunitySnapshot {
    pub community_id: String,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub temperature: f64,
    pub ldr: f64,
    /// `None` until derivation for this reading succeeds.
    pub metrics: Option<DerivedMetrics>,
    pub updated_at: DateTime<Utc>,
}

impl CommunitySnapshot {
    fn from_reading(input: &AugmentedReading) -> Self {
        let r = &input.reading;
        Self {
            community_id: r.community_id.clone(),
            voltage: r.voltage,
            current: r.current,
            power: input.power,
            temperature: r.temperature,
            ldr: r.ldr,
            metrics: None,
            updated_at: Utc::now(),
        }
    }
}

/// In-memory store of the latest `CommunitySnapshot` per community.
///
/// Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct ReadingCache {
    inner: Arc<RwLock<HashMap<String, CommunitySnapshot>>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the community's snapshot with a fresh reading. Any metrics from
    /// the previous reading are dropped.
    pub async fn update_reading(&self, input: &AugmentedReading) {
        let snapshot = CommunitySnapshot::from_reading(input);
        self.inner
            .write()
            .await
            .insert(snapshot.community_id.clone(), snapshot);
    }

    /// Attach metrics to the community's snapshot, creating it if absent.
    pub async fn update_metrics(&self, input: &AugmentedReading, metrics: DerivedMetrics) {
        let mut map = self.inner.write().await;
        let snapshot = map
            .entry(input.reading.community_id.clone())
            .or_insert_with(|| CommunitySnapshot::from_reading(input));
        snapshot.metrics = Some(metrics);
        snapshot.updated_at = Utc::now();
    }

    /// All snapshots, ordered by community id.
    pub async fn all(&self) -> Vec<CommunitySnapshot> {
        let mut snapshots: Vec<_> = self.inner.read().await.values().cloned().collect();
        snapshots.sort_by(|a, b| a.community_id.cmp(&b.community_id));
        snapshots
    }

    pub async fn get(&self, community_id: &str) -> Option<CommunitySnapshot> {
        self.inner.read().await.get(community_id).cloned()
    }
}
