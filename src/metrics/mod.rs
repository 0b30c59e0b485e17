//! Derived-metrics pipeline: precompute power, ask the completion service,
//! reconcile the answer, persist any maintenance alerts on the side.

pub mod alerts;
pub mod models;
pub mod prompt;
pub mod reconcile;
pub mod service;

pub use models::{AugmentedReading, BatteryState, DerivedMetrics, MaintenanceAlert, SensorReading};
pub use service::{DerivationError, DerivationService};
