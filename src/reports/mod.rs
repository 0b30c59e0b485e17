pub mod models;
pub mod service;

pub use models::{DailyMetricPoint, ReportRequest, ReportSummary};
pub use service::{ReportService, SummaryError};
