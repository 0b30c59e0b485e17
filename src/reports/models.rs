use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use utoipa::ToSchema;
use validator::Validate;

use crate::{genai::StructuredOutput, metrics::models::validate_non_negative};

/// Energy totals for one day, in kWh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetricPoint {
    /// Display label, e.g. `"Mon 03"`.
    #[validate(length(min = 1, message = "day must not be empty"))]
    pub day: String,

    /// Consumption of Community A
    #[validate(custom(function = "validate_non_negative"))]
    pub community_a: f64,

    /// Consumption of Community B
    #[validate(custom(function = "validate_non_negative"))]
    pub community_b: f64,

    /// Consumption of Community C
    #[validate(custom(function = "validate_non_negative"))]
    pub community_c: f64,

    /// Total generation across all communities
    #[validate(custom(function = "validate_non_negative"))]
    pub generation: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReportRequest {
    /// Human-readable period, e.g. `"last 14 days"`.
    #[validate(length(min = 1, message = "timeframe must not be empty"))]
    pub timeframe: String,

    #[validate(length(min = 1, message = "data must contain at least one day"))]
    #[validate(nested)]
    pub data: Vec<DailyMetricPoint>,
}

/// Free-text analysis; paragraphs separated by newlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReportSummary {
    #[validate(length(min = 1, message = "summary must not be empty"))]
    pub summary: String,
}

impl ReportSummary {
    pub fn paragraphs(&self) -> impl Iterator<Item = &str> {
        self.summary.split('\n').map(str::trim).filter(|p| !p.is_empty())
    }
}

impl StructuredOutput for ReportSummary {
    fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "summary": {
                    "type": "STRING",
                    "description": "Analytical summary; separate paragraphs with newline characters."
                }
            },
            "required": ["summary"]
        })
    }
}
