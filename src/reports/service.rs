use std::{fmt::Write, sync::Arc};

use thiserror::Error;
use tracing::{info, instrument};
use validator::{Validate, ValidationErrors};

use super::models::{ReportRequest, ReportSummary};
use crate::genai::{self, CompletionError, CompletionService};

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("invalid report request: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("report summary failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("report summary failed: completion service returned no usable output")]
    NoOutput,
}

/// Natural-language analysis of daily generation and consumption.
///
/// Every statistic is worked out by the model; nothing is aggregated here.
#[derive(Clone)]
pub struct ReportService {
    completion: Arc<dyn CompletionService>,
}

impl ReportService {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    #[instrument(skip_all, fields(timeframe = %request.timeframe, days = request.data.len()))]
    pub async fn summarize(&self, request: &ReportRequest) -> Result<ReportSummary, SummaryError> {
        request.validate()?;

        let summary = genai::generate::<ReportSummary>(self.completion.as_ref(), summary_prompt(request))
            .await?
            .ok_or(SummaryError::NoOutput)?;

        info!(chars = summary.summary.len(), "Report summary generated");
        Ok(summary)
    }
}

fn summary_prompt(request: &ReportRequest) -> String {
    let mut prompt = format!(
        "You are an energy analyst for a solar microgrid serving three communities.\n\
         Below are daily totals in kWh for {}.\n\
         \n",
        request.timeframe
    );

    for p in &request.data {
        // Writing to a String cannot fail.
        let _ = writeln!(
            prompt,
            "- {}: generation {} kWh; consumption Community A {} kWh, Community B {} kWh, \
             Community C {} kWh",
            p.day, p.generation, p.community_a, p.community_b, p.community_c
        );
    }

    prompt.push_str(
        "\nWrite a concise analytical summary that:\n\
         1. States total generation against total consumption over the period.\n\
         2. Names the day with the highest and the day with the lowest net energy \
         (generation minus consumption).\n\
         3. Identifies the community with the highest average consumption.\n\
         4. Notes any notable trends.\n\
         Put each observation in its own paragraph, separated by newline characters.\n",
    );
    prompt
}
