use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;
use validator::Validate;

use super::{CompletionError, CompletionRequest, CompletionService};

/// A type the completion service can be asked to produce.
///
/// `response_schema` is sent along with the prompt; `Validate` re-checks the
/// constraints the schema language cannot express (or the model ignored).
pub trait StructuredOutput: DeserializeOwned + Validate {
    fn response_schema() -> Value;
}

/// Send `prompt` and parse the answer as `T`.
///
/// Transport and API failures are errors. An empty answer, text that is not
/// JSON, JSON of the wrong shape, and values failing validation all yield
/// `Ok(None)`.
pub async fn generate<T: StructuredOutput>(
    service: &dyn CompletionService,
    prompt: String,
) -> Result<Option<T>, CompletionError> {
    let request = CompletionRequest {
        prompt,
        response_schema: T::response_schema(),
    };

    let Some(text) = service.complete(&request).await? else {
        warn!("Completion service returned no output");
        return Ok(None);
    };

    let parsed = match serde_json::from_str::<T>(strip_code_fence(&text)) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "Completion output does not match the response schema");
            return Ok(None);
        }
    };

    if let Err(e) = parsed.validate() {
        warn!(error = %e, "Completion output failed validation");
        return Ok(None);
    }

    Ok(Some(parsed))
}

/// Models occasionally wrap JSON in a Markdown fence even in JSON mode.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
