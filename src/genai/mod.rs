pub mod models;
pub mod structured;

use std::{fmt, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{config::Config, response_store::ResponseStore};

use self::models::{ErrorResponse, GenerateContentRequest, GenerateContentResponse};

pub use self::structured::{generate, StructuredOutput};

// ---------------------------------------------------------------------------
// Completion seam
// ---------------------------------------------------------------------------

/// A rendered prompt plus the JSON schema the answer must follow.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub response_schema: Value,
}

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion service returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode completion response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Opaque text-generation backend.
///
/// `Ok(None)` means the service answered but produced no output text
/// (blocked prompt, empty candidate). Schema checking of the text is done
/// by [`generate`], not by implementors.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, CompletionError>;
}

// ---------------------------------------------------------------------------
// Gemini client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct GenAiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
    dump: Option<ResponseStore>,
}

impl GenAiClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.genai_timeout_secs))
            .build()
            .context("Failed to build completion HTTP client")?;

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.genai_base_url.clone(),
                model: config.genai_model.clone(),
                api_key: config.genai_api_key.clone(),
                dump: config.response_dump_dir.clone().map(ResponseStore::new),
            }),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.inner.base_url, self.inner.model
        )
    }
}

impl fmt::Debug for GenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenAiClient")
            .field("base_url", &self.inner.base_url)
            .field("model", &self.inner.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CompletionService for GenAiClient {
    #[instrument(skip_all, fields(model = %self.inner.model))]
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, CompletionError> {
        let url = self.endpoint();
        debug!(url = %url, prompt_chars = request.prompt.len(), "Requesting completion");

        let body =
            GenerateContentRequest::structured(&request.prompt, request.response_schema.clone());

        let response = self
            .inner
            .http
            .post(&url)
            .header("x-goog-api-key", &self.inner.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if let Some(dump) = &self.inner.dump {
            dump.save("generate_content", &bytes).await;
        }

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&bytes)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = serde_json::from_slice::<GenerateContentResponse>(&bytes)?;

        if let Some(reason) = parsed.block_reason() {
            warn!(block_reason = %reason, "Completion prompt was blocked");
        }
        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                prompt_tokens = ?usage.prompt_token_count,
                output_tokens = ?usage.candidates_token_count,
                total_tokens = ?usage.total_token_count,
                "Completion usage"
            );
        }

        Ok(parsed.into_text())
    }
}
