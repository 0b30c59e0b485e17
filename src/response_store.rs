//! Best-effort dump of raw completion responses for offline prompt tuning.
//!
//! Errors are logged and swallowed; saving must never interrupt a derivation.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ResponseStore {
    root: PathBuf,
}

impl ResponseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` to `{root}/{kind}/{timestamp}_{uuid}.json`, pretty-printed
    /// when the body is valid JSON. Returns the path written, if any.
    pub async fn save(&self, kind: &str, bytes: &[u8]) -> Option<PathBuf> {
        let dir = self.root.join(kind);
        let ts = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let path = dir.join(format!("{ts}_{}.json", Uuid::new_v4().simple()));

        if let Err(e) = fs::create_dir_all(&dir).await {
            warn!(path = %dir.display(), error = %e, "response_store: failed to create directory");
            return None;
        }

        let content = serde_json::from_slice::<serde_json::Value>(bytes)
            .ok()
            .and_then(|v| serde_json::to_vec_pretty(&v).ok())
            .unwrap_or_else(|| bytes.to_vec());

        match fs::write(&path, &content).await {
            Ok(()) => {
                debug!(path = %path.display(), bytes = content.len(), "response_store: saved");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "response_store: failed to write file");
                None
            }
        }
    }
}
