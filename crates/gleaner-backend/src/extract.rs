//! Text-extraction collaborator implementations

use async_trait::async_trait;
use gleaner_domain::{CollaboratorError, TextExtractor};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Mock text extractor for deterministic testing
///
/// Returns scripted text per path, falling back to a fixed default, and
/// counts calls.
#[derive(Clone)]
pub struct MockExtractor {
    default_text: String,
    scripted: Arc<Mutex<HashMap<PathBuf, String>>>,
    failing: Arc<Mutex<HashMap<PathBuf, String>>>,
    call_count: Arc<AtomicUsize>,
}

impl MockExtractor {
    /// Extractor returning `text` for every file
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            default_text: text.into(),
            scripted: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(Mutex::new(HashMap::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script specific text for one path
    pub fn script(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.scripted.lock().unwrap().insert(path.into(), text.into());
    }

    /// Make extraction fail for one path
    pub fn fail_for(&self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        self.failing.lock().unwrap().insert(path.into(), reason.into());
    }

    /// Number of extraction calls made so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl Default for MockExtractor {
    fn default() -> Self {
        Self::new("mock document text")
    }
}

#[async_trait]
impl TextExtractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(&self, file: &Path) -> Result<String, CollaboratorError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = self.failing.lock().unwrap().get(file) {
            return Err(CollaboratorError::UnreadableInput {
                path: file.to_path_buf(),
                detail: reason.clone(),
            });
        }
        Ok(self
            .scripted
            .lock()
            .unwrap()
            .get(file)
            .cloned()
            .unwrap_or_else(|| self.default_text.clone()))
    }
}

/// Default timeout for one extraction call
pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 60;

/// HTTP client for a text-extraction sidecar service
///
/// Posts the file path to `<endpoint>/extract` and reads back the extracted
/// text. The sidecar owns the actual PDF/image handling; which engine it runs
/// is selected by the strategy's extraction method string.
pub struct RemoteExtractor {
    endpoint: String,
    method: String,
    client: reqwest::Client,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ExtractResponse {
    text: String,
}

impl RemoteExtractor {
    /// Create a client for the sidecar at `endpoint`, requesting `method`
    /// (e.g. "pdftext", "ocr")
    pub fn new(endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: method.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(DEFAULT_EXTRACT_TIMEOUT_SECS),
        }
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TextExtractor for RemoteExtractor {
    fn name(&self) -> &str {
        &self.method
    }

    async fn extract(&self, file: &Path) -> Result<String, CollaboratorError> {
        let url = format!("{}/extract", self.endpoint);
        debug!("extracting '{}' via {}", file.display(), self.method);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "path": file.display().to_string(),
                "method": self.method,
            }))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Timeout(self.timeout.as_secs())
                } else {
                    CollaboratorError::Unreachable(format!("request failed: {e}"))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(CollaboratorError::Unreachable(format!(
                "HTTP {status}: {text}"
            )));
        }

        let parsed: ExtractResponse = response.json().await.map_err(|e| {
            CollaboratorError::InvalidResponse(format!("failed to parse response: {e}"))
        })?;
        Ok(parsed.text)
    }
}
