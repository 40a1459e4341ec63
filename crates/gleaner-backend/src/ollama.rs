//! Ollama backend implementation
//!
//! Field extraction through a local Ollama instance. The backend owns prompt
//! construction and response parsing; the engine only sees structured fields
//! and token counts.
//!
//! # Features
//!
//! - Async HTTP communication with the Ollama generate API
//! - Configurable endpoint and model
//! - Transport retry with exponential backoff
//! - Token accounting from the API's eval counts

use async_trait::async_trait;
use gleaner_domain::{
    BackendResponse, CollaboratorError, DocumentPayload, ExtractionProfile, LlmBackend,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for one generate call (120 seconds; extraction prompts
/// carry whole documents)
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default number of transport retry attempts inside one call
pub const DEFAULT_TRANSPORT_RETRIES: u32 = 3;

/// LLM backend speaking the Ollama generate API
pub struct OllamaBackend {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    timeout: Duration,
    transport_retries: u32,
}

/// Request body for the Ollama generate API
#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: &'static str,
}

/// Response from the Ollama generate API
#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g. "http://localhost:11434")
    /// - `model`: model to use (e.g. "llama3", "mistral")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            transport_retries: DEFAULT_TRANSPORT_RETRIES,
        }
    }

    /// Create a backend against the default local endpoint
    pub fn default_endpoint(model: impl Into<String>) -> Self {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of transport retry attempts inside one call
    pub fn with_transport_retries(mut self, retries: u32) -> Self {
        self.transport_retries = retries;
        self
    }

    /// Build the extraction prompt for a batch of documents
    ///
    /// Asks for a single JSON object mapping each file name to an object with
    /// one entry per requested field (null when not found).
    fn build_prompt(
        payload: &[DocumentPayload],
        texts: &[(PathBuf, String)],
        profile: &ExtractionProfile,
    ) -> String {
        let field_list = profile.mandatory_fields.join(", ");
        let mut prompt = format!(
            "Extract the following fields from each document: {field_list}.\n\
             Respond with a single JSON object mapping each file name to an \
             object with one entry per field. Use null for fields you cannot \
             find.\n\nFiles: {}\n",
            payload.len()
        );
        for (path, text) in texts {
            prompt.push_str(&format!(
                "\n=== FILE: {} ===\n{}\n=== END FILE ===\n",
                path.display(),
                text
            ));
        }
        prompt
    }

    /// Resolve every payload entry to text, reading raw files from disk
    async fn resolve_texts(
        payload: &[DocumentPayload],
    ) -> Result<Vec<(PathBuf, String)>, CollaboratorError> {
        let mut texts = Vec::with_capacity(payload.len());
        for doc in payload {
            let path = doc.path().to_path_buf();
            let text = match doc {
                DocumentPayload::Text { text, .. } => text.clone(),
                DocumentPayload::Raw { path } => tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| CollaboratorError::UnreadableInput {
                        path: path.clone(),
                        detail: e.to_string(),
                    })?,
            };
            texts.push((path, text));
        }
        Ok(texts)
    }

    /// Parse the model's JSON answer into per-file field maps
    ///
    /// Files the model omitted get an empty map so validity checking still
    /// sees them.
    fn parse_fields(
        response: &str,
        payload: &[DocumentPayload],
    ) -> Result<BTreeMap<PathBuf, BTreeMap<String, Option<String>>>, CollaboratorError> {
        let value: serde_json::Value = serde_json::from_str(response.trim())
            .map_err(|e| CollaboratorError::InvalidResponse(format!("bad JSON: {e}")))?;
        let object = value
            .as_object()
            .ok_or_else(|| CollaboratorError::InvalidResponse("expected JSON object".into()))?;

        let mut per_file = BTreeMap::new();
        for doc in payload {
            let path = doc.path().to_path_buf();
            let file_key = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());

            let entry = object
                .get(&file_key)
                .or_else(|| object.get(&path.display().to_string()));

            let mut fields = BTreeMap::new();
            if let Some(serde_json::Value::Object(map)) = entry {
                for (name, value) in map {
                    let parsed = match value {
                        serde_json::Value::Null => None,
                        serde_json::Value::String(s) => Some(s.clone()),
                        other => Some(other.to_string()),
                    };
                    fields.insert(name.clone(), parsed);
                }
            } else {
                warn!("model response has no entry for '{}'", path.display());
            }
            per_file.insert(path, fields);
        }
        Ok(per_file)
    }

    async fn generate(&self, prompt: String) -> Result<GenerateResponse, CollaboratorError> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = GenerateRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
            format: "json",
        };

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.transport_retries {
            let send = self
                .client
                .post(&url)
                .json(&body)
                .timeout(self.timeout)
                .send();

            match send.await {
                Ok(response) if response.status().is_success() => {
                    return response.json::<GenerateResponse>().await.map_err(|e| {
                        CollaboratorError::InvalidResponse(format!("failed to parse response: {e}"))
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    let text = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "unknown error".to_string());
                    last_error = Some(CollaboratorError::Unreachable(format!(
                        "HTTP {status}: {text}"
                    )));
                }
                Err(e) if e.is_timeout() => {
                    last_error = Some(CollaboratorError::Timeout(self.timeout.as_secs()));
                }
                Err(e) => {
                    last_error = Some(CollaboratorError::Unreachable(format!(
                        "request failed: {e}"
                    )));
                }
            }

            attempts += 1;
            if attempts < self.transport_retries {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                debug!("ollama call failed, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| CollaboratorError::Unreachable("max retries exceeded".into())))
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn call(
        &self,
        payload: &[DocumentPayload],
        profile: &ExtractionProfile,
    ) -> Result<BackendResponse, CollaboratorError> {
        let texts = Self::resolve_texts(payload).await?;
        let prompt = Self::build_prompt(payload, &texts, profile);

        debug!(
            "ollama call: {} files, prompt {} chars",
            payload.len(),
            prompt.len()
        );

        let generated = self.generate(prompt).await?;
        let per_file_fields = Self::parse_fields(&generated.response, payload)?;

        Ok(BackendResponse {
            per_file_fields,
            tokens_in: generated.prompt_eval_count,
            tokens_out: generated.eval_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(paths: &[&str]) -> Vec<DocumentPayload> {
        paths
            .iter()
            .map(|p| DocumentPayload::Text {
                path: p.into(),
                text: "invoice text".into(),
            })
            .collect()
    }

    #[test]
    fn test_backend_creation() {
        let backend = OllamaBackend::new("http://localhost:11434", "llama3");
        assert_eq!(backend.endpoint, "http://localhost:11434");
        assert_eq!(backend.model, "llama3");
        assert_eq!(backend.transport_retries, DEFAULT_TRANSPORT_RETRIES);
    }

    #[test]
    fn test_default_endpoint() {
        let backend = OllamaBackend::default_endpoint("mistral");
        assert_eq!(backend.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_parse_fields_by_file_name() {
        let response = r#"{"a.pdf": {"INVOICE_NO": "INV-1", "TOTAL": null}}"#;
        let parsed = OllamaBackend::parse_fields(response, &payload(&["docs/a.pdf"])).unwrap();

        let fields = &parsed[&PathBuf::from("docs/a.pdf")];
        assert_eq!(fields["INVOICE_NO"].as_deref(), Some("INV-1"));
        assert_eq!(fields["TOTAL"], None);
    }

    #[test]
    fn test_parse_fields_numeric_value() {
        let response = r#"{"a.pdf": {"TOTAL": 10.5}}"#;
        let parsed = OllamaBackend::parse_fields(response, &payload(&["a.pdf"])).unwrap();
        assert_eq!(
            parsed[&PathBuf::from("a.pdf")]["TOTAL"].as_deref(),
            Some("10.5")
        );
    }

    #[test]
    fn test_parse_fields_missing_file_yields_empty_map() {
        let response = r#"{"other.pdf": {"INVOICE_NO": "INV-9"}}"#;
        let parsed = OllamaBackend::parse_fields(response, &payload(&["a.pdf"])).unwrap();
        assert!(parsed[&PathBuf::from("a.pdf")].is_empty());
    }

    #[test]
    fn test_parse_fields_rejects_non_object() {
        let result = OllamaBackend::parse_fields("[1, 2]", &payload(&["a.pdf"]));
        assert!(matches!(result, Err(CollaboratorError::InvalidResponse(_))));
    }

    #[test]
    fn test_build_prompt_lists_fields_and_files() {
        let profile = ExtractionProfile::new("p", vec!["INVOICE_NO".into()]);
        let docs = payload(&["a.pdf"]);
        let texts = vec![(PathBuf::from("a.pdf"), "invoice text".to_string())];

        let prompt = OllamaBackend::build_prompt(&docs, &texts, &profile);
        assert!(prompt.contains("INVOICE_NO"));
        assert!(prompt.contains("=== FILE: a.pdf ==="));
        assert!(prompt.contains("invoice text"));
    }

    #[tokio::test]
    async fn test_transport_error_surfaced() {
        // Unroutable port, single attempt
        let backend = OllamaBackend::new("http://127.0.0.1:9", "llama3")
            .with_transport_retries(1)
            .with_timeout(Duration::from_secs(1));
        let profile = ExtractionProfile::invoice_default();

        let result = backend.call(&payload(&["a.pdf"]), &profile).await;
        assert!(matches!(
            result,
            Err(CollaboratorError::Unreachable(_)) | Err(CollaboratorError::Timeout(_))
        ));
    }
}
