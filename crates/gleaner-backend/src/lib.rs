//! Gleaner Collaborator Layer
//!
//! Pluggable implementations of the two collaborator traits from
//! `gleaner-domain`: text extraction and LLM field extraction.
//!
//! # Implementations
//!
//! - [`MockBackend`] / [`MockExtractor`]: deterministic mocks for testing
//! - [`OllamaBackend`]: local Ollama API integration
//! - [`RemoteExtractor`]: HTTP text-extraction sidecar client
//!
//! # Examples
//!
//! ```
//! use gleaner_backend::MockBackend;
//! use gleaner_domain::{DocumentPayload, ExtractionProfile, LlmBackend};
//!
//! # tokio_test::block_on(async {
//! let backend = MockBackend::filled("INV-1");
//! let profile = ExtractionProfile::invoice_default();
//! let payload = vec![DocumentPayload::Raw { path: "a.pdf".into() }];
//!
//! let response = backend.call(&payload, &profile).await.unwrap();
//! assert_eq!(response.per_file_fields.len(), 1);
//! # });
//! ```

#![warn(missing_docs)]

pub mod extract;
pub mod ollama;

pub use extract::{MockExtractor, RemoteExtractor};
pub use ollama::OllamaBackend;

use async_trait::async_trait;
use gleaner_domain::{
    BackendResponse, CollaboratorError, DocumentPayload, ExtractionProfile, LlmBackend,
};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Mock LLM backend for deterministic testing
///
/// Returns scripted per-file field maps without any network calls, counts
/// calls, tracks its own concurrency high-water mark, and supports failure
/// injection per file or per call.
#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<MockBackendInner>,
}

#[derive(Default)]
struct MockBackendInner {
    /// Default value filled into every mandatory field
    fill_value: Mutex<Option<String>>,
    /// Scripted field maps per file, overriding the fill value
    scripted: Mutex<HashMap<PathBuf, BTreeMap<String, Option<String>>>>,
    /// Per-file counts of calls that should yield an empty mandatory field
    invalid_times: Mutex<HashMap<PathBuf, u32>>,
    /// Number of upcoming calls that should fail with a transport error
    transport_failures: Mutex<u32>,
    /// Total number of calls made
    call_count: AtomicUsize,
    /// Per-file call counts
    calls_per_file: Mutex<HashMap<PathBuf, usize>>,
    /// Calls currently in flight
    in_flight: AtomicUsize,
    /// Highest observed in-flight count
    peak_in_flight: AtomicUsize,
    /// Artificial latency per call, to make concurrency observable
    latency: Mutex<Option<Duration>>,
    /// Tokens charged per call
    tokens_per_call: Mutex<(u64, u64)>,
}

impl MockBackend {
    /// Backend that fills every mandatory field with `value`
    pub fn filled(value: impl Into<String>) -> Self {
        let backend = Self::default();
        *backend.inner.fill_value.lock().unwrap() = Some(value.into());
        *backend.inner.tokens_per_call.lock().unwrap() = (100, 20);
        backend
    }

    /// Script an explicit field map for one file
    pub fn script(&self, path: impl Into<PathBuf>, fields: BTreeMap<String, Option<String>>) {
        self.inner.scripted.lock().unwrap().insert(path.into(), fields);
    }

    /// Make the first `times` calls covering `path` return an empty first
    /// mandatory field, so the file is judged invalid and retried
    pub fn invalid_first(&self, path: impl Into<PathBuf>, times: u32) {
        self.inner
            .invalid_times
            .lock()
            .unwrap()
            .insert(path.into(), times);
    }

    /// Fail the next `times` calls with a transport error
    pub fn fail_transport(&self, times: u32) {
        *self.inner.transport_failures.lock().unwrap() = times;
    }

    /// Add artificial latency to every call
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.inner.latency.lock().unwrap() = Some(latency);
        self
    }

    /// Set the token counts charged per call
    pub fn with_tokens(self, tokens_in: u64, tokens_out: u64) -> Self {
        *self.inner.tokens_per_call.lock().unwrap() = (tokens_in, tokens_out);
        self
    }

    /// Number of calls made so far
    pub fn call_count(&self) -> usize {
        self.inner.call_count.load(Ordering::SeqCst)
    }

    /// Number of calls that included `path` in their payload
    pub fn calls_for(&self, path: impl Into<PathBuf>) -> usize {
        self.inner
            .calls_per_file
            .lock()
            .unwrap()
            .get(&path.into())
            .copied()
            .unwrap_or(0)
    }

    /// Highest number of calls observed in flight at once
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn call(
        &self,
        payload: &[DocumentPayload],
        profile: &ExtractionProfile,
    ) -> Result<BackendResponse, CollaboratorError> {
        self.inner.call_count.fetch_add(1, Ordering::SeqCst);
        {
            let mut per_file = self.inner.calls_per_file.lock().unwrap();
            for doc in payload {
                *per_file.entry(doc.path().to_path_buf()).or_insert(0) += 1;
            }
        }

        let current = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let latency = *self.inner.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        {
            let mut failures = self.inner.transport_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(CollaboratorError::Unreachable("mock transport failure".into()));
            }
        }

        let fill = self.inner.fill_value.lock().unwrap().clone();
        let scripted = self.inner.scripted.lock().unwrap();
        let mut invalid_times = self.inner.invalid_times.lock().unwrap();

        let mut per_file_fields = BTreeMap::new();
        for doc in payload {
            let path = doc.path().to_path_buf();

            let mut fields: BTreeMap<String, Option<String>> =
                if let Some(fields) = scripted.get(&path) {
                    fields.clone()
                } else {
                    profile
                        .mandatory_fields
                        .iter()
                        .map(|name| (name.clone(), fill.clone()))
                        .collect()
                };

            // Failure injection: blank the first mandatory field for the
            // first N calls covering this file.
            if let Some(remaining) = invalid_times.get_mut(&path) {
                if *remaining > 0 {
                    *remaining -= 1;
                    if let Some(first) = profile.mandatory_fields.first() {
                        fields.insert(first.clone(), Some(String::new()));
                    }
                }
            }

            per_file_fields.insert(path, fields);
        }

        let (tokens_in, tokens_out) = *self.inner.tokens_per_call.lock().unwrap();
        Ok(BackendResponse {
            per_file_fields,
            tokens_in,
            tokens_out,
        })
    }
}
