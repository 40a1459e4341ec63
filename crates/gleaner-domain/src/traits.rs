//! Trait definitions for external collaborators
//!
//! These traits define the boundary between the execution engine and the two
//! external services it consumes: text extraction and LLM field extraction.
//! Implementations live in `gleaner-backend`; the engine treats both as
//! opaque.

use crate::profile::ExtractionProfile;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Failure at a collaborator boundary
///
/// Every variant is a transport-class error from the engine's point of view:
/// the whole FileGroup attempt fails and every file in it becomes eligible
/// for retry.
#[derive(Error, Debug, Clone)]
pub enum CollaboratorError {
    /// Service unreachable or connection-level failure
    #[error("collaborator unreachable: {0}")]
    Unreachable(String),

    /// Call exceeded its time bound
    #[error("collaborator call timed out after {0}s")]
    Timeout(u64),

    /// Response arrived but could not be interpreted
    #[error("invalid collaborator response: {0}")]
    InvalidResponse(String),

    /// Input file could not be read or decoded
    #[error("unreadable input '{path}': {detail}")]
    UnreadableInput {
        /// File that failed
        path: PathBuf,
        /// Underlying reason
        detail: String,
    },
}

/// Payload for one file in a backend call
///
/// `Text` carries locally extracted text; `Raw` is the streaming bypass where
/// the backend reads the file itself.
#[derive(Debug, Clone)]
pub enum DocumentPayload {
    /// Locally extracted text for the file
    Text {
        /// Source file
        path: PathBuf,
        /// Extracted text
        text: String,
    },

    /// Raw file reference; the backend is responsible for reading it
    Raw {
        /// Source file
        path: PathBuf,
    },
}

impl DocumentPayload {
    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        match self {
            DocumentPayload::Text { path, .. } => path,
            DocumentPayload::Raw { path } => path,
        }
    }

    /// Rough size of the payload in bytes, used for token estimation
    pub fn approx_len(&self) -> usize {
        match self {
            DocumentPayload::Text { text, .. } => text.len(),
            DocumentPayload::Raw { path } => path.as_os_str().len(),
        }
    }
}

/// Structured response from one backend call
#[derive(Debug, Clone, Default)]
pub struct BackendResponse {
    /// Extracted fields per input file, keyed by file path
    ///
    /// A file absent from this map is treated as having produced no fields.
    pub per_file_fields: BTreeMap<PathBuf, BTreeMap<String, Option<String>>>,

    /// Input tokens charged for the whole call
    pub tokens_in: u64,

    /// Output tokens charged for the whole call
    pub tokens_out: u64,
}

/// Pluggable text-extraction service
///
/// Consumed as a black box returning raw text or failure. Bypassed entirely
/// when a strategy group has `streaming` set.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Implementation name, for logs and reports
    fn name(&self) -> &str;

    /// Extract raw text from one file
    async fn extract(&self, file: &Path) -> Result<String, CollaboratorError>;
}

/// Pluggable LLM field-extraction service
///
/// The engine supplies the payload and reads back structured fields plus
/// token counts; prompt construction is the backend's concern.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Implementation name, for logs and reports
    fn name(&self) -> &str;

    /// Extract structured fields for every file in `payload`
    async fn call(
        &self,
        payload: &[DocumentPayload],
        profile: &ExtractionProfile,
    ) -> Result<BackendResponse, CollaboratorError>;
}
