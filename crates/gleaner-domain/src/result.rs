//! Per-file outcomes, retry records, and benchmark mismatch records

use crate::profile::ExtractionProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Sentinel value some backends emit for a field they could not extract
///
/// Treated identically to an absent or empty field when judging validity.
pub const NOT_FOUND_SENTINEL: &str = "Not found";

/// Classification of a per-file failure
///
/// Transport and content failures share the same retry state machine; they
/// differ only in the recorded error detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileErrorKind {
    /// Collaborator unreachable, timed out, or returned a malformed response
    Transport,

    /// Collaborator call succeeded but a mandatory field is missing, empty,
    /// or the "Not found" sentinel
    InvalidContent,

    /// Run was cancelled before the file reached a terminal state
    Cancelled,
}

/// Outcome of processing one file under one strategy
///
/// Mutated only by the attempt currently owning the file; once terminal it is
/// never reprocessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    /// Path of the input file
    pub path: PathBuf,

    /// Extracted fields; `None` marks a field the backend reported as absent
    pub fields: BTreeMap<String, Option<String>>,

    /// Whether the result satisfied the active profile
    pub success: bool,

    /// Input tokens charged by the backend for this file's share of the call
    pub tokens_in: u64,

    /// Output tokens charged by the backend for this file's share of the call
    pub tokens_out: u64,

    /// Error detail when `success` is false
    pub error: Option<FileError>,

    /// Number of attempts made so far (1-based after the first attempt)
    pub attempts: u32,
}

/// Structured error detail attached to a failed [`FileResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// Failure classification
    pub kind: FileErrorKind,

    /// Human-readable reason (missing field names, transport message, ...)
    pub detail: String,
}

impl FileResult {
    /// Create a result shell for a file that has not been attempted yet
    pub fn pending(path: PathBuf) -> Self {
        Self {
            path,
            fields: BTreeMap::new(),
            success: false,
            tokens_in: 0,
            tokens_out: 0,
            error: None,
            attempts: 0,
        }
    }

    /// A result marked failed with the given kind and detail
    pub fn failed(path: PathBuf, kind: FileErrorKind, detail: impl Into<String>) -> Self {
        Self {
            error: Some(FileError {
                kind,
                detail: detail.into(),
            }),
            ..Self::pending(path)
        }
    }

    /// Mandatory fields of `profile` that are absent, empty, or the sentinel
    pub fn missing_mandatory_fields(&self, profile: &ExtractionProfile) -> Vec<String> {
        profile
            .mandatory_fields
            .iter()
            .filter(|name| {
                !matches!(
                    self.fields.get(*name),
                    Some(Some(v)) if !v.trim().is_empty() && v.trim() != NOT_FOUND_SENTINEL
                )
            })
            .cloned()
            .collect()
    }

    /// Whether the result satisfies the profile's mandatory fields
    pub fn is_valid(&self, profile: &ExtractionProfile) -> bool {
        self.error.is_none() && self.missing_mandatory_fields(profile).is_empty()
    }
}

/// Per-file retry counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryRecord {
    /// Attempts made so far
    pub attempts: u32,

    /// Maximum attempts allowed before terminal failure
    pub max_attempts: u32,

    /// Reason for the most recent failure, if any
    pub last_failure: Option<String>,
}

impl RetryRecord {
    /// Create a fresh record with zero attempts
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            last_failure: None,
        }
    }

    /// Record one attempt; `attempts` never exceeds `max_attempts`
    pub fn record_attempt(&mut self, failure: Option<String>) {
        debug_assert!(self.attempts < self.max_attempts);
        self.attempts = (self.attempts + 1).min(self.max_attempts);
        self.last_failure = failure;
    }

    /// Whether the attempt budget is exhausted
    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// One benchmark discrepancy: a field whose extracted value differs from the
/// ground truth. Append-only; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MismatchRecord {
    /// File the mismatch belongs to
    pub file: PathBuf,

    /// Field name
    pub field: String,

    /// Expected value from the benchmark table
    pub expected: Option<String>,

    /// Actual extracted value
    pub actual: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ExtractionProfile {
        ExtractionProfile::new("test", vec!["INVOICE_NO".into(), "TOTAL".into()])
    }

    fn result_with(fields: &[(&str, Option<&str>)]) -> FileResult {
        let mut r = FileResult::pending(PathBuf::from("inv.pdf"));
        for (k, v) in fields {
            r.fields.insert(k.to_string(), v.map(String::from));
        }
        r
    }

    #[test]
    fn test_all_fields_present_is_valid() {
        let r = result_with(&[("INVOICE_NO", Some("INV-1")), ("TOTAL", Some("10.00"))]);
        assert!(r.is_valid(&profile()));
        assert!(r.missing_mandatory_fields(&profile()).is_empty());
    }

    #[test]
    fn test_missing_field_is_invalid() {
        let r = result_with(&[("INVOICE_NO", Some("INV-1"))]);
        assert_eq!(r.missing_mandatory_fields(&profile()), vec!["TOTAL"]);
        assert!(!r.is_valid(&profile()));
    }

    #[test]
    fn test_empty_field_is_invalid() {
        let r = result_with(&[("INVOICE_NO", Some("  ")), ("TOTAL", Some("10.00"))]);
        assert_eq!(r.missing_mandatory_fields(&profile()), vec!["INVOICE_NO"]);
    }

    #[test]
    fn test_sentinel_field_is_invalid() {
        let r = result_with(&[
            ("INVOICE_NO", Some(NOT_FOUND_SENTINEL)),
            ("TOTAL", Some("10.00")),
        ]);
        assert!(!r.is_valid(&profile()));
    }

    #[test]
    fn test_none_field_is_invalid() {
        let r = result_with(&[("INVOICE_NO", None), ("TOTAL", Some("10.00"))]);
        assert!(!r.is_valid(&profile()));
    }

    #[test]
    fn test_transport_error_is_invalid() {
        let r = FileResult::failed(
            PathBuf::from("inv.pdf"),
            FileErrorKind::Transport,
            "connection refused",
        );
        assert!(!r.is_valid(&profile()));
        assert_eq!(r.error.unwrap().kind, FileErrorKind::Transport);
    }

    #[test]
    fn test_retry_record_caps_attempts() {
        let mut record = RetryRecord::new(2);
        record.record_attempt(Some("missing TOTAL".into()));
        assert!(!record.exhausted());
        record.record_attempt(Some("missing TOTAL".into()));
        assert!(record.exhausted());
        assert_eq!(record.attempts, 2);
    }

    #[test]
    fn test_file_result_serde_roundtrip() {
        let r = result_with(&[("INVOICE_NO", Some("INV-1")), ("TOTAL", None)]);
        let json = serde_json::to_string(&r).unwrap();
        let back: FileResult = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
