//! Per-file retry state machine
//!
//! Retry is driven by semantic validity of the extracted content, not merely
//! transport failure: a file that "succeeds" at the API level but comes back
//! with an empty mandatory field is retried exactly like a timeout.
//!
//! The policy is pure; it classifies results and leaves all counter mutation
//! to the orchestrator.

use gleaner_domain::{ExtractionProfile, FileResult};

/// Lifecycle state of one file within a strategy run
///
/// `Success` and `FailedPermanent` are terminal; `NeedsRetry` loops the file
/// back to `Pending` for the next pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Not attempted yet (or re-queued for another pass)
    Pending,

    /// Terminal: result satisfied the active profile
    Success,

    /// Latest result invalid and attempt budget remains
    NeedsRetry,

    /// Terminal: still invalid at the attempt cap
    FailedPermanent,
}

impl FileState {
    /// Whether this state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileState::Success | FileState::FailedPermanent)
    }
}

/// Classifies file results against the attempt budget
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget
    pub fn new(max_attempts: u32) -> Self {
        debug_assert!(max_attempts >= 1);
        Self { max_attempts }
    }

    /// Attempt budget per file
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Classify a file's latest result
    ///
    /// `result.attempts` is the number of attempts made so far; the
    /// transition to `FailedPermanent` happens exactly when the result is
    /// still invalid at `attempts == max_attempts`.
    pub fn classify(&self, result: &FileResult, profile: &ExtractionProfile) -> FileState {
        if result.attempts == 0 {
            return FileState::Pending;
        }
        if result.is_valid(profile) {
            return FileState::Success;
        }
        if result.attempts < self.max_attempts {
            FileState::NeedsRetry
        } else {
            FileState::FailedPermanent
        }
    }

    /// Whether a file in this state should be re-submitted
    pub fn should_retry(&self, result: &FileResult, profile: &ExtractionProfile) -> bool {
        self.classify(result, profile) == FileState::NeedsRetry
    }
}
