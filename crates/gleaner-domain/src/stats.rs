//! Point-in-time statistics snapshot for one logical run
//!
//! The thread-safe accumulator that produces these lives in `gleaner-runner`;
//! the snapshot itself is plain data so checkpoints and reports can carry it.

use serde::{Deserialize, Serialize};

/// Consistent copy of a run's counters, taken under the accumulator's lock
///
/// `total_tokens` is derived from `tokens_in + tokens_out` and recomputed on
/// every update that touches either component; it is stored here so consumers
/// never recompute it inconsistently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Files that reached a terminal state
    pub files_processed: u64,

    /// Files that ended in success
    pub files_successful: u64,

    /// Files that ended in terminal failure
    pub files_failed: u64,

    /// Retry attempts made across all files (one per re-dispatch of a file)
    pub files_retried: u64,

    /// Retry passes executed
    pub retry_passes: u64,

    /// Input tokens charged by backends
    pub tokens_in: u64,

    /// Output tokens charged by backends
    pub tokens_out: u64,

    /// Derived: `tokens_in + tokens_out`
    pub total_tokens: u64,

    /// Estimated tokens for dispatched payloads (payload bytes / 4)
    pub estimated_tokens: u64,

    /// Actual tokens spent on retry attempts only
    pub actual_tokens_for_retries: u64,

    /// FileGroups dispatched
    pub groups_dispatched: u64,

    /// Wall-clock time per completed FileGroup, in milliseconds (appended)
    pub group_elapsed_ms: Vec<u64>,

    /// Derived: highest number of concurrently executing tasks observed
    pub peak_concurrency: u64,
}

impl StatsSnapshot {
    /// Percentage of processed files that needed at least one retry attempt
    pub fn retry_percentage(&self) -> f64 {
        if self.files_processed == 0 {
            0.0
        } else {
            self.files_retried as f64 * 100.0 / self.files_processed as f64
        }
    }

    /// Ratio of actual to estimated tokens; 0 when nothing was estimated
    pub fn token_efficiency(&self) -> f64 {
        if self.estimated_tokens == 0 {
            0.0
        } else {
            self.total_tokens as f64 / self.estimated_tokens as f64
        }
    }
}
