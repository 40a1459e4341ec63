//! Thread-safe statistics accumulation for one logical run
//!
//! One accumulator instance is owned by the run and handed to every task;
//! there is no process-wide singleton. All mutation happens under a single
//! lock, so a snapshot is always a consistent point-in-time copy and no
//! update is ever lost under contention.

use gleaner_domain::StatsSnapshot;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Inner {
    snapshot: StatsSnapshot,
    /// Tasks currently executing; feeds the derived peak_concurrency
    current_concurrency: u64,
}

/// Shared counters and histograms for one run
///
/// Cloning shares the underlying counters. Numeric fields are summed,
/// list-valued fields appended; `total_tokens` and `peak_concurrency` are
/// recomputed inside the lock on every update that touches their components.
#[derive(Debug, Clone, Default)]
pub struct StatsAccumulator {
    inner: Arc<Mutex<Inner>>,
}

impl StatsAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an accumulator seeded from a checkpoint snapshot
    pub fn seeded(snapshot: StatsSnapshot) -> Self {
        let acc = Self::new();
        acc.inner.lock().unwrap().snapshot = snapshot;
        acc
    }

    /// A task entered execution
    pub fn task_started(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.current_concurrency += 1;
        inner.snapshot.peak_concurrency =
            inner.snapshot.peak_concurrency.max(inner.current_concurrency);
    }

    /// A task left execution
    pub fn task_finished(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.current_concurrency = inner.current_concurrency.saturating_sub(1);
    }

    /// A FileGroup was dispatched with the given payload token estimate
    pub fn record_dispatch(&self, estimated_tokens: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.snapshot.groups_dispatched += 1;
        inner.snapshot.estimated_tokens += estimated_tokens;
    }

    /// A FileGroup completed after `elapsed_ms`
    pub fn record_group_elapsed(&self, elapsed_ms: u64) {
        self.inner
            .lock()
            .unwrap()
            .snapshot
            .group_elapsed_ms
            .push(elapsed_ms);
    }

    /// Tokens charged by a backend call; retry-pass tokens are also folded
    /// into the retry-specific counter
    pub fn record_tokens(&self, tokens_in: u64, tokens_out: u64, is_retry: bool) {
        let mut inner = self.inner.lock().unwrap();
        let s = &mut inner.snapshot;
        s.tokens_in += tokens_in;
        s.tokens_out += tokens_out;
        s.total_tokens = s.tokens_in + s.tokens_out;
        if is_retry {
            s.actual_tokens_for_retries += tokens_in + tokens_out;
        }
    }

    /// A file reached a terminal state
    pub fn record_terminal(&self, success: bool) {
        let mut inner = self.inner.lock().unwrap();
        let s = &mut inner.snapshot;
        s.files_processed += 1;
        if success {
            s.files_successful += 1;
        } else {
            s.files_failed += 1;
        }
    }

    /// A retry pass re-submitted `files` files
    pub fn record_retry_pass(&self, files: u64) {
        let mut inner = self.inner.lock().unwrap();
        inner.snapshot.retry_passes += 1;
        inner.snapshot.files_retried += files;
    }

    /// Consistent point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().unwrap().snapshot.clone()
    }
}

/// Sum two snapshots field-wise
///
/// Numeric fields are added, the elapsed list is appended, and the derived
/// fields are recomputed (`total_tokens`) or maximized (`peak_concurrency` is
/// a high-water mark, not a sum).
pub fn merge_snapshots(a: &StatsSnapshot, b: &StatsSnapshot) -> StatsSnapshot {
    let mut merged = StatsSnapshot {
        files_processed: a.files_processed + b.files_processed,
        files_successful: a.files_successful + b.files_successful,
        files_failed: a.files_failed + b.files_failed,
        files_retried: a.files_retried + b.files_retried,
        retry_passes: a.retry_passes + b.retry_passes,
        tokens_in: a.tokens_in + b.tokens_in,
        tokens_out: a.tokens_out + b.tokens_out,
        total_tokens: 0,
        estimated_tokens: a.estimated_tokens + b.estimated_tokens,
        actual_tokens_for_retries: a.actual_tokens_for_retries + b.actual_tokens_for_retries,
        groups_dispatched: a.groups_dispatched + b.groups_dispatched,
        group_elapsed_ms: a.group_elapsed_ms.clone(),
        peak_concurrency: a.peak_concurrency.max(b.peak_concurrency),
    };
    merged.group_elapsed_ms.extend_from_slice(&b.group_elapsed_ms);
    merged.total_tokens = merged.tokens_in + merged.tokens_out;
    merged
}
