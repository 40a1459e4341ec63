//! Run reports
//!
//! Aggregates per-strategy outcomes into a serializable report: file counts,
//! token accounting, retry rates and optional benchmark accuracy. The CLI
//! writes this as JSON and renders a plain-text summary from it.

use crate::orchestrator::StrategyOutcome;
use gleaner_bench::ComparisonReport;
use gleaner_domain::{FileResult, StatsSnapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Per-strategy slice of a run report
#[derive(Debug, Clone, Serialize)]
pub struct StrategyReport {
    /// Strategy group name
    pub strategy: String,

    /// Size of the input file set
    pub total_files: usize,

    /// Files that ended successful
    pub successful: usize,

    /// Files that ended in permanent failure
    pub failed: usize,

    /// Files that never reached a terminal state (cancelled or timed out)
    pub pending: usize,

    /// Wall-clock time of the strategy sub-run in milliseconds
    pub elapsed_ms: u64,

    /// This strategy's stats slice
    pub stats: StatsSnapshot,

    /// Terminal per-file results, keyed by path
    pub results: BTreeMap<PathBuf, FileResult>,

    /// Benchmark accuracy, present when a benchmark table was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonReport>,
}

/// Complete outcome of one combo run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Combo name
    pub combo: String,

    /// Whether the run was cut short by cancellation or the run deadline
    pub interrupted: bool,

    /// Files restored from a checkpoint and never re-dispatched
    pub resumed: usize,

    /// Per-strategy reports, keyed by strategy name
    pub strategies: BTreeMap<String, StrategyReport>,

    /// Stats rolled up across all strategies
    pub totals: StatsSnapshot,
}

impl StrategyReport {
    /// Build a report slice from a finished strategy sub-run
    ///
    /// Files abandoned at cancellation count as pending, not failed, but
    /// their records appear in `results` so error listings can name them.
    pub fn from_outcome(outcome: &StrategyOutcome) -> Self {
        let successful = outcome.results.values().filter(|r| r.success).count();
        let failed = outcome.results.len() - successful;
        let mut results = outcome.results.clone();
        results.extend(
            outcome
                .cancelled
                .iter()
                .map(|(path, result)| (path.clone(), result.clone())),
        );
        Self {
            strategy: outcome.strategy.clone(),
            total_files: outcome.total_files,
            successful,
            failed,
            pending: outcome.total_files - outcome.results.len(),
            elapsed_ms: outcome.elapsed_ms,
            stats: outcome.stats.clone(),
            results,
            comparison: None,
        }
    }

    /// Results that ended in permanent failure
    pub fn failures(&self) -> impl Iterator<Item = &FileResult> {
        self.results.values().filter(|r| !r.success)
    }
}

impl RunReport {
    /// Plain-text summary for terminal output
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("combo: {}\n", self.combo));
        if self.interrupted {
            out.push_str("status: interrupted\n");
        }
        if self.resumed > 0 {
            out.push_str(&format!("resumed: {} files from checkpoint\n", self.resumed));
        }
        for report in self.strategies.values() {
            out.push_str(&format!(
                "  {}: {}/{} ok, {} failed, {} pending, {} retried ({:.1}%), {} tokens, {}ms\n",
                report.strategy,
                report.successful,
                report.total_files,
                report.failed,
                report.pending,
                report.stats.files_retried,
                report.stats.retry_percentage(),
                report.stats.total_tokens,
                report.elapsed_ms,
            ));
            if let Some(cmp) = &report.comparison {
                out.push_str(&format!(
                    "    benchmark: {} mismatches in {} files ({} compared, {} skipped)\n",
                    cmp.total_mismatches(),
                    cmp.files_with_mismatches,
                    cmp.files_compared,
                    cmp.files_skipped,
                ));
            }
        }
        out.push_str(&format!(
            "totals: {} processed, {} ok, {} failed, {} tokens (efficiency {:.2})\n",
            self.totals.files_processed,
            self.totals.files_successful,
            self.totals.files_failed,
            self.totals.total_tokens,
            self.totals.token_efficiency(),
        ));
        out
    }
}
