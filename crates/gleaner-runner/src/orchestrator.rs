//! Strategy-level orchestration
//!
//! Runs each strategy group of a combo as an independent logical sub-run with
//! its own dispatcher and its own stats slice, bounded by an outer semaphore.
//! Strategies may use backends with different rate limits and failure
//! characteristics; a slow or failing strategy must not block the others.
//!
//! Retry execution also lives here: after each pass the files classified
//! `NeedsRetry` are regrouped into fresh FileGroups and re-submitted through
//! the same dispatcher until terminal or out of attempts.

use crate::config::RunnerConfig;
use crate::dispatcher::FileGroupDispatcher;
use crate::error::RunnerError;
use crate::registry::ResolvedStrategy;
use crate::retry::{FileState, RetryPolicy};
use crate::stats::StatsAccumulator;
use gleaner_domain::{FileErrorKind, FileResult, RetryRecord, StatsSnapshot};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{debug, info};

/// Terminal results finalized for one strategy, emitted as they happen
///
/// The combo runner folds these into the run state and checkpoints on each
/// event, so a crash loses at most the FileGroups still in flight.
#[derive(Debug)]
pub struct ProgressEvent {
    /// Strategy that finalized the results
    pub strategy: String,

    /// Files that just reached a terminal state
    pub terminal: Vec<FileResult>,

    /// The strategy's cumulative stats slice as of this batch, so
    /// checkpoints written mid-run carry counters matching the completed
    /// set instead of a stale seed
    pub stats: StatsSnapshot,
}

/// Outcome of one strategy's sub-run
#[derive(Debug)]
pub struct StrategyOutcome {
    /// Strategy group name
    pub strategy: String,

    /// Size of the input file set handed to this strategy
    pub total_files: usize,

    /// Terminal results keyed by path
    pub results: BTreeMap<PathBuf, FileResult>,

    /// Files abandoned non-terminal because the run was cancelled; they stay
    /// pending in the checkpoint and are surfaced in the report as cancelled
    pub cancelled: BTreeMap<PathBuf, FileResult>,

    /// This strategy's stats slice
    pub stats: StatsSnapshot,

    /// Wall-clock time of the sub-run in milliseconds
    pub elapsed_ms: u64,
}

/// Runs the strategy groups of a combo under an outer concurrency bound
pub struct StrategyOrchestrator {
    config: RunnerConfig,
    cancel: watch::Receiver<bool>,
    progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl StrategyOrchestrator {
    /// Create an orchestrator with the given limits and cancellation signal
    pub fn new(config: RunnerConfig, cancel: watch::Receiver<bool>) -> Self {
        Self {
            config,
            cancel,
            progress: None,
        }
    }

    /// Attach a progress sink receiving terminal-result batches
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run every strategy against `files`, at most
    /// `max_concurrent_strategies` at a time
    ///
    /// Results are merged into one map keyed by strategy name.
    pub async fn run(
        &self,
        strategies: Vec<ResolvedStrategy>,
        files: Vec<PathBuf>,
    ) -> Result<BTreeMap<String, StrategyOutcome>, RunnerError> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_strategies));
        let mut handles = Vec::new();

        for strategy in strategies {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| RunnerError::Task(e.to_string()))?;
            let files = files.clone();
            let config = self.config.clone();
            let cancel = self.cancel.clone();
            let progress = self.progress.clone();

            handles.push(tokio::spawn(async move {
                let _permit = permit;
                run_strategy(strategy, files, &config, cancel, progress).await
            }));
        }

        let mut outcomes = BTreeMap::new();
        for handle in handles {
            let outcome = handle
                .await
                .map_err(|e| RunnerError::Task(e.to_string()))?;
            outcomes.insert(outcome.strategy.clone(), outcome);
        }
        Ok(outcomes)
    }
}

/// One strategy's sub-run: dispatch, classify, retry until terminal
async fn run_strategy(
    strategy: ResolvedStrategy,
    files: Vec<PathBuf>,
    config: &RunnerConfig,
    cancel: watch::Receiver<bool>,
    progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
) -> StrategyOutcome {
    let start = Instant::now();
    let name = strategy.group.name.clone();
    let total_files = files.len();

    let stats = StatsAccumulator::new();
    let policy = RetryPolicy::new(config.max_attempts);
    let dispatcher = FileGroupDispatcher::new(
        strategy.clone(),
        stats.clone(),
        config.call_timeout(),
        cancel.clone(),
    );

    info!(strategy = %name, files = total_files, "strategy started");

    let mut records: HashMap<PathBuf, RetryRecord> = HashMap::new();
    let mut terminal: BTreeMap<PathBuf, FileResult> = BTreeMap::new();
    let mut outstanding = files.clone();
    let mut pass: u32 = 0;

    // Each pass submits every outstanding file once; after max_attempts
    // passes nothing can remain non-terminal.
    while !outstanding.is_empty() && pass < config.max_attempts && !*cancel.borrow() {
        if pass > 0 {
            stats.record_retry_pass(outstanding.len() as u64);
            info!(
                strategy = %name,
                pass,
                files = outstanding.len(),
                "retry pass"
            );
        }

        let mut rx = dispatcher.run(
            outstanding.clone(),
            config.max_concurrent_file_groups,
            pass > 0,
        );
        let mut needs_retry = Vec::new();

        while let Some(outcome) = rx.recv().await {
            let mut batch_terminal = Vec::new();

            for mut result in outcome.results {
                let record = records
                    .entry(result.path.clone())
                    .or_insert_with(|| RetryRecord::new(config.max_attempts));
                record.record_attempt(result.error.as_ref().map(|e| e.detail.clone()));
                result.attempts = record.attempts;

                match policy.classify(&result, &strategy.profile) {
                    FileState::Success => {
                        stats.record_terminal(true);
                        batch_terminal.push(result);
                    }
                    FileState::FailedPermanent => {
                        stats.record_terminal(false);
                        batch_terminal.push(result);
                    }
                    FileState::NeedsRetry => {
                        debug!(
                            strategy = %name,
                            file = %result.path.display(),
                            attempts = result.attempts,
                            "needs retry"
                        );
                        needs_retry.push(result.path.clone());
                    }
                    // Dispatcher results always carry at least one attempt.
                    FileState::Pending => {}
                }
            }

            if !batch_terminal.is_empty() {
                for result in &batch_terminal {
                    terminal.insert(result.path.clone(), result.clone());
                }
                if let Some(progress) = &progress {
                    let _ = progress.send(ProgressEvent {
                        strategy: name.clone(),
                        terminal: batch_terminal,
                        stats: stats.snapshot(),
                    });
                }
            }
        }

        outstanding = needs_retry;
        pass += 1;
    }

    // Files without a terminal result after a cancelled run are marked
    // cancelled for the report; they are not counted as processed and the
    // checkpoint keeps them pending for the next run.
    let mut cancelled = BTreeMap::new();
    if *cancel.borrow() {
        for path in &files {
            if terminal.contains_key(path) {
                continue;
            }
            let mut result = FileResult::failed(
                path.clone(),
                FileErrorKind::Cancelled,
                "run cancelled before completion",
            );
            if let Some(record) = records.get(path) {
                result.attempts = record.attempts;
            }
            cancelled.insert(path.clone(), result);
        }
    }

    let snapshot = stats.snapshot();
    info!(
        strategy = %name,
        successful = snapshot.files_successful,
        failed = snapshot.files_failed,
        retried = snapshot.files_retried,
        "strategy finished"
    );

    StrategyOutcome {
        strategy: name,
        total_files,
        results: terminal,
        cancelled,
        stats: snapshot,
        elapsed_ms: start.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CollaboratorRegistry;
    use gleaner_backend::{MockBackend, MockExtractor};
    use gleaner_domain::{ExtractionProfile, StrategyGroup};
    use std::time::Duration;

    fn resolved(name: &str, backend: MockBackend, max_per_request: usize) -> ResolvedStrategy {
        let mut registry = CollaboratorRegistry::new();
        registry.register_extractor("mock", Arc::new(MockExtractor::default()));
        registry.register_backend("mock", Arc::new(backend));
        registry.register_profile(ExtractionProfile::invoice_default());
        registry
            .resolve(&StrategyGroup {
                name: name.into(),
                extraction_method: "mock".into(),
                backend: "mock".into(),
                max_files_per_request: max_per_request,
                streaming: false,
                profile: "default".into(),
            })
            .unwrap()
    }

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("f{i}.pdf"))).collect()
    }

    fn config() -> RunnerConfig {
        RunnerConfig {
            max_concurrent_strategies: 2,
            max_concurrent_file_groups: 2,
            max_attempts: 3,
            call_timeout_secs: 5,
            ..Default::default()
        }
    }

    fn orchestrator(config: RunnerConfig) -> (StrategyOrchestrator, watch::Sender<bool>) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        (StrategyOrchestrator::new(config, cancel_rx), cancel_tx)
    }

    #[tokio::test]
    async fn test_clean_run_all_successful() {
        let (orchestrator, _cancel) = orchestrator(config());
        let strategies = vec![resolved("a", MockBackend::filled("v"), 4)];

        let outcomes = orchestrator.run(strategies, files(10)).await.unwrap();
        let outcome = &outcomes["a"];

        assert_eq!(outcome.total_files, 10);
        assert_eq!(outcome.results.len(), 10);
        assert_eq!(outcome.stats.files_successful, 10);
        assert_eq!(outcome.stats.files_failed, 0);
        // No retries on a clean run
        assert_eq!(outcome.stats.files_retried, 0);
        for result in outcome.results.values() {
            assert_eq!(result.attempts, 1);
        }
    }

    #[tokio::test]
    async fn test_invalid_file_retried_then_succeeds() {
        let backend = MockBackend::filled("v");
        backend.invalid_first("f1.pdf", 1);
        let (orchestrator, _cancel) = orchestrator(config());

        let outcomes = orchestrator
            .run(vec![resolved("a", backend.clone(), 4)], files(3))
            .await
            .unwrap();
        let outcome = &outcomes["a"];

        assert_eq!(outcome.stats.files_successful, 3);
        assert_eq!(outcome.stats.files_retried, 1);
        assert_eq!(outcome.stats.retry_passes, 1);
        assert_eq!(outcome.results[&PathBuf::from("f1.pdf")].attempts, 2);
        // The clean files were not re-dispatched.
        assert_eq!(backend.calls_for("f0.pdf"), 1);
        assert_eq!(backend.calls_for("f1.pdf"), 2);
    }

    #[tokio::test]
    async fn test_persistently_invalid_file_fails_at_cap() {
        let backend = MockBackend::filled("v");
        backend.invalid_first("f0.pdf", 10);
        let (orchestrator, _cancel) = orchestrator(config());

        let outcomes = orchestrator
            .run(vec![resolved("a", backend, 4)], files(1))
            .await
            .unwrap();
        let outcome = &outcomes["a"];

        let result = &outcome.results[&PathBuf::from("f0.pdf")];
        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(outcome.stats.files_failed, 1);
        assert_eq!(outcome.stats.files_processed, 1);
    }

    #[tokio::test]
    async fn test_transport_failure_retried_as_group() {
        let backend = MockBackend::filled("v");
        backend.fail_transport(1);
        let (orchestrator, _cancel) = orchestrator(config());

        let outcomes = orchestrator
            .run(vec![resolved("a", backend, 4)], files(4))
            .await
            .unwrap();
        let outcome = &outcomes["a"];

        // First call fails the whole group; second pass succeeds.
        assert_eq!(outcome.stats.files_successful, 4);
        assert_eq!(outcome.stats.files_retried, 4);
    }

    #[tokio::test]
    async fn test_strategies_run_independently() {
        let good = MockBackend::filled("v");
        let bad = MockBackend::filled("v");
        bad.invalid_first("f0.pdf", 10);
        let (orchestrator, _cancel) = orchestrator(config());

        let outcomes = orchestrator
            .run(
                vec![resolved("good", good, 4), resolved("bad", bad, 4)],
                files(2),
            )
            .await
            .unwrap();

        assert_eq!(outcomes["good"].stats.files_successful, 2);
        assert_eq!(outcomes["bad"].stats.files_successful, 1);
        assert_eq!(outcomes["bad"].stats.files_failed, 1);
    }

    #[tokio::test]
    async fn test_progress_events_cover_all_terminal_files() {
        let (orchestrator, _cancel) = orchestrator(config());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let orchestrator = orchestrator.with_progress(tx);

        let outcomes = orchestrator
            .run(vec![resolved("a", MockBackend::filled("v"), 2)], files(5))
            .await
            .unwrap();
        drop(orchestrator);

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.strategy, "a");
            // The stats slice carried by the event covers at least the
            // terminal files announced so far.
            assert!(event.stats.files_processed >= (seen.len() + event.terminal.len()) as u64);
            seen.extend(event.terminal.into_iter().map(|r| r.path));
        }
        seen.sort();
        let mut expected = files(5);
        expected.sort();
        assert_eq!(seen, expected);
        assert_eq!(outcomes["a"].results.len(), 5);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_files_non_terminal() {
        let backend = MockBackend::filled("v").with_latency(Duration::from_millis(40));
        let (orchestrator, cancel) = orchestrator(RunnerConfig {
            max_concurrent_file_groups: 1,
            ..config()
        });

        let run = orchestrator.run(vec![resolved("a", backend, 1)], files(8));
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = cancel.send(true);
        });

        let outcomes = run.await.unwrap();
        let outcome = &outcomes["a"];
        // At least one file never reached a terminal state.
        assert!(outcome.results.len() < 8);
        assert_eq!(
            outcome.stats.files_processed,
            outcome.results.len() as u64
        );
        // Every non-terminal file is surfaced as cancelled, and only those.
        assert_eq!(outcome.results.len() + outcome.cancelled.len(), 8);
        for result in outcome.cancelled.values() {
            assert!(!result.success);
            assert_eq!(
                result.error.as_ref().unwrap().kind,
                FileErrorKind::Cancelled
            );
        }
    }
}
