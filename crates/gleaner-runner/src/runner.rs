//! Top-level combo execution
//!
//! [`ComboRunner`] ties the pieces together: resolves a combo against the
//! collaborator registry, restores checkpoint state, drives the orchestrator,
//! persists progress as terminal results arrive, and scores the outcome
//! against the benchmark table when one is configured.

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::orchestrator::{StrategyOrchestrator, StrategyOutcome};
use crate::registry::{CollaboratorRegistry, ResolvedStrategy};
use crate::report::{RunReport, StrategyReport};
use crate::stats::merge_snapshots;
use gleaner_bench::{compare_file, BenchmarkIndex, ComparisonReport};
use gleaner_checkpoint::{CheckpointStore, RunState};
use gleaner_domain::{Combo, ExtractionProfile, FileResult, StatsSnapshot, StrategyGroup};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Handle for cancelling a run in flight
///
/// Cloneable and cheap; cancelling is idempotent. In-flight collaborator
/// calls run to completion, nothing new is submitted afterwards.
#[derive(Clone)]
pub struct CancellationHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    /// Signal cancellation
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Executes one combo end to end
pub struct ComboRunner {
    config: RunnerConfig,
    registry: CollaboratorRegistry,
    cancel: Arc<watch::Sender<bool>>,
}

impl ComboRunner {
    /// Create a runner over a registry of collaborators
    pub fn new(config: RunnerConfig, registry: CollaboratorRegistry) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            config,
            registry,
            cancel: Arc::new(tx),
        }
    }

    /// Handle for cancelling this runner's execution from another task
    pub fn cancellation(&self) -> CancellationHandle {
        CancellationHandle {
            tx: self.cancel.clone(),
        }
    }

    /// Run `combo` against `files`
    ///
    /// `defined` is the full set of configured strategy groups the combo's
    /// names resolve against. Checkpointing and benchmark comparison are
    /// enabled by the corresponding config paths; failures in either are
    /// logged and never abort the run itself.
    pub async fn execute(
        &self,
        combo: &Combo,
        defined: &[StrategyGroup],
        files: Vec<PathBuf>,
    ) -> Result<RunReport, RunnerError> {
        self.config.validate()?;

        let groups = combo.resolve(defined)?;
        let resolved = groups
            .into_iter()
            .map(|g| self.registry.resolve(g))
            .collect::<Result<Vec<ResolvedStrategy>, _>>()?;
        let strategy_count = resolved.len();
        let profiles: BTreeMap<String, Arc<ExtractionProfile>> = resolved
            .iter()
            .map(|s| (s.group.name.clone(), s.profile.clone()))
            .collect();

        let store = self.config.checkpoint_path.as_ref().map(CheckpointStore::new);
        let (mut state, resumed, seed_stats) = self.restore(&store, combo, &files)?;

        let work: Vec<PathBuf> = files
            .iter()
            .filter(|f| !resumed.contains_key(*f))
            .cloned()
            .collect();
        if !resumed.is_empty() {
            info!(
                combo = %combo.name,
                resumed = resumed.len(),
                remaining = work.len(),
                "resuming from checkpoint"
            );
        }

        let cancel_rx = self.cancel.subscribe();
        let deadline = self.config.run_timeout().map(|timeout| {
            let cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!("run deadline reached, cancelling");
                let _ = cancel.send(true);
            })
        });

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let orchestrator = StrategyOrchestrator::new(self.config.clone(), cancel_rx)
            .with_progress(progress_tx);
        let run = tokio::spawn(async move { orchestrator.run(resolved, work).await });

        // A file is checkpointed as completed once every strategy in the
        // combo has a terminal result for it. A successful result wins as
        // the stored record when strategies disagree.
        let mut terminal_counts: HashMap<PathBuf, usize> = HashMap::new();
        let mut best: HashMap<PathBuf, FileResult> = HashMap::new();
        let mut strategy_stats: BTreeMap<String, StatsSnapshot> = BTreeMap::new();
        while let Some(event) = progress_rx.recv().await {
            strategy_stats.insert(event.strategy.clone(), event.stats);
            for result in event.terminal {
                let count = terminal_counts.entry(result.path.clone()).or_insert(0);
                *count += 1;
                match best.get(&result.path) {
                    Some(existing) if existing.success && !result.success => {}
                    _ => {
                        best.insert(result.path.clone(), result.clone());
                    }
                }
                if *count == strategy_count {
                    if let Some(state) = state.as_mut() {
                        if let Some(record) = best.remove(&result.path) {
                            state.complete(record);
                        }
                    }
                }
            }
            // Refresh the stored counters so a crash between events resumes
            // with stats matching the completed set, not the stale seed.
            if let Some(state) = state.as_mut() {
                state.stats = strategy_stats
                    .values()
                    .fold(seed_stats.clone(), |acc, s| merge_snapshots(&acc, s));
            }
            self.persist(&store, &state);
        }

        let outcomes = run
            .await
            .map_err(|e| RunnerError::Task(e.to_string()))??;
        if let Some(deadline) = deadline {
            deadline.abort();
        }
        let interrupted = *self.cancel.borrow();

        let totals = outcomes
            .values()
            .fold(seed_stats, |acc, o| merge_snapshots(&acc, &o.stats));

        if let (Some(state), Some(store)) = (state.as_mut(), store.as_ref()) {
            state.stats = totals.clone();
            if !interrupted && state.pending.is_empty() {
                if let Err(e) = store.clear() {
                    warn!(error = %e, "failed to clear checkpoint");
                }
            } else if let Err(e) = store.save(state) {
                warn!(error = %e, "failed to save final checkpoint");
            }
        }

        let index = self.load_benchmark();
        let mut strategies = BTreeMap::new();
        for (name, outcome) in &outcomes {
            let mut report = StrategyReport::from_outcome(outcome);
            if let Some(index) = &index {
                report.comparison = Some(score_outcome(outcome, &profiles[name], index));
            }
            strategies.insert(name.clone(), report);
        }

        Ok(RunReport {
            combo: combo.name.clone(),
            interrupted,
            resumed: resumed.len(),
            strategies,
            totals,
        })
    }

    /// Load prior state from the checkpoint store, or start fresh
    ///
    /// A checkpoint that exists but cannot be parsed is an error; silently
    /// restarting would discard paid-for work without telling anyone.
    #[allow(clippy::type_complexity)]
    fn restore(
        &self,
        store: &Option<CheckpointStore>,
        combo: &Combo,
        files: &[PathBuf],
    ) -> Result<(Option<RunState>, BTreeMap<PathBuf, FileResult>, StatsSnapshot), RunnerError>
    {
        let Some(store) = store else {
            return Ok((None, BTreeMap::new(), StatsSnapshot::default()));
        };

        match store.load()? {
            Some(prev) if prev.combo == combo.name => {
                let resumed: BTreeMap<PathBuf, FileResult> = prev
                    .completed
                    .iter()
                    .filter(|(path, _)| files.contains(path))
                    .map(|(path, result)| (path.clone(), result.clone()))
                    .collect();
                let seed = prev.stats.clone();
                let mut state = prev;
                // Re-key pending to the current input set; files added since
                // the checkpoint become pending, removed ones are dropped.
                state.pending = files
                    .iter()
                    .filter(|f| !resumed.contains_key(*f))
                    .cloned()
                    .collect();
                Ok((Some(state), resumed, seed))
            }
            Some(prev) => {
                warn!(
                    found = %prev.combo,
                    expected = %combo.name,
                    "checkpoint belongs to a different combo, starting fresh"
                );
                Ok((
                    Some(RunState::new(&combo.name, files.to_vec())),
                    BTreeMap::new(),
                    StatsSnapshot::default(),
                ))
            }
            None => Ok((
                Some(RunState::new(&combo.name, files.to_vec())),
                BTreeMap::new(),
                StatsSnapshot::default(),
            )),
        }
    }

    /// Save intermediate state; persistence failure never aborts the run
    fn persist(&self, store: &Option<CheckpointStore>, state: &Option<RunState>) {
        if let (Some(store), Some(state)) = (store, state) {
            if let Err(e) = store.save(state) {
                warn!(error = %e, "checkpoint save failed, continuing");
            }
        }
    }

    /// Load the benchmark table; load failure disables comparison only
    fn load_benchmark(&self) -> Option<BenchmarkIndex> {
        let path = self.config.benchmark_path.as_ref()?;
        match BenchmarkIndex::load(path) {
            Ok(index) => {
                info!(rows = index.len(), "benchmark table loaded");
                Some(index)
            }
            Err(e) => {
                warn!(error = %e, "benchmark table unreadable, comparison skipped");
                None
            }
        }
    }
}

/// Score every terminal result of one strategy against the benchmark
fn score_outcome(
    outcome: &StrategyOutcome,
    profile: &ExtractionProfile,
    index: &BenchmarkIndex,
) -> ComparisonReport {
    let mut report = ComparisonReport::default();
    for result in outcome.results.values() {
        let (mismatches, had_row) = compare_file(result, &profile.mandatory_fields, index);
        report.add_file(mismatches, had_row);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use gleaner_backend::{MockBackend, MockExtractor};

    fn group(name: &str) -> StrategyGroup {
        StrategyGroup {
            name: name.into(),
            extraction_method: "mock".into(),
            backend: "mock".into(),
            max_files_per_request: 4,
            streaming: false,
            profile: "default".into(),
        }
    }

    fn registry(backend: MockBackend) -> CollaboratorRegistry {
        let mut registry = CollaboratorRegistry::new();
        registry.register_extractor("mock", Arc::new(MockExtractor::default()));
        registry.register_backend("mock", Arc::new(backend));
        registry.register_profile(ExtractionProfile::invoice_default());
        registry
    }

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("f{i}.pdf"))).collect()
    }

    #[tokio::test]
    async fn test_execute_happy_path() {
        let runner = ComboRunner::new(RunnerConfig::default(), registry(MockBackend::filled("v")));
        let combo = Combo::new("solo", vec!["a".to_string()]);

        let report = runner
            .execute(&combo, &[group("a")], files(6))
            .await
            .unwrap();

        assert!(!report.interrupted);
        assert_eq!(report.resumed, 0);
        assert_eq!(report.strategies["a"].successful, 6);
        assert_eq!(report.totals.files_successful, 6);
    }

    #[tokio::test]
    async fn test_unknown_combo_group_is_an_error() {
        let runner = ComboRunner::new(RunnerConfig::default(), registry(MockBackend::filled("v")));
        let combo = Combo::new("bad", vec!["missing".to_string()]);

        let err = runner
            .execute(&combo, &[group("a")], files(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Strategy(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_any_call() {
        let backend = MockBackend::filled("v");
        let config = RunnerConfig {
            max_attempts: 0,
            ..Default::default()
        };
        let runner = ComboRunner::new(config, registry(backend.clone()));
        let combo = Combo::new("solo", vec!["a".to_string()]);

        let err = runner
            .execute(&combo, &[group("a")], files(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Config(_)));
        assert_eq!(backend.call_count(), 0);
    }
}
