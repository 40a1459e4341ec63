//! End-to-end tests for combo execution
//!
//! Everything runs against the deterministic mock collaborators; no network,
//! no real documents. Checkpoints and benchmark tables live in tempdirs.

use gleaner_backend::{MockBackend, MockExtractor};
use gleaner_checkpoint::{CheckpointStore, RunState};
use gleaner_domain::{Combo, ExtractionProfile, FileResult, StrategyGroup};
use gleaner_runner::{CollaboratorRegistry, ComboRunner, RunnerConfig};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

fn group(name: &str, max_per_request: usize) -> StrategyGroup {
    StrategyGroup {
        name: name.into(),
        extraction_method: "mock".into(),
        backend: "mock".into(),
        max_files_per_request: max_per_request,
        streaming: false,
        profile: "default".into(),
    }
}

fn registry(backend: &MockBackend) -> CollaboratorRegistry {
    let mut registry = CollaboratorRegistry::new();
    registry.register_extractor("mock", Arc::new(MockExtractor::default()));
    registry.register_backend("mock", Arc::new(backend.clone()));
    registry.register_profile(ExtractionProfile::invoice_default());
    registry
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

fn solo_combo() -> Combo {
    Combo::new("solo", vec!["a".to_string()])
}

#[tokio::test]
async fn test_file_totals_add_up_per_strategy() {
    let backend = MockBackend::filled("INV-1");
    backend.invalid_first("f2.pdf", 10);
    let runner = ComboRunner::new(config(), registry(&backend));

    let report = runner
        .execute(&solo_combo(), &[group("a", 4)], files(9))
        .await
        .unwrap();

    let strategy = &report.strategies["a"];
    assert_eq!(
        strategy.successful + strategy.failed + strategy.pending,
        strategy.total_files
    );
    assert_eq!(strategy.successful, 8);
    assert_eq!(strategy.failed, 1);
    assert_eq!(strategy.pending, 0);
}

#[tokio::test]
async fn test_first_pass_success_is_never_redispatched() {
    let backend = MockBackend::filled("INV-1");
    let runner = ComboRunner::new(config(), registry(&backend));

    runner
        .execute(&solo_combo(), &[group("a", 3)], files(7))
        .await
        .unwrap();

    for file in files(7) {
        assert_eq!(backend.calls_for(&file), 1, "{} was re-dispatched", file.display());
    }
}

#[tokio::test]
async fn test_persistently_invalid_file_exhausts_attempt_budget() {
    let backend = MockBackend::filled("INV-1");
    backend.invalid_first("f0.pdf", 10);
    let runner = ComboRunner::new(config(), registry(&backend));

    let report = runner
        .execute(&solo_combo(), &[group("a", 4)], files(1))
        .await
        .unwrap();

    assert_eq!(report.strategies["a"].failed, 1);
    assert_eq!(backend.calls_for("f0.pdf"), 3);
    // Two retry passes after the initial one.
    assert_eq!(report.strategies["a"].stats.retry_passes, 2);
}

#[tokio::test]
async fn test_group_concurrency_ceiling_is_respected() {
    // 9 files in groups of 3 = 3 groups, only 2 allowed in flight.
    let backend = MockBackend::filled("INV-1").with_latency(Duration::from_millis(25));
    let runner = ComboRunner::new(config(), registry(&backend));

    runner
        .execute(&solo_combo(), &[group("a", 3)], files(9))
        .await
        .unwrap();

    assert!(backend.peak_in_flight() >= 1);
    assert!(
        backend.peak_in_flight() <= 2,
        "peak in flight was {}",
        backend.peak_in_flight()
    );
}

#[tokio::test]
async fn test_checkpoint_written_and_cleared_on_clean_completion() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("run.checkpoint.json");
    let backend = MockBackend::filled("INV-1");
    let runner = ComboRunner::new(
        RunnerConfig {
            checkpoint_path: Some(checkpoint.clone()),
            ..config()
        },
        registry(&backend),
    );

    let report = runner
        .execute(&solo_combo(), &[group("a", 2)], files(4))
        .await
        .unwrap();

    assert_eq!(report.totals.files_successful, 4);
    // Clean completion removes the checkpoint.
    assert!(!checkpoint.exists());
}

#[tokio::test]
async fn test_midrun_checkpoint_carries_matching_stats() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("run.checkpoint.json");
    let backend = MockBackend::filled("INV-1").with_latency(Duration::from_millis(30));
    let runner = ComboRunner::new(
        RunnerConfig {
            checkpoint_path: Some(checkpoint.clone()),
            max_concurrent_file_groups: 1,
            ..config()
        },
        registry(&backend),
    );

    let run = tokio::spawn(async move {
        runner
            .execute(&solo_combo(), &[group("a", 1)], files(6))
            .await
            .unwrap()
    });

    // Catch a snapshot while some files are done and others still pending;
    // its counters must cover the completed set, not the empty seed.
    let store = CheckpointStore::new(&checkpoint);
    let mut observed_midrun = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if let Ok(Some(state)) = store.load() {
            if !state.completed.is_empty() && !state.pending.is_empty() {
                assert!(
                    state.stats.files_processed >= state.completed.len() as u64,
                    "{} files completed but stats.files_processed = {}",
                    state.completed.len(),
                    state.stats.files_processed
                );
                assert!(state.stats.tokens_in > 0);
                observed_midrun = true;
                break;
            }
        }
    }

    let report = run.await.unwrap();
    assert!(observed_midrun, "no intermediate checkpoint observed");
    assert_eq!(report.totals.files_successful, 6);
}

#[tokio::test]
async fn test_resume_skips_completed_files_entirely() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("run.checkpoint.json");
    let input = files(4);

    // Simulate a prior interrupted run that finished f0 and f1.
    let mut prior = RunState::new("solo", input.clone());
    for done in ["f0.pdf", "f1.pdf"] {
        let mut result = FileResult::pending(PathBuf::from(done));
        result.success = true;
        result.attempts = 1;
        prior.complete(result);
    }
    CheckpointStore::new(&checkpoint).save(&prior).unwrap();

    let backend = MockBackend::filled("INV-1");
    let runner = ComboRunner::new(
        RunnerConfig {
            checkpoint_path: Some(checkpoint.clone()),
            ..config()
        },
        registry(&backend),
    );

    let report = runner
        .execute(&solo_combo(), &[group("a", 2)], input)
        .await
        .unwrap();

    assert_eq!(report.resumed, 2);
    // Completed files never reach any collaborator again.
    assert_eq!(backend.calls_for("f0.pdf"), 0);
    assert_eq!(backend.calls_for("f1.pdf"), 0);
    assert_eq!(backend.calls_for("f2.pdf"), 1);
    assert_eq!(backend.calls_for("f3.pdf"), 1);
    assert_eq!(report.strategies["a"].successful, 2);
}

#[tokio::test]
async fn test_checkpoint_for_other_combo_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let checkpoint = dir.path().join("run.checkpoint.json");

    let mut prior = RunState::new("other", files(2));
    let mut result = FileResult::pending(PathBuf::from("f0.pdf"));
    result.success = true;
    prior.complete(result);
    CheckpointStore::new(&checkpoint).save(&prior).unwrap();

    let backend = MockBackend::filled("INV-1");
    let runner = ComboRunner::new(
        RunnerConfig {
            checkpoint_path: Some(checkpoint),
            ..config()
        },
        registry(&backend),
    );

    let report = runner
        .execute(&solo_combo(), &[group("a", 2)], files(2))
        .await
        .unwrap();

    assert_eq!(report.resumed, 0);
    assert_eq!(backend.calls_for("f0.pdf"), 1);
}

#[tokio::test]
async fn test_multi_strategy_combo_runs_every_strategy_over_every_file() {
    let backend = MockBackend::filled("INV-1");
    let runner = ComboRunner::new(config(), registry(&backend));
    let combo = Combo::new("pair", vec!["a".to_string(), "b".to_string()]);

    let report = runner
        .execute(&combo, &[group("a", 2), group("b", 5)], files(5))
        .await
        .unwrap();

    assert_eq!(report.strategies.len(), 2);
    assert_eq!(report.strategies["a"].successful, 5);
    assert_eq!(report.strategies["b"].successful, 5);
    // Every file was seen once per strategy.
    for file in files(5) {
        assert_eq!(backend.calls_for(&file), 2);
    }
    assert_eq!(report.totals.files_successful, 10);
}

#[tokio::test]
async fn test_benchmark_comparison_scores_and_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let bench = dir.path().join("truth.csv");
    std::fs::write(
        &bench,
        "filename,INVOICE_NO,ISSUE_DATE,SELLER_NAME,TOTAL_GROSS\n\
         f0.pdf,INV-1,INV-1,INV-1,INV-1\n\
         f1.pdf,WRONG,INV-1,INV-1,INV-1\n",
    )
    .unwrap();

    let run = || async {
        let backend = MockBackend::filled("INV-1");
        let runner = ComboRunner::new(
            RunnerConfig {
                benchmark_path: Some(bench.clone()),
                ..config()
            },
            registry(&backend),
        );
        runner
            .execute(&solo_combo(), &[group("a", 4)], files(3))
            .await
            .unwrap()
    };

    let first = run().await;
    let second = run().await;

    let cmp = first.strategies["a"].comparison.as_ref().unwrap();
    assert_eq!(cmp.files_compared, 2);
    assert_eq!(cmp.files_skipped, 1);
    assert_eq!(cmp.total_mismatches(), 1);
    assert_eq!(cmp.mismatches[0].field, "INVOICE_NO");
    assert_eq!(cmp.mismatches[0].expected.as_deref(), Some("WRONG"));

    // Same inputs, same mismatch records.
    let cmp2 = second.strategies["a"].comparison.as_ref().unwrap();
    assert_eq!(cmp.mismatches, cmp2.mismatches);
    assert_eq!(cmp.files_with_mismatches, cmp2.files_with_mismatches);
}

#[tokio::test]
async fn test_missing_benchmark_file_skips_comparison_without_failing() {
    let backend = MockBackend::filled("INV-1");
    let runner = ComboRunner::new(
        RunnerConfig {
            benchmark_path: Some(PathBuf::from("/nonexistent/truth.csv")),
            ..config()
        },
        registry(&backend),
    );

    let report = runner
        .execute(&solo_combo(), &[group("a", 4)], files(2))
        .await
        .unwrap();

    assert!(report.strategies["a"].comparison.is_none());
    assert_eq!(report.strategies["a"].successful, 2);
}

#[tokio::test]
async fn test_scripted_fields_survive_to_the_report() {
    let backend = MockBackend::filled("INV-1");
    let mut fields: BTreeMap<String, Option<String>> = BTreeMap::new();
    fields.insert("INVOICE_NO".into(), Some("FV/2024/001".into()));
    fields.insert("ISSUE_DATE".into(), Some("2024-01-31".into()));
    fields.insert("SELLER_NAME".into(), Some("Acme".into()));
    fields.insert("TOTAL_GROSS".into(), Some("123.45".into()));
    backend.script("f0.pdf", fields);

    let runner = ComboRunner::new(config(), registry(&backend));
    let report = runner
        .execute(&solo_combo(), &[group("a", 1)], files(1))
        .await
        .unwrap();

    assert_eq!(report.strategies["a"].successful, 1);
    assert_eq!(report.totals.files_processed, 1);
}
