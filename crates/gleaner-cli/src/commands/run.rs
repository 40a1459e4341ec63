//! Run command implementation.

use crate::cli::RunArgs;
use crate::config::ProfileStore;
use crate::discover::discover_inputs;
use crate::error::{CliError, Result};
use crate::output;
use gleaner_backend::{MockBackend, MockExtractor, OllamaBackend, RemoteExtractor};
use gleaner_checkpoint::CheckpointStore;
use gleaner_domain::{Combo, StrategyGroup};
use gleaner_runner::{CollaboratorRegistry, ComboRunner};
use std::sync::Arc;
use tracing::{info, warn};

/// Execute the run command.
pub async fn execute_run(args: RunArgs, store: &ProfileStore) -> Result<()> {
    let mut groups = store.strategy_groups();
    if let Some(streaming) = args.streaming {
        for group in &mut groups {
            group.streaming = streaming;
        }
    }

    let combo = match (&args.combo, args.strategy.is_empty()) {
        (Some(name), _) => store.combo(name)?,
        (None, false) => Combo::new("adhoc", args.strategy.clone()),
        (None, true) => {
            return Err(CliError::InvalidInput(
                "give --combo or at least one --strategy".to_string(),
            ))
        }
    };

    let files = discover_inputs(&args.input, &args.extensions)?;
    if files.is_empty() {
        return Err(CliError::InvalidInput(format!(
            "no matching input files under '{}'",
            args.input.display()
        )));
    }

    // Without --resume an existing checkpoint is stale state from some
    // earlier run; drop it before it can be mistaken for ours.
    if let Some(checkpoint) = &args.checkpoint {
        if !args.resume {
            CheckpointStore::new(checkpoint).clear()?;
        }
    }

    let mut config = store.runner_config(args.checkpoint.clone(), args.benchmark.clone());
    if let Some(v) = args.max_concurrent_strategies {
        config.max_concurrent_strategies = v;
    }
    if let Some(v) = args.max_concurrent_file_groups {
        config.max_concurrent_file_groups = v;
    }
    if let Some(v) = args.max_attempts {
        config.max_attempts = v;
    }
    if let Some(v) = args.call_timeout {
        config.call_timeout_secs = v;
    }
    if let Some(v) = args.run_timeout {
        config.run_timeout_secs = Some(v);
    }

    let registry = build_registry(store, &groups, args.dry_run)?;
    let runner = ComboRunner::new(config, registry);

    let cancel = runner.cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, draining in-flight work");
            cancel.cancel();
        }
    });

    info!(combo = %combo.name, files = files.len(), "run started");
    let report = runner.execute(&combo, &groups, files).await?;

    let written = output::write_all(&report, &args.output)?;
    print!("{}", report.summary());
    for path in &written {
        println!("wrote {}", path.display());
    }
    if report.interrupted {
        warn!("run was interrupted; the checkpoint keeps the unfinished files");
    }
    Ok(())
}

/// Instantiate the collaborators every strategy group refers to
///
/// `dry_run` swaps in deterministic mocks under the configured names, so a
/// profile store can be exercised without any services running.
fn build_registry(
    store: &ProfileStore,
    groups: &[StrategyGroup],
    dry_run: bool,
) -> Result<CollaboratorRegistry> {
    let mut registry = CollaboratorRegistry::new();
    for profile in store.profiles() {
        registry.register_profile(profile);
    }

    registry.register_extractor("mock", Arc::new(MockExtractor::default()));
    registry.register_backend("mock", Arc::new(MockBackend::filled("mock")));

    for group in groups {
        if group.extraction_method != "mock" {
            if dry_run || group.streaming {
                // Streaming strategies never call the extractor; the mock
                // just satisfies resolution.
                registry.register_extractor(
                    &group.extraction_method,
                    Arc::new(MockExtractor::default()),
                );
            } else {
                let extractor = store.extractor.as_ref().ok_or_else(|| {
                    CliError::Config(format!(
                        "extraction method '{}' needs an [extractor] endpoint",
                        group.extraction_method
                    ))
                })?;
                registry.register_extractor(
                    &group.extraction_method,
                    Arc::new(RemoteExtractor::new(
                        &extractor.endpoint,
                        &group.extraction_method,
                    )),
                );
            }
        }

        if group.backend != "mock" {
            if dry_run {
                registry.register_backend(&group.backend, Arc::new(MockBackend::filled("dry run")));
            } else {
                let entry = store.backend.get(&group.backend).ok_or_else(|| {
                    CliError::Config(format!("backend '{}' is not configured", group.backend))
                })?;
                registry.register_backend(
                    &group.backend,
                    Arc::new(OllamaBackend::new(&entry.endpoint, &entry.model)),
                );
            }
        }
    }
    Ok(registry)
}
