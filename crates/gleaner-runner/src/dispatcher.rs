//! FileGroup dispatch under bounded concurrency
//!
//! Partitions a file set into bounded-size groups and runs one processing
//! task per group, capped by a semaphore. Results are emitted incrementally
//! over a channel so checkpoint writes reflect live progress instead of
//! waiting for the whole strategy to finish.

use crate::registry::ResolvedStrategy;
use crate::stats::StatsAccumulator;
use gleaner_domain::{
    BackendResponse, CollaboratorError, DocumentPayload, FileError, FileErrorKind, FileGroup,
    FileResult,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Rough chars-per-token ratio used for payload token estimates
const CHARS_PER_TOKEN: usize = 4;

/// Result of one FileGroup attempt
#[derive(Debug)]
pub struct FileGroupOutcome {
    /// One result per file in the group, in group order
    ///
    /// `attempts` is set to 1 here; the orchestrator owns cumulative attempt
    /// counts.
    pub results: Vec<FileResult>,

    /// Wall-clock time of the attempt in milliseconds
    pub elapsed_ms: u64,
}

/// Dispatches FileGroups of one strategy through its collaborators
pub struct FileGroupDispatcher {
    strategy: ResolvedStrategy,
    stats: StatsAccumulator,
    call_timeout: Duration,
    cancel: watch::Receiver<bool>,
}

impl FileGroupDispatcher {
    /// Create a dispatcher for one resolved strategy
    pub fn new(
        strategy: ResolvedStrategy,
        stats: StatsAccumulator,
        call_timeout: Duration,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            strategy,
            stats,
            call_timeout,
            cancel,
        }
    }

    /// Dispatch `files` in groups of at most `max_files_per_request`, with at
    /// most `concurrency_limit` groups in flight
    ///
    /// Partitioning preserves input order deterministically. The returned
    /// channel yields each group's outcome as it completes; it closes when
    /// every submitted group is done. After cancellation no new group is
    /// submitted; unsubmitted files simply never appear on the channel.
    pub fn run(
        &self,
        files: Vec<PathBuf>,
        concurrency_limit: usize,
        is_retry: bool,
    ) -> mpsc::Receiver<FileGroupOutcome> {
        let groups = FileGroup::partition(&files, self.strategy.group.max_files_per_request);
        let (tx, rx) = mpsc::channel(groups.len().max(1));

        debug!(
            strategy = %self.strategy.group.name,
            groups = groups.len(),
            files = files.len(),
            "dispatching file groups"
        );

        let strategy = self.strategy.clone();
        let stats = self.stats.clone();
        let cancel = self.cancel.clone();
        let call_timeout = self.call_timeout;

        tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(concurrency_limit));
            let mut handles = Vec::new();

            for group in groups {
                if *cancel.borrow() {
                    warn!(
                        strategy = %strategy.group.name,
                        "cancelled; skipping remaining file groups"
                    );
                    break;
                }
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };

                let strategy = strategy.clone();
                let stats = stats.clone();
                let tx = tx.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = permit;
                    let outcome =
                        process_group(&strategy, group, call_timeout, &stats, is_retry).await;
                    let _ = tx.send(outcome).await;
                }));
            }

            drop(tx);
            for handle in handles {
                let _ = handle.await;
            }
        });

        rx
    }
}

/// Run one ProcessingTask: one FileGroup under one strategy group
async fn process_group(
    strategy: &ResolvedStrategy,
    group: FileGroup,
    call_timeout: Duration,
    stats: &StatsAccumulator,
    is_retry: bool,
) -> FileGroupOutcome {
    let start = Instant::now();
    stats.task_started();

    let results = if strategy.group.streaming {
        process_streaming(strategy, &group, call_timeout, stats, is_retry).await
    } else {
        process_batched(strategy, &group, call_timeout, stats, is_retry).await
    };

    stats.task_finished();
    let elapsed_ms = start.elapsed().as_millis() as u64;
    stats.record_group_elapsed(elapsed_ms);

    FileGroupOutcome {
        results,
        elapsed_ms,
    }
}

/// Non-streaming path: extract text per file, then one batched backend call
///
/// Any collaborator failure fails the whole group attempt; every file in the
/// group gets a transport-failed result, eligible for retry.
async fn process_batched(
    strategy: &ResolvedStrategy,
    group: &FileGroup,
    call_timeout: Duration,
    stats: &StatsAccumulator,
    is_retry: bool,
) -> Vec<FileResult> {
    let mut payload = Vec::with_capacity(group.len());
    for path in &group.files {
        match timeout(call_timeout, strategy.extractor.extract(path)).await {
            Ok(Ok(text)) => payload.push(DocumentPayload::Text {
                path: path.clone(),
                text,
            }),
            Ok(Err(e)) => return fail_group(group, &e),
            Err(_) => {
                return fail_group(group, &CollaboratorError::Timeout(call_timeout.as_secs()))
            }
        }
    }

    stats.record_dispatch(estimate_tokens(&payload));

    match timeout(
        call_timeout,
        strategy.backend.call(&payload, &strategy.profile),
    )
    .await
    {
        Ok(Ok(response)) => {
            stats.record_tokens(response.tokens_in, response.tokens_out, is_retry);
            results_from_response(group, &response, strategy)
        }
        Ok(Err(e)) => fail_group(group, &e),
        Err(_) => fail_group(group, &CollaboratorError::Timeout(call_timeout.as_secs())),
    }
}

/// Streaming path: local extraction bypassed, one backend call per file with
/// the raw file reference
async fn process_streaming(
    strategy: &ResolvedStrategy,
    group: &FileGroup,
    call_timeout: Duration,
    stats: &StatsAccumulator,
    is_retry: bool,
) -> Vec<FileResult> {
    let mut results = Vec::with_capacity(group.len());
    for path in &group.files {
        let payload = vec![DocumentPayload::Raw { path: path.clone() }];
        stats.record_dispatch(estimate_tokens(&payload));

        let result = match timeout(
            call_timeout,
            strategy.backend.call(&payload, &strategy.profile),
        )
        .await
        {
            Ok(Ok(response)) => {
                stats.record_tokens(response.tokens_in, response.tokens_out, is_retry);
                let single = FileGroup {
                    files: vec![path.clone()],
                };
                results_from_response(&single, &response, strategy).remove(0)
            }
            Ok(Err(e)) => transport_failure(path.clone(), &e),
            Err(_) => transport_failure(
                path.clone(),
                &CollaboratorError::Timeout(call_timeout.as_secs()),
            ),
        };
        results.push(result);
    }
    results
}

fn estimate_tokens(payload: &[DocumentPayload]) -> u64 {
    payload
        .iter()
        .map(|doc| (doc.approx_len() / CHARS_PER_TOKEN) as u64)
        .sum()
}

fn transport_failure(path: PathBuf, error: &CollaboratorError) -> FileResult {
    let mut result = FileResult::failed(path, FileErrorKind::Transport, error.to_string());
    result.attempts = 1;
    result
}

fn fail_group(group: &FileGroup, error: &CollaboratorError) -> Vec<FileResult> {
    warn!("file group attempt failed: {error}");
    group
        .files
        .iter()
        .map(|path| transport_failure(path.clone(), error))
        .collect()
}

/// Split one backend response into per-file results
///
/// Token counts are apportioned evenly across the group's files; the division
/// remainder goes to the first files so the per-file sums equal the call
/// totals. A file the backend omitted gets an empty field map and fails
/// content validation.
fn results_from_response(
    group: &FileGroup,
    response: &BackendResponse,
    strategy: &ResolvedStrategy,
) -> Vec<FileResult> {
    let n = group.len().max(1) as u64;
    let rem_in = response.tokens_in % n;
    let rem_out = response.tokens_out % n;

    group
        .files
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let i = i as u64;
            let tokens_in = response.tokens_in / n + u64::from(i < rem_in);
            let tokens_out = response.tokens_out / n + u64::from(i < rem_out);
            let fields = response
                .per_file_fields
                .get(path)
                .cloned()
                .unwrap_or_default();
            let mut result = FileResult {
                path: path.clone(),
                fields,
                success: false,
                tokens_in,
                tokens_out,
                error: None,
                attempts: 1,
            };

            let missing = result.missing_mandatory_fields(&strategy.profile);
            if missing.is_empty() {
                result.success = true;
            } else {
                result.error = Some(FileError {
                    kind: FileErrorKind::InvalidContent,
                    detail: format!("missing mandatory fields: {}", missing.join(", ")),
                });
            }
            result
        })
        .collect()
}
