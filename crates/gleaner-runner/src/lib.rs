//! Gleaner Execution Engine
//!
//! Drives extraction strategy combos over a file set with bounded
//! concurrency, validity-driven retries, incremental checkpointing and
//! optional benchmark scoring.
//!
//! # Execution model
//!
//! A [`ComboRunner`] resolves a [`Combo`](gleaner_domain::Combo) into
//! strategies via the [`CollaboratorRegistry`], then hands them to the
//! [`StrategyOrchestrator`], which runs each strategy as an independent
//! sub-run under an outer concurrency bound. Within a strategy the
//! [`FileGroupDispatcher`] partitions files into FileGroups and keeps at most
//! a configured number of groups in flight. Results stream back as each
//! group completes; the [`RetryPolicy`] classifies every file result, and
//! files that came back invalid are regrouped and re-dispatched until they
//! succeed or exhaust their attempt budget.
//!
//! Interruption is cooperative: a [`CancellationHandle`] or the run deadline
//! stops new submissions while in-flight calls drain, and the checkpoint
//! keeps whatever was terminal at that point.

#![warn(missing_docs)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod retry;
pub mod runner;
pub mod stats;

pub use config::RunnerConfig;
pub use dispatcher::{FileGroupDispatcher, FileGroupOutcome};
pub use error::RunnerError;
pub use orchestrator::{ProgressEvent, StrategyOrchestrator, StrategyOutcome};
pub use registry::{CollaboratorRegistry, ResolvedStrategy};
pub use report::{RunReport, StrategyReport};
pub use retry::{FileState, RetryPolicy};
pub use runner::{CancellationHandle, ComboRunner};
pub use stats::{merge_snapshots, StatsAccumulator};
