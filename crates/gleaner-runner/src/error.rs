//! Error types for the execution engine

use gleaner_checkpoint::CheckpointError;
use gleaner_domain::StrategyError;
use thiserror::Error;

/// Errors that abort a run
///
/// Everything here is raised before or outside task execution. Per-file
/// failures are never errors at this level; they are captured into
/// `FileResult` and aggregated into the report.
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Malformed concurrency limits or other config values
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid strategy or combo definition
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Strategy references a backend no collaborator is registered for
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),

    /// Strategy references an extraction method no collaborator is registered for
    #[error("unknown extraction method '{0}'")]
    UnknownExtractor(String),

    /// Strategy references an extraction profile that is not defined
    #[error("unknown extraction profile '{0}'")]
    UnknownProfile(String),

    /// Checkpoint could not be read at run start
    ///
    /// Save failures during a run are logged and non-fatal; a corrupt
    /// checkpoint at resume time must surface rather than silently restart.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A worker task panicked or was aborted
    #[error("task failure: {0}")]
    Task(String),
}
