//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid command-line input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Execution failure from the runner
    #[error(transparent)]
    Runner(#[from] gleaner_runner::RunnerError),

    /// Strategy or combo definition failure
    #[error(transparent)]
    Strategy(#[from] gleaner_domain::StrategyError),

    /// Checkpoint store failure
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] gleaner_checkpoint::CheckpointError),
}
