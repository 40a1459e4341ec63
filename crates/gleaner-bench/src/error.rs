//! Error types for benchmark loading

use thiserror::Error;

/// Errors that can occur while loading a benchmark table
///
/// A benchmark-load error never fails a run; comparison is skipped and the
/// error is logged.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse failure
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Table has neither a filename nor a path column
    #[error("benchmark table has no filename or path column (headers: {0})")]
    NoFileColumn(String),

    /// Table has no data rows
    #[error("benchmark table is empty")]
    Empty,
}
