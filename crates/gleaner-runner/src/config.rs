//! Runner configuration

use crate::error::RunnerError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default cap on concurrently executing strategies
pub const DEFAULT_MAX_CONCURRENT_STRATEGIES: usize = 2;

/// Default cap on concurrently executing FileGroups per strategy
pub const DEFAULT_MAX_CONCURRENT_FILE_GROUPS: usize = 4;

/// Default attempt budget per file
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default time bound for one collaborator call (seconds)
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 300;

/// Configuration for one combo run
///
/// Validated before any task is scheduled; a malformed configuration fails
/// the run immediately and is never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// At most this many strategies execute concurrently
    pub max_concurrent_strategies: usize,

    /// At most this many FileGroups execute concurrently within one strategy
    pub max_concurrent_file_groups: usize,

    /// Attempt budget per file; a file still invalid at this count is
    /// finalized as permanently failed
    pub max_attempts: u32,

    /// Time bound for one collaborator call, in seconds
    pub call_timeout_secs: u64,

    /// Optional wall-clock bound for the whole run, in seconds; expiry
    /// cancels the run and checkpoints unfinished files as pending
    #[serde(default)]
    pub run_timeout_secs: Option<u64>,

    /// Checkpoint file path; `None` disables checkpointing
    #[serde(default)]
    pub checkpoint_path: Option<PathBuf>,

    /// Benchmark table path; `Some` enables evaluation mode
    #[serde(default)]
    pub benchmark_path: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_strategies: DEFAULT_MAX_CONCURRENT_STRATEGIES,
            max_concurrent_file_groups: DEFAULT_MAX_CONCURRENT_FILE_GROUPS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            run_timeout_secs: None,
            checkpoint_path: None,
            benchmark_path: None,
        }
    }
}

impl RunnerConfig {
    /// Reject degenerate limits
    pub fn validate(&self) -> Result<(), RunnerError> {
        if self.max_concurrent_strategies == 0 {
            return Err(RunnerError::Config(
                "max_concurrent_strategies must be >= 1".into(),
            ));
        }
        if self.max_concurrent_file_groups == 0 {
            return Err(RunnerError::Config(
                "max_concurrent_file_groups must be >= 1".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(RunnerError::Config("max_attempts must be >= 1".into()));
        }
        if self.call_timeout_secs == 0 {
            return Err(RunnerError::Config("call_timeout_secs must be >= 1".into()));
        }
        Ok(())
    }

    /// Collaborator call timeout as a Duration
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Run timeout as a Duration, when set
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}
