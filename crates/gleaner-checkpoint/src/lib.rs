//! Gleaner Checkpoint Layer
//!
//! Durable snapshots of run progress enabling resume after interruption.
//!
//! A checkpoint is a single versioned JSON file. Writes go to a temporary
//! sibling and are atomically renamed over the target, so a reader never
//! observes a half-written snapshot or an inconsistent completed/pending
//! partition. Old or unknown snapshot versions are rejected at load rather
//! than silently misread.
//!
//! Save failures are reported to the caller, which logs them and continues;
//! losing an interval of crash-safety is preferable to aborting a run.

#![warn(missing_docs)]

use gleaner_domain::{FileResult, StatsSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Current snapshot schema version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur during checkpoint I/O
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization failure
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Snapshot carries a version this build does not understand
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// Completed and pending sets overlap or miss files
    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}

/// Snapshot of one run's progress
///
/// Invariant: `completed` and `pending` are disjoint, and their union is the
/// run's original input file set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Schema version; checked on load
    pub version: u32,

    /// Combo the run is executing
    pub combo: String,

    /// Unix timestamp (seconds) of the snapshot
    pub timestamp: u64,

    /// Terminally-completed files with their results, keyed by path
    pub completed: BTreeMap<PathBuf, FileResult>,

    /// Files not yet terminal (pending or in flight at snapshot time)
    pub pending: BTreeSet<PathBuf>,

    /// Accumulator snapshot at save time; seeds counters on resume
    pub stats: StatsSnapshot,
}

impl RunState {
    /// Create a fresh state with every file pending
    pub fn new(combo: impl Into<String>, files: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            combo: combo.into(),
            timestamp: unix_now(),
            completed: BTreeMap::new(),
            pending: files.into_iter().collect(),
            stats: StatsSnapshot::default(),
        }
    }

    /// Move a file from pending to completed with its terminal result
    pub fn complete(&mut self, result: FileResult) {
        self.pending.remove(&result.path);
        self.completed.insert(result.path.clone(), result);
    }

    /// Verify the completed/pending partition
    pub fn validate(&self) -> Result<(), CheckpointError> {
        if let Some(overlap) = self.completed.keys().find(|path| self.pending.contains(*path)) {
            return Err(CheckpointError::Inconsistent(format!(
                "'{}' is both completed and pending",
                overlap.display()
            )));
        }
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// File-backed checkpoint store
///
/// One store per checkpoint path; the format is opaque to external consumers,
/// only `save`/`load` are contractually exposed.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    /// Create a store writing to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint target path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a snapshot atomically
    ///
    /// Writes to `<path>.tmp`, then renames over the target. The rename is
    /// the commit point; a crash before it leaves the previous snapshot
    /// intact.
    pub fn save(&self, state: &RunState) -> Result<(), CheckpointError> {
        state.validate()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        let payload = serde_json::to_vec_pretty(state)?;
        fs::write(&tmp, payload)?;
        fs::rename(&tmp, &self.path)?;

        debug!(
            "checkpoint saved: {} completed, {} pending",
            state.completed.len(),
            state.pending.len()
        );
        Ok(())
    }

    /// Load the snapshot, if one exists
    ///
    /// Returns `Ok(None)` when no checkpoint has been written yet. A snapshot
    /// with an unknown version or an inconsistent partition is an error, not
    /// a silent restart.
    pub fn load(&self) -> Result<Option<RunState>, CheckpointError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)?;
        let state: RunState = serde_json::from_str(&contents)?;

        if state.version != SNAPSHOT_VERSION {
            return Err(CheckpointError::UnsupportedVersion {
                found: state.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        state.validate()?;

        info!(
            "checkpoint loaded: combo '{}', {} completed, {} pending",
            state.combo,
            state.completed.len(),
            state.pending.len()
        );
        Ok(Some(state))
    }

    /// Remove the checkpoint file, ignoring a missing file
    pub fn clear(&self) -> Result<(), CheckpointError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!("failed to remove checkpoint: {e}");
                Err(e.into())
            }
        }
    }
}
