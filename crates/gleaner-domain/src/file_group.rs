//! FileGroup - a bounded batch of files processed in one collaborator call

use std::path::PathBuf;

/// An ordered batch of file references, sized for one collaborator request
///
/// Created by partitioning a run's file set; owned exclusively by the task
/// that processes it. A group never exceeds the strategy's
/// `max_files_per_request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    /// Files in this group, in input order
    pub files: Vec<PathBuf>,
}

impl FileGroup {
    /// Number of files in the group
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the group is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Partition a file set into groups of at most `max_per_group` files
    ///
    /// Input order is preserved deterministically: group N holds files
    /// `[N * max_per_group, (N + 1) * max_per_group)` of the input.
    ///
    /// # Panics
    ///
    /// Panics if `max_per_group` is zero; strategy validation rejects that
    /// configuration before dispatch.
    pub fn partition(files: &[PathBuf], max_per_group: usize) -> Vec<FileGroup> {
        assert!(max_per_group > 0, "max_per_group must be >= 1");
        files
            .chunks(max_per_group)
            .map(|chunk| FileGroup {
                files: chunk.to_vec(),
            })
            .collect()
    }
}
