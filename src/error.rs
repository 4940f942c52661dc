//! Error types for foldersort
//!
//! Two kinds of failure exist:
//! - Fatal errors, raised while validating the invocation, before anything
//!   on disk is touched (`MissingArgument`, `PathNotFound`, `NotADirectory`,
//!   `InvalidWorkerCount`) or while starting the worker pool.
//! - Per-file / per-directory errors, raised by filesystem operations during
//!   the run. These are logged and counted where they happen and never abort
//!   sibling work.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a sorting run
#[derive(Error, Debug)]
pub enum SortError {
    /// No directory was given on the command line
    #[error("No path to folder")]
    MissingArgument,

    /// The given directory does not exist
    #[error("Folder does not exist")]
    PathNotFound { path: PathBuf },

    /// The given path exists but is not a directory
    #[error("Not a folder: {}", path.display())]
    NotADirectory { path: PathBuf },

    /// Worker pool size of zero
    #[error("Worker count must be at least 1")]
    InvalidWorkerCount,

    /// Failed to create a category directory
    #[error("Failed to create directory {}: {source}", path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to move a file into its category directory
    #[error(
        "Failed to move {} to {}: {source}",
        source_path.display(),
        destination.display()
    )]
    FileMoveFailure {
        source_path: PathBuf,
        destination: PathBuf,
        source: std::io::Error,
    },

    /// File disappeared between discovery and move
    #[error("File not found: {}", path.display())]
    MoveTargetMissing { path: PathBuf },

    /// Failed to list a directory
    #[error("Failed to read directory {}: {source}", path.display())]
    ReadDirFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to remove an emptied directory
    #[error("Failed to remove directory {}: {source}", path.display())]
    RemoveDirFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A worker thread could not be started
    #[error("Failed to start worker {id}: {reason}")]
    WorkerSpawn { id: usize, reason: String },

    /// A worker thread panicked
    #[error("Worker {id} panicked")]
    WorkerPanicked { id: usize },
}

impl SortError {
    /// Returns true if this error stops the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SortError::MissingArgument
                | SortError::PathNotFound { .. }
                | SortError::NotADirectory { .. }
                | SortError::InvalidWorkerCount
                | SortError::WorkerSpawn { .. }
                | SortError::WorkerPanicked { .. }
        )
    }
}

/// Result type alias for foldersort operations
pub type Result<T> = std::result::Result<T, SortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_visible_messages() {
        assert_eq!(SortError::MissingArgument.to_string(), "No path to folder");
        assert_eq!(
            SortError::PathNotFound {
                path: PathBuf::from("/nope")
            }
            .to_string(),
            "Folder does not exist"
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(SortError::MissingArgument.is_fatal());
        assert!(SortError::InvalidWorkerCount.is_fatal());

        let missing = SortError::MoveTargetMissing {
            path: PathBuf::from("/tmp/gone.txt"),
        };
        assert!(!missing.is_fatal());
        assert_eq!(missing.to_string(), "File not found: /tmp/gone.txt");
    }
}
