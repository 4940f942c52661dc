//! Run configuration.
//!
//! The category and transliteration tables are fixed; the only things a run
//! can vary are where it starts, how many workers it uses, and whether it
//! draws a progress spinner.

use crate::error::{Result, SortError};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Settings for one sorting run.
#[derive(Debug, Clone)]
pub struct SortConfig {
    /// Directory to sort. Never removed by pruning.
    pub root: PathBuf,
    /// Size of the worker pool.
    pub workers: usize,
    /// Whether to draw a progress spinner on stderr.
    pub show_progress: bool,
}

impl SortConfig {
    /// Creates a configuration for `root` with one worker per available CPU
    /// and no progress display.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            workers: default_workers(),
            show_progress: false,
        }
    }

    /// Builds a configuration from an optional path, as given on the command
    /// line. A missing path is the `MissingArgument` error.
    pub fn from_path(path: Option<&Path>) -> Result<Self> {
        let path = path.ok_or(SortError::MissingArgument)?;
        Ok(Self::new(path))
    }

    /// Sets the worker pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Enables or disables the progress spinner.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Checks the configuration before anything on disk is touched.
    ///
    /// # Errors
    ///
    /// Returns `PathNotFound` if the root does not exist, `NotADirectory` if
    /// it is not a directory, and `InvalidWorkerCount` for a pool of zero.
    pub fn validate(&self) -> Result<()> {
        if !self.root.exists() {
            return Err(SortError::PathNotFound {
                path: self.root.clone(),
            });
        }
        if !self.root.is_dir() {
            return Err(SortError::NotADirectory {
                path: self.root.clone(),
            });
        }
        if self.workers == 0 {
            return Err(SortError::InvalidWorkerCount);
        }
        Ok(())
    }
}

/// Number of workers to use when none is configured.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
