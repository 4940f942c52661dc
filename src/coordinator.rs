//! Sort coordinator - runs the worker pool over the directory tree
//!
//! The coordinator is responsible for:
//! - Spawning a fixed pool of worker threads
//! - Seeding the task queue with the root directory
//! - Waiting until the root directory task reports completion
//! - Stopping the workers and building the final report

use crate::config::SortConfig;
use crate::error::{Result, SortError};
use crate::output::OutputFormatter;
use crate::walker::{DirNode, DirOutcome, DirTask, SortContext, process_directory};
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded, unbounded};
use indicatif::ProgressBar;
use serde::Serialize;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct SortReport {
    /// Directory that was sorted
    pub root: PathBuf,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// Wall time of the run
    pub duration_ms: u64,

    /// Extensions that matched a category
    pub known: BTreeSet<String>,

    /// Extensions that fell into `Unknown`
    pub unknown: BTreeSet<String>,

    /// Directories listed
    pub dirs_processed: u64,

    /// Files moved into category directories
    pub files_moved: u64,

    /// Archives unpacked
    pub archives_extracted: u64,

    /// Archives that could not be unpacked
    pub archive_failures: u64,

    /// Empty directories removed
    pub dirs_pruned: u64,

    /// Failed filesystem operations
    pub errors: u64,
}

/// A worker thread that processes directory tasks
pub struct Worker {
    /// Worker ID
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a new worker thread
    pub fn spawn(
        id: usize,
        ctx: Arc<SortContext>,
        tasks: Receiver<DirTask>,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("sorter-{}", id))
            .spawn(move || worker_loop(id, ctx, tasks, shutdown))
            .map_err(|e| SortError::WorkerSpawn {
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| SortError::WorkerPanicked { id: self.id }),
            None => Ok(()),
        }
    }
}

/// Main worker loop
fn worker_loop(
    id: usize,
    ctx: Arc<SortContext>,
    tasks: Receiver<DirTask>,
    shutdown: Arc<AtomicBool>,
) {
    debug!(worker = id, "Worker starting");

    while !shutdown.load(Ordering::Relaxed) {
        let task = match tasks.recv_timeout(Duration::from_millis(100)) {
            Ok(task) => task,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        let path = task.node.path.clone();

        // a panicking task has already released its directory while unwinding
        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| process_directory(&ctx, task)))
        {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(worker = id, path = %path.display(), "Directory task panicked");
                ctx.stats.errors.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };

        match &outcome {
            DirOutcome::Sorted {
                path,
                files,
                moved,
                subdirs,
            } => {
                trace!(
                    worker = id,
                    path = %path.display(),
                    files = files,
                    moved = moved,
                    subdirs = subdirs,
                    "Directory sorted"
                );
            }
            DirOutcome::Skipped { path, reason } => {
                debug!(worker = id, path = %path.display(), reason = %reason, "Directory skipped");
            }
        }
    }

    debug!(worker = id, "Worker stopping");
}

/// Coordinates the parallel sort of a directory tree
pub struct SortCoordinator {
    config: SortConfig,
}

impl SortCoordinator {
    /// Create a coordinator for a validated configuration
    ///
    /// # Errors
    ///
    /// Returns the validation error of [`SortConfig::validate`]; nothing on
    /// disk has been touched in that case.
    pub fn new(config: SortConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Sort the tree and block until every directory task has finished
    pub fn run(self) -> Result<SortReport> {
        let start_time = Instant::now();
        let started_at = Utc::now();
        let root = self.config.root.clone();

        info!(
            root = %root.display(),
            workers = self.config.workers,
            "Starting sort"
        );

        let (task_tx, task_rx) = unbounded();
        let (done_tx, done_rx) = bounded(1);
        let progress = if self.config.show_progress {
            OutputFormatter::create_spinner()
        } else {
            ProgressBar::hidden()
        };
        let ctx = Arc::new(SortContext::new(root.clone(), task_tx, done_tx, progress));
        let shutdown = Arc::new(AtomicBool::new(false));

        // all workers must be up before the first directory is touched
        let workers = match self.spawn_workers(&ctx, &task_rx, &shutdown) {
            Ok(workers) => workers,
            Err(e) => {
                error!(error = %e, "Could not start worker pool");
                return Err(e);
            }
        };

        ctx.schedule(DirNode::root(root.clone()));

        // root completion implies every descendant has completed
        if done_rx.recv().is_err() {
            warn!("Completion channel closed before the root finished");
        }
        shutdown.store(true, Ordering::SeqCst);

        for worker in workers {
            let id = worker.id();
            if let Err(e) = worker.join() {
                warn!(worker = id, error = %e, "Worker did not stop cleanly");
            }
        }
        ctx.progress.finish_and_clear();

        let discovery = ctx.discovery_snapshot();
        let stats = &ctx.stats;
        let report = SortReport {
            root,
            started_at,
            duration_ms: start_time.elapsed().as_millis() as u64,
            known: discovery.known,
            unknown: discovery.unknown,
            dirs_processed: stats.dirs_processed.load(Ordering::Relaxed),
            files_moved: stats.files_moved.load(Ordering::Relaxed),
            archives_extracted: stats.archives_extracted.load(Ordering::Relaxed),
            archive_failures: stats.archive_failures.load(Ordering::Relaxed),
            dirs_pruned: stats.dirs_pruned.load(Ordering::Relaxed),
            errors: stats.errors.load(Ordering::Relaxed),
        };

        info!(
            dirs = report.dirs_processed,
            files = report.files_moved,
            pruned = report.dirs_pruned,
            errors = report.errors,
            duration_ms = report.duration_ms,
            "Sort completed"
        );

        Ok(report)
    }

    /// Spawn worker threads; on failure, stop the ones already started
    fn spawn_workers(
        &self,
        ctx: &Arc<SortContext>,
        tasks: &Receiver<DirTask>,
        shutdown: &Arc<AtomicBool>,
    ) -> Result<Vec<Worker>> {
        let mut workers = Vec::with_capacity(self.config.workers);
        for id in 0..self.config.workers {
            match Worker::spawn(id, Arc::clone(ctx), tasks.clone(), Arc::clone(shutdown)) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    shutdown.store(true, Ordering::SeqCst);
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(e);
                }
            }
        }
        Ok(workers)
    }
}

/// Sort `config.root` with a fresh coordinator.
pub fn sort_directory(config: SortConfig) -> Result<SortReport> {
    SortCoordinator::new(config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_new_rejects_missing_root() {
        let result = SortCoordinator::new(SortConfig::new("/no/such/dir/foldersort"));
        assert!(matches!(result, Err(SortError::PathNotFound { .. })));
    }

    #[test]
    fn test_run_on_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let report = sort_directory(SortConfig::new(temp_dir.path()).with_workers(2))
            .expect("sort failed");

        assert_eq!(report.dirs_processed, 1);
        assert_eq!(report.files_moved, 0);
        assert!(report.known.is_empty() && report.unknown.is_empty());
        assert!(temp_dir.path().exists());
    }

    #[test]
    fn test_single_worker_handles_nested_tree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("x").join("y")).unwrap();
        fs::write(root.join("x").join("y").join("clip.MKV"), "v").unwrap();

        let report = sort_directory(SortConfig::new(root).with_workers(1)).expect("sort failed");

        assert!(root.join("x").join("y").join("Video").join("clip.MKV").is_file());
        assert_eq!(report.dirs_processed, 3);
        assert_eq!(report.files_moved, 1);
        assert!(report.known.contains(".mkv"));
    }

    #[test]
    fn test_report_serializes_to_json() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.xyz"), "x").unwrap();
        let report = sort_directory(SortConfig::new(temp_dir.path())).expect("sort failed");

        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["unknown"][0], ".xyz");
        assert_eq!(json["files_moved"], 1);
    }
}
