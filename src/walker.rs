//! Per-directory sorting task.
//!
//! Every directory goes through `Discover → ClassifyAndMove(file)* → Prune`:
//! - its direct children are listed once,
//! - every direct subdirectory is scheduled as a new task on the shared queue;
//!   one named like a category is listed right away, before this directory's
//!   own files start landing in it,
//! - every direct file is classified and moved into `<dir>/<Category>/`,
//! - once the directory's own files and all of its child tasks are done, the
//!   directory is removed if it ended up empty, and its parent is released.
//!
//! Completion is tracked with a pending counter per directory (one for the
//! directory's own work plus one per scheduled child). The root's counter
//! reaching zero means the whole tree is done.

use crate::archive::{self, UnpackOutcome};
use crate::error::SortError;
use crate::file_category::{Category, CategoryTable, Discovery, extension_of};
use crate::file_organizer::{FileOrganizer, Operation};
use crossbeam_channel::Sender;
use indicatif::ProgressBar;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

/// A directory in the tree being sorted.
#[derive(Debug)]
pub struct DirNode {
    /// Full path to the directory
    pub path: PathBuf,

    /// Directory this one was discovered in (`None` for the root)
    pub parent: Option<Arc<DirNode>>,

    /// Own work plus unfinished child tasks
    pending: AtomicUsize,
}

impl DirNode {
    /// Create the root node
    pub fn root(path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            path,
            parent: None,
            pending: AtomicUsize::new(1),
        })
    }

    /// Create a node for a subdirectory of `parent`
    pub fn child(parent: &Arc<DirNode>, path: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            path,
            parent: Some(Arc::clone(parent)),
            pending: AtomicUsize::new(1),
        })
    }
}

/// A task to sort one directory
#[derive(Debug)]
pub struct DirTask {
    pub node: Arc<DirNode>,

    /// Children listed by the parent before it started moving files
    listing: Option<Listing>,
}

impl DirTask {
    pub fn new(node: Arc<DirNode>) -> Self {
        Self {
            node,
            listing: None,
        }
    }

    /// Task for a subdirectory of a directory about to be sorted. A
    /// subdirectory named like a category receives that directory's files,
    /// so its original contents are captured now.
    fn for_child(node: Arc<DirNode>) -> Self {
        let is_category = node
            .path
            .file_name()
            .is_some_and(|name| Category::is_category_dir_name(&name.to_string_lossy()));
        if is_category {
            if let Ok(listing) = discover(&node.path) {
                return Self {
                    node,
                    listing: Some(listing),
                };
            }
        }
        Self::new(node)
    }
}

/// Counters shared by all workers
#[derive(Debug, Default)]
pub struct SortStats {
    /// Directories listed
    pub dirs_processed: AtomicU64,

    /// Files moved into a category directory
    pub files_moved: AtomicU64,

    /// Archives unpacked
    pub archives_extracted: AtomicU64,

    /// Archives that could not be unpacked
    pub archive_failures: AtomicU64,

    /// Directories removed because they ended up empty
    pub dirs_pruned: AtomicU64,

    /// Filesystem operations that failed
    pub errors: AtomicU64,
}

impl SortStats {
    fn record_dir(&self) {
        self.dirs_processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_move(&self) {
        self.files_moved.fetch_add(1, Ordering::Relaxed);
    }

    fn record_unpack(&self, outcome: &UnpackOutcome) {
        if outcome.is_success() {
            self.archives_extracted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.archive_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_prune(&self) {
        self.dirs_pruned.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// State shared by every directory task of one run
pub struct SortContext {
    /// Directory the run started at; never pruned
    pub root: PathBuf,

    /// Extension to category mapping
    pub categories: CategoryTable,

    /// Extensions seen so far, merged in by finished tasks
    pub discovery: Mutex<Discovery>,

    /// Run counters
    pub stats: SortStats,

    /// Spinner ticked once per file
    pub progress: ProgressBar,

    /// Queue new directory tasks go to
    tasks: Sender<DirTask>,

    /// Signalled once when the root task completes
    done: Sender<()>,
}

impl SortContext {
    pub fn new(
        root: PathBuf,
        tasks: Sender<DirTask>,
        done: Sender<()>,
        progress: ProgressBar,
    ) -> Self {
        Self {
            root,
            categories: CategoryTable::default(),
            discovery: Mutex::new(Discovery::new()),
            stats: SortStats::default(),
            progress,
            tasks,
            done,
        }
    }

    /// Queue a directory task. If the queue is gone the node is released so
    /// its parent does not wait on it forever.
    pub fn schedule(&self, node: Arc<DirNode>) {
        self.enqueue(DirTask::new(node));
    }

    fn enqueue(&self, task: DirTask) {
        if let Err(err) = self.tasks.send(task) {
            warn!(path = %err.0.node.path.display(), "Task queue closed, directory skipped");
            self.stats.record_error();
            release(self, err.0.node);
        }
    }

    /// Snapshot of the merged discovery sets
    pub fn discovery_snapshot(&self) -> Discovery {
        self.discovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn merge_discovery(&self, local: Discovery) {
        if local.is_empty() {
            return;
        }
        self.discovery
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .merge(local);
    }
}

/// Result of processing one directory
#[derive(Debug)]
pub enum DirOutcome {
    /// Directory listed and its files handled
    Sorted {
        path: PathBuf,
        files: usize,
        moved: usize,
        subdirs: usize,
    },

    /// Directory could not be listed
    Skipped { path: PathBuf, reason: String },
}

/// Direct children of a directory, split by kind
#[derive(Debug, Default)]
struct Listing {
    files: Vec<PathBuf>,
    subdirs: Vec<PathBuf>,
}

/// Releases a node's own pending count when dropped, also on unwind.
struct CompletionGuard<'a> {
    ctx: &'a SortContext,
    node: Option<Arc<DirNode>>,
}

impl<'a> CompletionGuard<'a> {
    fn new(ctx: &'a SortContext, node: Arc<DirNode>) -> Self {
        Self {
            ctx,
            node: Some(node),
        }
    }
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        if let Some(node) = self.node.take() {
            release(self.ctx, node);
        }
    }
}

/// Sort one directory: schedule its subdirectories, move its files.
pub fn process_directory(ctx: &SortContext, task: DirTask) -> DirOutcome {
    let DirTask { node, listing } = task;
    let _guard = CompletionGuard::new(ctx, Arc::clone(&node));

    ctx.progress.set_message(node.path.display().to_string());

    let listing = match listing.map_or_else(|| discover(&node.path), Ok) {
        Ok(listing) => listing,
        Err(e) => {
            ctx.stats.record_error();
            return DirOutcome::Skipped {
                path: node.path.clone(),
                reason: e.to_string(),
            };
        }
    };
    ctx.stats.record_dir();

    // count children before any of them can finish
    node.pending.fetch_add(listing.subdirs.len(), Ordering::AcqRel);
    for subdir in &listing.subdirs {
        ctx.enqueue(DirTask::for_child(DirNode::child(&node, subdir.clone())));
    }

    let mut local = Discovery::new();
    let mut moved = 0;
    for file in &listing.files {
        if sort_file(ctx, &node.path, file, &mut local).is_some() {
            moved += 1;
        }
        ctx.progress.inc(1);
    }
    ctx.merge_discovery(local);

    DirOutcome::Sorted {
        path: node.path.clone(),
        files: listing.files.len(),
        moved,
        subdirs: listing.subdirs.len(),
    }
}

/// Classify one file and move it into its category directory under `dir`.
///
/// Archives are unpacked first; a failed extraction does not stop the move.
/// Every failure is logged and counted here and yields `None`.
pub fn sort_file(
    ctx: &SortContext,
    dir: &Path,
    file: &Path,
    discovery: &mut Discovery,
) -> Option<Operation> {
    let extension = extension_of(file);
    let category = ctx.categories.classify(&extension);
    discovery.record(&extension, category);

    let category_dir = match FileOrganizer::ensure_category_dir(dir, category.dir_name()) {
        Ok(path) => path,
        Err(e) => {
            warn!(file = %file.display(), error = %e, "Skipping file");
            ctx.stats.record_error();
            return None;
        }
    };

    if category == Category::Archives {
        let outcome = archive::unpack(file, &category_dir);
        ctx.stats.record_unpack(&outcome);
    }

    match FileOrganizer::move_to_category_with_record(dir, file, category.dir_name()) {
        Ok(op) => {
            ctx.stats.record_move();
            Some(op)
        }
        Err(e @ SortError::MoveTargetMissing { .. }) => {
            warn!(error = %e, "File vanished before it could be moved");
            ctx.stats.record_error();
            None
        }
        Err(e) => {
            warn!(file = %file.display(), error = %e, "Skipping file");
            ctx.stats.record_error();
            None
        }
    }
}

/// List the direct children of `dir`. Symbolic links are left alone.
fn discover(dir: &Path) -> Result<Listing, SortError> {
    let entries = fs::read_dir(dir).map_err(|e| {
        let err = SortError::ReadDirFailed {
            path: dir.to_path_buf(),
            source: e,
        };
        warn!(error = %err, "Directory skipped");
        err
    })?;

    let mut listing = Listing::default();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot stat entry");
                continue;
            }
        };

        if file_type.is_symlink() {
            debug!(path = %path.display(), "Leaving symlink in place");
        } else if file_type.is_dir() {
            listing.subdirs.push(path);
        } else if file_type.is_file() {
            listing.files.push(path);
        }
    }
    Ok(listing)
}

/// Drop one pending count of `node`. When it reaches zero the directory is
/// finished: it is pruned and its parent released in turn, up to the root,
/// which signals the coordinator instead.
fn release(ctx: &SortContext, node: Arc<DirNode>) {
    let mut current = node;
    loop {
        if current.pending.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let Some(parent) = current.parent.clone() else {
            let _ = ctx.done.send(());
            return;
        };
        prune(ctx, &current.path);
        current = parent;
    }
}

/// Remove `dir` if it is empty. The root, and anything outside it, is never
/// removed.
fn prune(ctx: &SortContext, dir: &Path) {
    if dir == ctx.root || !dir.starts_with(&ctx.root) {
        return;
    }

    match fs::read_dir(dir) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                return;
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => return,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Cannot check directory for pruning");
            ctx.stats.record_error();
            return;
        }
    }

    match fs::remove_dir(dir) {
        Ok(()) => {
            debug!(path = %dir.display(), "Removed empty directory");
            ctx.stats.record_prune();
        }
        Err(e) => {
            let err = SortError::RemoveDirFailed {
                path: dir.to_path_buf(),
                source: e,
            };
            warn!(error = %err, "Prune failed");
            ctx.stats.record_error();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::{Receiver, bounded, unbounded};
    use tempfile::TempDir;

    fn context(root: &Path) -> (SortContext, Receiver<DirTask>, Receiver<()>) {
        let (task_tx, task_rx) = unbounded();
        let (done_tx, done_rx) = bounded(1);
        let ctx = SortContext::new(root.to_path_buf(), task_tx, done_tx, ProgressBar::hidden());
        (ctx, task_rx, done_rx)
    }

    /// Run every queued task on the current thread.
    fn drain(ctx: &SortContext, tasks: &Receiver<DirTask>) {
        while let Ok(task) = tasks.try_recv() {
            process_directory(ctx, task);
        }
    }

    #[test]
    fn test_process_directory_sorts_direct_files() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("song.mp3"), "a").unwrap();
        fs::write(root.join("note.xyz"), "b").unwrap();
        let (ctx, tasks, done) = context(root);

        let outcome = process_directory(&ctx, DirTask::new(DirNode::root(root.to_path_buf())));

        match outcome {
            DirOutcome::Sorted { files, moved, subdirs, .. } => {
                assert_eq!((files, moved, subdirs), (2, 2, 0));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(root.join("Audio").join("song.mp3").is_file());
        assert!(root.join("Unknown").join("note.xyz").is_file());
        assert!(tasks.is_empty());
        assert!(done.try_recv().is_ok(), "root completion must be signalled");

        let discovery = ctx.discovery_snapshot();
        assert!(discovery.known.contains(".mp3"));
        assert!(discovery.unknown.contains(".xyz"));
    }

    #[test]
    fn test_subdirectories_are_scheduled_not_recursed() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("inner")).unwrap();
        fs::write(root.join("inner").join("doc.txt"), "x").unwrap();
        let (ctx, tasks, done) = context(root);

        process_directory(&ctx, DirTask::new(DirNode::root(root.to_path_buf())));

        // the child is queued, untouched, and the root is still pending
        assert_eq!(tasks.len(), 1);
        assert!(root.join("inner").join("doc.txt").is_file());
        assert!(done.try_recv().is_err());

        drain(&ctx, &tasks);
        assert!(root.join("inner").join("Docs").join("doc.txt").is_file());
        assert!(done.try_recv().is_ok());
    }

    #[test]
    fn test_empty_subdirectories_are_pruned_but_root_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a").join("b").join("c")).unwrap();
        let (ctx, tasks, done) = context(root);

        ctx.schedule(DirNode::root(root.to_path_buf()));
        drain(&ctx, &tasks);

        assert!(done.try_recv().is_ok());
        assert!(root.exists());
        assert!(!root.join("a").exists());
        assert_eq!(ctx.stats.dirs_pruned.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_existing_category_directories_are_sorted_too() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir(root.join("Audio")).unwrap();
        fs::write(root.join("Audio").join("old.mp3"), "x").unwrap();
        fs::write(root.join("song.mp3"), "y").unwrap();
        let (ctx, tasks, _done) = context(root);

        // the root runs to completion before its Audio child is picked up
        process_directory(&ctx, DirTask::new(DirNode::root(root.to_path_buf())));
        assert!(root.join("Audio").join("song.mp3").is_file());
        drain(&ctx, &tasks);

        assert!(root.join("Audio").join("Audio").join("old.mp3").is_file());
        assert!(root.join("Audio").join("song.mp3").is_file());
        assert!(!root.join("Audio").join("Audio").join("song.mp3").exists());
        assert_eq!(ctx.stats.files_moved.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_unreadable_directory_still_completes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (ctx, _tasks, done) = context(root);
        let missing = DirNode::child(&DirNode::root(root.to_path_buf()), root.join("gone"));

        let outcome = process_directory(&ctx, DirTask::new(missing));

        assert!(matches!(outcome, DirOutcome::Skipped { .. }));
        assert_eq!(ctx.stats.errors.load(Ordering::Relaxed), 1);
        // the child's release cascades into its root
        assert!(done.try_recv().is_ok());
    }

    #[test]
    fn test_prune_never_removes_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (ctx, _tasks, _done) = context(root);

        prune(&ctx, root);
        assert!(root.exists());
    }
}
