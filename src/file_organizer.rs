/// Moving files into category directories.
///
/// This module creates the category subdirectory of a directory, picks a
/// free destination name for a file and moves the file there. Both steps are
/// safe against concurrent callers targeting the same directory: directory
/// creation tolerates a directory appearing underneath it, and a destination
/// name is claimed by exclusive file creation before the rename lands on it.
use crate::error::{Result, SortError};
use crate::normalize::{normalize, split_name};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Represents a single file move.
#[derive(Debug, Clone)]
pub struct Operation {
    /// The original path of the file before sorting.
    pub original_path: PathBuf,
    /// The new path of the file after sorting.
    pub new_path: PathBuf,
    /// The category directory the file was moved to.
    pub category: String,
}

/// Builds the `n`-th candidate name for `file_name`: the name itself for
/// `0`, otherwise `<stem>_<n>.<ext>`.
///
/// # Examples
///
/// ```
/// use foldersort::file_organizer::numbered_name;
///
/// assert_eq!(numbered_name("a.txt", 0), "a.txt");
/// assert_eq!(numbered_name("a.txt", 2), "a_2.txt");
/// assert_eq!(numbered_name("README", 1), "README_1");
/// ```
pub fn numbered_name(file_name: &str, n: u32) -> String {
    if n == 0 {
        return file_name.to_string();
    }
    match split_name(file_name) {
        (stem, Some(ext)) => format!("{}_{}.{}", stem, n, ext),
        (stem, None) => format!("{}_{}", stem, n),
    }
}

/// Reserves a free path for `candidate_name` inside `destination_dir`.
///
/// Tries `candidate_name`, then `<stem>_1.<ext>`, `<stem>_2.<ext>`, … and
/// claims the first one that does not exist by creating an empty placeholder
/// with `create_new`. The caller is expected to rename a file onto the
/// returned path, or remove the placeholder if it gives up.
pub fn resolve(destination_dir: &Path, candidate_name: &str) -> std::io::Result<PathBuf> {
    let mut n = 0u32;
    loop {
        let path = destination_dir.join(numbered_name(candidate_name, n));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                n += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir())
}

/// Moves files into category directories.
pub struct FileOrganizer;

impl FileOrganizer {
    /// Ensures `<base_path>/<category_dir_name>` exists and returns it.
    ///
    /// A directory created concurrently by another task counts as success.
    /// A symlink in its place does not, even one pointing at a directory.
    pub fn ensure_category_dir(base_path: &Path, category_dir_name: &str) -> Result<PathBuf> {
        let category_path = base_path.join(category_dir_name);
        match fs::create_dir(&category_path) {
            Ok(()) => Ok(category_path),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && is_real_dir(&category_path) => {
                Ok(category_path)
            }
            Err(e) => Err(SortError::DirectoryCreationFailed {
                path: category_path,
                source: e,
            }),
        }
    }

    /// Moves a file into its category directory under `base_path`, under its
    /// normalized and collision-free name, and records the operation.
    ///
    /// # Arguments
    ///
    /// * `base_path` - The directory the file was found in
    /// * `file_path` - The full path to the file to be moved
    /// * `category_dir_name` - The name of the subdirectory for this file's category
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use foldersort::file_organizer::FileOrganizer;
    /// use std::path::Path;
    ///
    /// let result = FileOrganizer::move_to_category_with_record(
    ///     Path::new("/path/to/base"),
    ///     Path::new("/path/to/base/my song.mp3"),
    ///     "Audio"
    /// );
    ///
    /// match result {
    ///     Ok(op) => println!("Moved {} to {}", op.original_path.display(), op.new_path.display()),
    ///     Err(e) => eprintln!("Move failed: {}", e),
    /// }
    /// ```
    pub fn move_to_category_with_record(
        base_path: &Path,
        file_path: &Path,
        category_dir_name: &str,
    ) -> Result<Operation> {
        if !file_path.exists() {
            return Err(SortError::MoveTargetMissing {
                path: file_path.to_path_buf(),
            });
        }

        let category_path = Self::ensure_category_dir(base_path, category_dir_name)?;

        let file_name = file_path
            .file_name()
            .ok_or_else(|| SortError::FileMoveFailure {
                source_path: file_path.to_path_buf(),
                destination: category_path.clone(),
                source: std::io::Error::new(ErrorKind::InvalidInput, "file has no name component"),
            })?
            .to_string_lossy();

        let candidate = normalize(&file_name);
        let destination_path =
            resolve(&category_path, &candidate).map_err(|e| SortError::FileMoveFailure {
                source_path: file_path.to_path_buf(),
                destination: category_path.join(&candidate),
                source: e,
            })?;

        if let Err(e) = fs::rename(file_path, &destination_path) {
            // release the reserved name
            let _ = fs::remove_file(&destination_path);
            if e.kind() == ErrorKind::NotFound && !file_path.exists() {
                return Err(SortError::MoveTargetMissing {
                    path: file_path.to_path_buf(),
                });
            }
            return Err(SortError::FileMoveFailure {
                source_path: file_path.to_path_buf(),
                destination: destination_path,
                source: e,
            });
        }

        trace!(
            from = %file_path.display(),
            to = %destination_path.display(),
            "File moved"
        );

        Ok(Operation {
            original_path: file_path.to_path_buf(),
            new_path: destination_path,
            category: category_dir_name.to_string(),
        })
    }
}
