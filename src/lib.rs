//! foldersort - sort a folder tree into category subdirectories
//!
//! Every directory under the given root gets its files moved into
//! `<dir>/<Category>/` with normalized, transliterated, collision-free names.
//! Archives are also unpacked next to where they land, and directories left
//! empty are removed. Directories are processed in parallel by a fixed pool
//! of worker threads.

pub mod archive;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod file_category;
pub mod file_organizer;
pub mod normalize;
pub mod output;
pub mod walker;

pub use config::SortConfig;
pub use coordinator::{SortCoordinator, SortReport, sort_directory};
pub use error::{Result, SortError};
pub use file_category::{Category, CategoryTable, Discovery};
pub use file_organizer::FileOrganizer;
pub use normalize::normalize;

pub use cli::{Cli, run_cli};
