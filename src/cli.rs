//! Command-line interface module for foldersort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Turning arguments into a validated [`SortConfig`]
//! - Running the sort and printing its summary

use crate::config::{SortConfig, default_workers};
use crate::coordinator::{SortCoordinator, SortReport};
use crate::error::Result;
use crate::output::OutputFormatter;
use clap::Parser;
use std::path::PathBuf;

/// Sort a folder into per-folder category subdirectories.
#[derive(Debug, Clone, Parser)]
#[command(name = "foldersort", version, about)]
pub struct Cli {
    /// Folder to sort
    pub path: Option<PathBuf>,

    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Log debug details
    #[arg(short, long)]
    pub verbose: bool,

    /// Do not draw the progress spinner
    #[arg(short, long)]
    pub quiet: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

impl SortConfig {
    /// Builds the run configuration from parsed arguments.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let config = SortConfig::from_path(cli.path.as_deref())?
            .with_workers(cli.workers.unwrap_or_else(default_workers))
            .with_progress(!cli.quiet && !cli.json);
        Ok(config)
    }
}

/// Runs the CLI application with parsed arguments.
///
/// Validates the arguments, sorts the folder, and prints the summary (as
/// text or JSON). Fatal errors are returned before anything on disk changes.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use foldersort::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["foldersort", "/path/to/folder"]);
/// match run_cli(&cli) {
///     Ok(report) => println!("moved {} files", report.files_moved),
///     Err(e) => eprintln!("{}", e),
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<SortReport> {
    let config = SortConfig::from_cli(cli)?;
    let json = cli.json;
    let root = config.root.clone();
    let coordinator = SortCoordinator::new(config)?;

    if !json {
        OutputFormatter::info(&format!("Sorting contents of: {}", root.display()));
    }

    let report = coordinator.run()?;

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => OutputFormatter::error(&format!("Could not encode report: {}", e)),
        }
    } else {
        OutputFormatter::summary(&report);
    }

    Ok(report)
}
