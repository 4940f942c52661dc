//! Output formatting and styling module.
//!
//! Provides a centralized interface for user-facing CLI output: colored
//! status lines, the progress spinner, and the end-of-run summary.
//! Diagnostics go through `tracing` instead.

use crate::coordinator::SortReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::time::Duration;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersort::output::OutputFormatter;
    /// OutputFormatter::success("All Ok");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersort::output::OutputFormatter;
    /// OutputFormatter::error("Folder does not exist");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a spinner that counts handled files.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_spinner();
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_spinner() -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {pos} files {wide_msg}")
                .expect("Invalid progress bar template"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    /// Formats an extension set as `{.a, .b}`.
    ///
    /// # Example
    ///
    /// ```
    /// use foldersort::output::OutputFormatter;
    /// use std::collections::BTreeSet;
    ///
    /// let set: BTreeSet<String> = [".mp3", ".txt"].iter().map(|s| s.to_string()).collect();
    /// assert_eq!(OutputFormatter::format_extensions(&set), "{.mp3, .txt}");
    /// ```
    pub fn format_extensions(extensions: &BTreeSet<String>) -> String {
        let items: Vec<&str> = extensions
            .iter()
            .map(|ext| if ext.is_empty() { "<none>" } else { ext.as_str() })
            .collect();
        format!("{{{}}}", items.join(", "))
    }

    /// Prints the end-of-run summary: discovered extensions, counters, and
    /// the completion message.
    pub fn summary(report: &SortReport) {
        println!(
            "{} {}",
            "Known extensions:".bold(),
            Self::format_extensions(&report.known).green()
        );
        println!(
            "{} {}",
            "Unknown extensions:".bold(),
            Self::format_extensions(&report.unknown).yellow()
        );

        Self::header("SUMMARY");
        let rows = [
            ("Directories", report.dirs_processed),
            ("Files moved", report.files_moved),
            ("Archives unpacked", report.archives_extracted),
            ("Archives failed", report.archive_failures),
            ("Folders removed", report.dirs_pruned),
            ("Errors", report.errors),
        ];
        let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        for (name, count) in rows {
            println!(
                "{:<width$} | {}",
                name,
                count.to_string().green(),
                width = width
            );
        }
        println!();

        if report.errors > 0 {
            Self::warning(&format!(
                "{} operation(s) failed, see the log above",
                report.errors
            ));
        }
        Self::success("All Ok");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_empty_set() {
        assert_eq!(OutputFormatter::format_extensions(&BTreeSet::new()), "{}");
    }

    #[test]
    fn test_format_marks_missing_extension() {
        let set: BTreeSet<String> = ["".to_string(), ".xyz".to_string()].into_iter().collect();
        assert_eq!(OutputFormatter::format_extensions(&set), "{<none>, .xyz}");
    }
}
