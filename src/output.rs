//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output, including colored output,
//! progress tracking, and formatted tables. This module abstracts away output details,
//! making it easy to change formatting globally.

use crate::config::ArchiveConfig;
use crate::error::ItemFailure;
use crate::scanner::{EntryStatus, ScannedEntry, total_size};
use crate::stager::StagedItem;
use crate::uploader::remote_url;
use chrono::{DateTime, Local};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for uploads
/// - The scan, staging and configuration tables
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cloud_archiver::output::OutputFormatter;
    /// OutputFormatter::success("Moved 3 entries to the archive");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
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

    /// Prints a regular message without styling.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header followed by an optional dimmed description.
    pub fn section(title: &str, description: Option<&str>) {
        println!("\n{} {}", "──".dimmed(), title.bold());
        if let Some(description) = description {
            println!("{}\n", description.dimmed());
        }
    }

    /// Prints one line per failure, naming the item and the reason.
    pub fn failures(failures: &[ItemFailure]) {
        for failure in failures {
            Self::error(&failure.to_string());
        }
    }

    /// Creates and returns a progress bar for uploads.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use cloud_archiver::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(10);
    /// pb.inc(1);
    /// pb.finish_with_message("Uploaded");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints the scan results as a table.
    ///
    /// Columns: entry name, idle days, last access date, size and whether
    /// the entry will be archived. Eligible rows are yellow, ignored rows
    /// dimmed.
    pub fn scan_table(root: &Path, entries: &[ScannedEntry]) {
        let header = format!("Path (from {})", root.display());
        let name_width = entries
            .iter()
            .map(|e| e.entry.name.chars().count())
            .max()
            .unwrap_or(0)
            .max(header.chars().count());

        println!(
            "{:<name_w$} | {:>9} | {:<10} | {:>9} | {}",
            header.bold(),
            "Days Idle".bold(),
            "Accessed".bold(),
            "Size".bold(),
            "Archive".bold(),
            name_w = name_width
        );
        println!("{}", "-".repeat(name_width + 47));

        for scanned in entries {
            let accessed: DateTime<Local> = scanned.entry.last_access.into();
            let size = scanned
                .size_bytes
                .map(human_readable_bytes)
                .unwrap_or_else(|| "-".to_string());
            let verdict = match scanned.status {
                EntryStatus::Eligible => "YES",
                EntryStatus::Recent => "NO",
                EntryStatus::Ignored => "ignored",
            };
            let row = format!(
                "{:<name_w$} | {:>9} | {:<10} | {:>9} | {}",
                scanned.entry.name,
                scanned.days_idle,
                accessed.format("%Y-%m-%d"),
                size,
                verdict,
                name_w = name_width
            );
            match scanned.status {
                EntryStatus::Eligible => println!("{}", row.yellow()),
                EntryStatus::Recent => println!("{}", row),
                EntryStatus::Ignored => println!("{}", row.dimmed()),
            }
        }
    }

    /// Lists the staged items with their size and upload destination.
    pub fn staged_table(items: &[StagedItem], bucket: &str) {
        let name_width = items
            .iter()
            .map(|i| i.name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Name".len());

        println!(
            "{:<name_w$} | {:<4} | {:>9} | {}",
            "Name".bold(),
            "Kind".bold(),
            "Size".bold(),
            "Destination".bold(),
            name_w = name_width
        );
        println!("{}", "-".repeat(name_width + 40));

        let mut total = 0;
        for item in items {
            let size = total_size(&item.path);
            total += size;
            println!(
                "{:<name_w$} | {:<4} | {:>9} | {}",
                item.name,
                item.kind.label(),
                human_readable_bytes(size),
                remote_url(item, bucket).cyan(),
                name_w = name_width
            );
        }
        println!("  Total: {}", human_readable_bytes(total).bold());
    }

    /// Prints the configuration as a two-column table.
    pub fn config_table(root: &Path, config: &ArchiveConfig) {
        let rows = [
            ("Directory", root.display().to_string()),
            ("Config", ArchiveConfig::path_for(root).display().to_string()),
            ("Bucket", config.bucket.clone()),
            ("Days", config.days.to_string()),
        ];
        for (label, value) in rows {
            println!("  {:<10} {}", label.green(), value);
        }
        for (key, value) in &config.extra {
            println!("  {:<10} {}", key.as_str().dimmed(), value);
        }
    }
}

/// Formats a byte count with binary units, e.g. `1.5KiB`.
pub fn human_readable_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_readable_bytes() {
        assert_eq!(human_readable_bytes(0), "0.0B");
        assert_eq!(human_readable_bytes(1023), "1023.0B");
        assert_eq!(human_readable_bytes(1536), "1.5KiB");
        assert_eq!(human_readable_bytes(5 * 1024 * 1024), "5.0MiB");
    }
}
