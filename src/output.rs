//! Output formatting and styling module.
//!
//! Provides a centralized interface for user-facing CLI output, including
//! colored status lines, progress tracking during execution, and the
//! end-of-run summary table. Engine-internal action lines go through the
//! `log` crate instead; this module is what the user reads.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
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

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for applying a plan's operations.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Prints a summary table of planned operations by kind.
    pub fn summary_table(op_counts: &HashMap<String, usize>, total_ops: usize) {
        Self::header("PLAN SUMMARY");

        // Sort kinds for consistent output
        let mut kinds: Vec<_> = op_counts.iter().collect();
        kinds.sort_by_key(|&(name, _)| name);

        let max_kind_len = kinds
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(9); // At least "Operation" width

        println!(
            "{:<width$} | {}",
            "Operation".bold(),
            "Count".bold(),
            width = max_kind_len
        );
        println!("{}", "-".repeat(max_kind_len + 10));

        for (kind, count) in &kinds {
            println!(
                "{:<width$} | {}",
                kind,
                count.to_string().green(),
                width = max_kind_len
            );
        }

        println!("{}", "-".repeat(max_kind_len + 10));
        println!(
            "{:<width$} | {}",
            "Total".bold(),
            total_ops.to_string().green().bold(),
            width = max_kind_len
        );
    }
}
