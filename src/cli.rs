//! Command-line interface module for mediatidy.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing and mode selection
//! - Orchestration of a run: plan, journal, execute, sweep
//! - Undo runs from a previous journal
//! - End-of-run reporting and exit status

use crate::config::PolicyConfig;
use crate::journal::Journal;
use crate::lookup::{NoLookup, TmdbLookup, YearLookup};
use crate::output::OutputFormatter;
use crate::plan::{Plan, Planner, RunContext};
use crate::sweep;
use crate::undo::UndoManager;
use clap::Parser;
use std::path::{Path, PathBuf};

/// Reorganize loosely-named TV and movie files into a canonical layout.
///
/// Without flags the run is a dry-run: the plan is printed and discarded.
#[derive(Parser, Debug)]
#[command(name = "mediatidy", version)]
pub struct CliArgs {
    /// Root directory to process
    #[arg(value_name = "ROOT", required_unless_present = "undo")]
    pub root: Option<PathBuf>,

    /// Apply the plan (default is dry-run)
    #[arg(long, conflicts_with_all = ["plan", "undo"])]
    pub commit: bool,

    /// Write the journal without applying anything
    #[arg(long, conflicts_with = "undo")]
    pub plan: bool,

    /// Move junk into this directory instead of deleting it
    #[arg(long, value_name = "DIR", conflicts_with = "undo")]
    pub quarantine: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Look up missing movie years via TMDB (requires TMDB_API_KEY)
    #[arg(long, conflicts_with = "undo")]
    pub lookup: bool,

    /// Undo a previous run from its journal file
    #[arg(long, value_name = "JOURNAL")]
    pub undo: Option<PathBuf>,
}

/// How a run treats the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Plan, print, discard. The default.
    DryRun,
    /// Plan and write the journal, apply nothing.
    PlanOnly,
    /// Plan, write the journal, then apply it.
    Commit,
}

/// Options for one organize run.
#[derive(Debug)]
pub struct RunOptions {
    pub root: PathBuf,
    pub mode: Mode,
    pub quarantine: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub use_lookup: bool,
}

/// What a run did, for reporting and the exit status.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Operations in the plan.
    pub planned: usize,
    /// Operations applied (commit mode only).
    pub applied: usize,
    /// Operations that failed (commit mode only).
    pub failed: usize,
    /// Files reported as unclassified.
    pub unclassified: usize,
    /// Directories removed (or sweep candidates in dry-run).
    pub swept: usize,
    /// The journal file, when one was written.
    pub journal: Option<PathBuf>,
}

impl RunSummary {
    /// True when no operation failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Entry point for a parsed command line. Returns whether the process
/// should exit successfully.
pub fn dispatch(args: CliArgs) -> Result<bool, String> {
    if let Some(journal_path) = args.undo {
        let report = run_undo(&journal_path)?;
        return Ok(report.is_complete_success());
    }

    let Some(root) = args.root else {
        return Err("A root directory is required".to_string());
    };
    let mode = if args.commit {
        Mode::Commit
    } else if args.plan {
        Mode::PlanOnly
    } else {
        Mode::DryRun
    };

    let summary = run(&RunOptions {
        root,
        mode,
        quarantine: args.quarantine,
        config: args.config,
        use_lookup: args.lookup,
    })?;
    Ok(summary.is_clean())
}

/// Execute one organize run in the requested mode.
///
/// This is the classify -> plan -> journal -> execute -> sweep pipeline;
/// dry-run and plan-only stop after the step their name says.
pub fn run(opts: &RunOptions) -> Result<RunSummary, String> {
    if !opts.root.is_dir() {
        return Err(format!(
            "Root directory is not accessible: {}",
            opts.root.display()
        ));
    }

    let config = PolicyConfig::load(opts.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let policy = config
        .compile()
        .map_err(|e| format!("Error compiling policy: {}", e))?;

    let tmdb;
    let lookup: &dyn YearLookup = if opts.use_lookup {
        match TmdbLookup::from_env() {
            Some(client) => {
                tmdb = client;
                &tmdb
            }
            None => {
                OutputFormatter::warning(
                    "TMDB_API_KEY is not set; movies without a year stay unclassified",
                );
                &NoLookup
            }
        }
    } else {
        &NoLookup
    };

    let ctx = RunContext {
        root: &opts.root,
        policy: &policy,
        quarantine: opts.quarantine.as_deref(),
        lookup,
    };

    OutputFormatter::info(&format!("Processing: {}", opts.root.display()));
    let plan = Planner::plan(&ctx).map_err(|e| format!("Planning failed: {}", e))?;
    report_unclassified(&plan);

    let mut summary = RunSummary {
        planned: plan.ops.len(),
        unclassified: plan.unclassified.len(),
        ..RunSummary::default()
    };

    match opts.mode {
        Mode::DryRun => {
            for planned in &plan.ops {
                OutputFormatter::dry_run_notice(&planned.op.describe());
            }
            let swept = sweep::sweep(&opts.root, &plan.touched_dirs, None, 0)
                .map_err(|e| format!("Sweep failed: {}", e))?;
            for dir in &swept.removed {
                OutputFormatter::dry_run_notice(&format!(
                    "remove empty dir {}",
                    dir.display()
                ));
            }
            summary.swept = swept.removed.len();
            OutputFormatter::summary_table(&plan.op_counts(), plan.ops.len());
            OutputFormatter::success("Dry run complete. No files were modified.");
            OutputFormatter::plain("Run again with --commit to apply, or --plan to journal only.");
        }
        Mode::PlanOnly => {
            let mut journal =
                Journal::create(&opts.root).map_err(|e| format!("Journal error: {}", e))?;
            journal
                .record_plan(&plan.ops)
                .map_err(|e| format!("Journal error: {}", e))?;
            summary.journal = Some(journal.path().to_path_buf());
            OutputFormatter::summary_table(&plan.op_counts(), plan.ops.len());
            OutputFormatter::success(&format!(
                "Plan written to {} (nothing applied)",
                journal.path().display()
            ));
        }
        Mode::Commit => {
            // The journal hits durable storage before the first mutation;
            // a crash from here on leaves a replayable record.
            let mut journal =
                Journal::create(&opts.root).map_err(|e| format!("Journal error: {}", e))?;
            journal
                .record_plan(&plan.ops)
                .map_err(|e| format!("Journal error: {}", e))?;

            let pb = OutputFormatter::create_progress_bar(plan.ops.len() as u64);
            let report = crate::execute::execute(&plan.ops, &mut journal, Some(&pb))
                .map_err(|e| format!("Journal error: {}", e))?;
            pb.finish_and_clear();

            let next_seq = plan.ops.last().map(|p| p.seq + 1).unwrap_or(0);
            let swept =
                sweep::sweep(&opts.root, &plan.touched_dirs, Some(&mut journal), next_seq)
                    .map_err(|e| format!("Journal error: {}", e))?;

            summary.applied = report.applied;
            summary.failed = report.failed;
            summary.swept = swept.removed.len();
            summary.journal = Some(journal.path().to_path_buf());

            report_remaining_folders(&opts.root, &plan);
            print_commit_summary(&summary);
        }
    }

    Ok(summary)
}

/// Undo a previous run from its journal.
pub fn run_undo(journal_path: &Path) -> Result<crate::undo::UndoReport, String> {
    OutputFormatter::info(&format!("Undoing from: {}", journal_path.display()));

    let report = UndoManager::undo(journal_path).map_err(|e| format!("Undo failed: {}", e))?;

    OutputFormatter::header("UNDO SUMMARY");
    OutputFormatter::plain(&format!("  Restored files: {}", report.restored));
    OutputFormatter::plain(&format!("  Recreated dirs: {}", report.recreated_dirs));
    OutputFormatter::plain(&format!("  Removed dirs:   {}", report.removed_dirs));

    if !report.irreversible.is_empty() {
        OutputFormatter::warning(&format!(
            "{} deletion(s) could not be reversed:",
            report.irreversible.len()
        ));
        for path in &report.irreversible {
            OutputFormatter::plain(&format!("  - {}", path.display()));
        }
    }
    for (path, reason) in &report.skipped {
        OutputFormatter::warning(&format!("Skipped {}: {}", path.display(), reason));
    }
    for (path, reason) in &report.failed {
        OutputFormatter::error(&format!("Failed {}: {}", path.display(), reason));
    }

    if report.is_complete_success() {
        OutputFormatter::success("Undo complete.");
    } else {
        OutputFormatter::error("Undo finished with failures; see above.");
    }

    Ok(report)
}

fn report_unclassified(plan: &Plan) {
    if plan.unclassified.is_empty() {
        return;
    }
    OutputFormatter::warning(&format!(
        "{} file(s) left unclassified:",
        plan.unclassified.len()
    ));
    for (path, reason) in &plan.unclassified {
        OutputFormatter::plain(&format!("  - {} ({})", path.display(), reason));
    }
}

/// Report tracked release folders that survived the run, mirroring what
/// the sweep could not remove.
fn report_remaining_folders(root: &Path, plan: &Plan) {
    let still_exist: Vec<_> = plan
        .tracked_folders
        .iter()
        .filter(|folder| folder.exists() && folder.as_path() != root)
        .collect();
    if still_exist.is_empty() {
        return;
    }
    OutputFormatter::warning(&format!(
        "{} non-clean folder(s) still exist:",
        still_exist.len()
    ));
    for folder in still_exist {
        OutputFormatter::plain(&format!("  - {}", folder.display()));
    }
}

fn print_commit_summary(summary: &RunSummary) {
    OutputFormatter::header("RUN SUMMARY");
    OutputFormatter::plain(&format!("  Planned:      {}", summary.planned));
    OutputFormatter::plain(&format!("  Applied:      {}", summary.applied));
    OutputFormatter::plain(&format!("  Failed:       {}", summary.failed));
    OutputFormatter::plain(&format!("  Swept dirs:   {}", summary.swept));
    OutputFormatter::plain(&format!("  Unclassified: {}", summary.unclassified));
    if let Some(journal) = &summary.journal {
        OutputFormatter::plain(&format!("  Journal:      {}", journal.display()));
        OutputFormatter::plain(&format!(
            "Use 'mediatidy --undo {}' to revert this run.",
            journal.display()
        ));
    }

    if summary.failed == 0 {
        OutputFormatter::success("Run complete.");
    } else {
        OutputFormatter::error("Run finished with failed operations; see the journal.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_run_rejects_missing_root() {
        let result = run(&RunOptions {
            root: PathBuf::from("/non/existent/path"),
            mode: Mode::DryRun,
            quarantine: None,
            config: None,
            use_lookup: false,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_dry_run_leaves_tree_untouched() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("Show.Name.S01E02.mkv");
        fs::write(&file, b"v").unwrap();

        let summary = run(&RunOptions {
            root: temp_dir.path().to_path_buf(),
            mode: Mode::DryRun,
            quarantine: None,
            config: None,
            use_lookup: false,
        })
        .expect("dry run succeeds");

        assert!(summary.planned > 0);
        assert!(summary.journal.is_none());
        assert!(file.exists(), "dry-run must not move anything");
    }

    #[test]
    fn test_commit_moves_and_journals() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("Show.Name.S01E02.mkv"), b"v").unwrap();

        let summary = run(&RunOptions {
            root: temp_dir.path().to_path_buf(),
            mode: Mode::Commit,
            quarantine: None,
            config: None,
            use_lookup: false,
        })
        .expect("commit succeeds");

        assert_eq!(summary.failed, 0);
        assert!(summary.journal.as_ref().unwrap().exists());
        assert!(temp_dir
            .path()
            .join("Show Name")
            .join("Season 01")
            .join("Show.Name.S01E02.mkv")
            .exists());
    }

    #[test]
    fn test_cli_args_modes() {
        let args = CliArgs::parse_from(["mediatidy", "/tmp/x", "--commit"]);
        assert!(args.commit);
        assert!(!args.plan);

        let args = CliArgs::parse_from(["mediatidy", "--undo", "/tmp/journal.jsonl"]);
        assert!(args.undo.is_some());
        assert!(args.root.is_none());

        // --commit and --undo are mutually exclusive.
        assert!(CliArgs::try_parse_from(["mediatidy", "/tmp/x", "--commit", "--undo", "j"]).is_err());
    }
}
