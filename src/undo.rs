//! Undo: reverse replay of a previously committed journal.
//!
//! Applied operations are replayed in reverse sequence order with their
//! effect inverted: moves go back, removed directories are recreated,
//! created directories are removed if still empty, and quarantined files
//! return to their source when still unmodified. Deletes cannot be
//! undone; they are reported as irreversible without failing the run.

use crate::execute::move_file;
use crate::journal::{FoldedEntry, Journal, JournalError, Outcome};
use crate::plan::Operation;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Represents the result of an undo run.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Files moved back to their original locations.
    pub restored: usize,
    /// Directories recreated (undone RemoveEmptyDir entries).
    pub recreated_dirs: usize,
    /// Directories removed (undone CreateDir entries).
    pub removed_dirs: usize,
    /// Deleted paths that cannot be brought back.
    pub irreversible: Vec<PathBuf>,
    /// Entries skipped with the reason (file missing, modified, or the
    /// original location occupied).
    pub skipped: Vec<(PathBuf, String)>,
    /// Entries whose reversal was attempted and failed.
    pub failed: Vec<(PathBuf, String)>,
}

impl UndoReport {
    /// True when nothing went wrong; skipped and irreversible entries do
    /// not count as failures.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Errors that prevent an undo run from starting.
#[derive(Debug)]
pub enum UndoError {
    /// The journal could not be read or parsed.
    Journal(JournalError),
    /// The journal holds no applied operations to reverse.
    NothingApplied(PathBuf),
}

impl std::fmt::Display for UndoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UndoError::Journal(e) => write!(f, "{}", e),
            UndoError::NothingApplied(path) => {
                write!(
                    f,
                    "Journal {} holds no applied operations to undo",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for UndoError {}

impl From<JournalError> for UndoError {
    fn from(e: JournalError) -> Self {
        UndoError::Journal(e)
    }
}

/// Replays a committed journal in reverse.
pub struct UndoManager;

impl UndoManager {
    /// Undo the applied operations of a journal file.
    ///
    /// Processes entries in reverse sequence order (undo is LIFO).
    /// Per-entry problems are collected in the report; only an unreadable
    /// journal or one with nothing applied aborts the run.
    pub fn undo(journal_path: &Path) -> Result<UndoReport, UndoError> {
        let entries = Journal::load(journal_path)?;

        let applied: Vec<&FoldedEntry> = entries
            .iter()
            .filter(|e| e.outcome == Outcome::Applied)
            .collect();
        if applied.is_empty() {
            return Err(UndoError::NothingApplied(journal_path.to_path_buf()));
        }

        let mut report = UndoReport::default();
        for entry in applied.into_iter().rev() {
            Self::reverse_entry(entry, &mut report);
        }
        Ok(report)
    }

    fn reverse_entry(entry: &FoldedEntry, report: &mut UndoReport) {
        match &entry.op {
            Operation::Move { src, dst } => {
                Self::restore_file(dst, src, None, report);
            }
            Operation::Quarantine { src, dst } => {
                // A quarantined file only returns when still unmodified,
                // judged by the size recorded at plan time.
                Self::restore_file(dst, src, entry.size, report);
            }
            Operation::Delete { path } => {
                warn!("CANNOT UNDO DELETE: {}", path.display());
                report.irreversible.push(path.clone());
            }
            Operation::CreateDir { path } => match fs::remove_dir(path) {
                Ok(()) => {
                    info!("UNDO CREATE DIR: {}", path.display());
                    report.removed_dirs += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    report
                        .skipped
                        .push((path.clone(), "directory already gone".to_string()));
                }
                Err(_) => {
                    // Still holds something; leaving it is the safe choice.
                    report
                        .skipped
                        .push((path.clone(), "directory not empty".to_string()));
                }
            },
            Operation::RemoveEmptyDir { path } => match fs::create_dir_all(path) {
                Ok(()) => {
                    info!("UNDO REMOVE DIR: {}", path.display());
                    report.recreated_dirs += 1;
                }
                Err(e) => {
                    report
                        .failed
                        .push((path.clone(), format!("could not recreate: {}", e)));
                }
            },
        }
    }

    /// Move a file from its run destination back to its original source.
    fn restore_file(
        current: &Path,
        original: &Path,
        expected_size: Option<u64>,
        report: &mut UndoReport,
    ) {
        if !current.exists() {
            report.skipped.push((
                current.to_path_buf(),
                "file not found at expected location".to_string(),
            ));
            return;
        }

        if let Some(expected) = expected_size {
            let actual = fs::metadata(current).map(|m| m.len()).ok();
            if actual != Some(expected) {
                report.skipped.push((
                    current.to_path_buf(),
                    "file was modified after the run".to_string(),
                ));
                return;
            }
        }

        if original.exists() {
            report.skipped.push((
                current.to_path_buf(),
                "original location is occupied".to_string(),
            ));
            return;
        }

        if let Some(parent) = original.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            report.failed.push((
                current.to_path_buf(),
                format!("could not recreate parent: {}", e),
            ));
            return;
        }

        match move_file(current, original) {
            Ok(()) => {
                info!(
                    "UNDO MOVE: {} -> {}",
                    current.display(),
                    original.display()
                );
                report.restored += 1;
            }
            Err(e) => {
                report
                    .failed
                    .push((current.to_path_buf(), format!("failed to restore: {}", e)));
            }
        }
    }
}
