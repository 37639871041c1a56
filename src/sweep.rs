//! Post-run removal of directories the run left empty.
//!
//! The sweeper confines itself to directories the planner touched (and
//! their descendants), so unrelated empty folders elsewhere in the tree
//! are never deleted. Removal is bottom-up and journaled, which makes it
//! reversible by undo.

use crate::journal::{Journal, JournalResult, Outcome};
use crate::plan::{Operation, PlannedOp};
use log::{info, warn};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What the sweep removed, or would remove in dry-run.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Directories removed (or candidates, in dry-run), deepest first.
    pub removed: Vec<PathBuf>,
}

/// Sweep empty directories under the touched set.
///
/// In commit mode (`journal` present) every removal is appended to the
/// journal as an applied `RemoveEmptyDir` with sequence numbers starting
/// at `next_seq`. Without a journal the sweep only reports candidates.
pub fn sweep(
    root: &Path,
    touched: &BTreeSet<PathBuf>,
    mut journal: Option<&mut Journal>,
    mut next_seq: u64,
) -> JournalResult<SweepReport> {
    let commit = journal.is_some();
    let mut report = SweepReport::default();

    // Candidate directories: every touched directory plus everything
    // below it, deepest first so children fall before their parents.
    let mut candidates = BTreeSet::new();
    for dir in touched {
        if dir == root || !dir.exists() {
            continue;
        }
        for entry in WalkDir::new(dir).into_iter().flatten() {
            if entry.file_type().is_dir() {
                candidates.insert(entry.path().to_path_buf());
            }
        }
    }
    let mut ordered: Vec<PathBuf> = candidates.into_iter().collect();
    ordered.sort_by_key(|p| std::cmp::Reverse(p.components().count()));

    let mut removed: HashSet<PathBuf> = HashSet::new();
    for dir in ordered {
        if dir == root {
            continue;
        }
        if !is_effectively_empty(&dir, &removed) {
            continue;
        }

        if commit {
            if let Err(e) = fs::remove_dir(&dir) {
                warn!("SWEEP SKIP: {}: {}", dir.display(), e);
                continue;
            }
            info!("REMOVE EMPTY DIR: {}", dir.display());
            if let Some(j) = journal.as_deref_mut() {
                j.record_outcome(
                    &PlannedOp {
                        seq: next_seq,
                        op: Operation::RemoveEmptyDir { path: dir.clone() },
                        size: None,
                    },
                    Outcome::Applied,
                    None,
                )?;
            }
            next_seq += 1;
        } else {
            info!("WOULD REMOVE EMPTY DIR: {}", dir.display());
        }

        removed.insert(dir.clone());
        report.removed.push(dir);
    }

    Ok(report)
}

/// A directory counts as empty when every entry it still holds is a
/// directory already removed (or slated for removal) by this sweep.
fn is_effectively_empty(dir: &Path, removed: &HashSet<PathBuf>) -> bool {
    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries.flatten() {
                if !removed.contains(&entry.path()) {
                    return false;
                }
            }
            true
        }
        Err(_) => false,
    }
}
