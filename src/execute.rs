//! Applies a plan to the filesystem, one operation at a time.
//!
//! Every operation is isolated: a failure is journaled with its error
//! and execution continues with the rest of the plan. Moves fall back to
//! copy-verify-delete when the rename crosses a device boundary, and the
//! source is never deleted before the copy is verified against it.

use crate::conflict::fingerprint;
use crate::journal::{Journal, JournalResult, Outcome};
use crate::plan::{Operation, PlannedOp};
use indicatif::ProgressBar;
use log::{info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Counts of what execution did.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecReport {
    /// Operations applied successfully.
    pub applied: usize,
    /// Operations that failed; each is journaled with its error.
    pub failed: usize,
}

/// Apply all operations in sequence order, journaling each outcome.
///
/// # Errors
///
/// Only journal write failures propagate; they are catastrophic because
/// an unjournaled mutation could not be undone.
pub fn execute(
    ops: &[PlannedOp],
    journal: &mut Journal,
    progress: Option<&ProgressBar>,
) -> JournalResult<ExecReport> {
    let mut report = ExecReport::default();

    for planned in ops {
        match apply(&planned.op) {
            Ok(()) => {
                report.applied += 1;
                journal.record_outcome(planned, Outcome::Applied, None)?;
            }
            Err(e) => {
                warn!("FAILED: {}: {}", planned.op.describe(), e);
                report.failed += 1;
                journal.record_outcome(planned, Outcome::Failed, Some(e.to_string()))?;
            }
        }
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    Ok(report)
}

fn apply(op: &Operation) -> io::Result<()> {
    match op {
        Operation::Move { src, dst } => move_file(src, dst),
        Operation::Delete { path } => fs::remove_file(path),
        Operation::Quarantine { src, dst } => {
            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            move_file(src, dst)
        }
        Operation::CreateDir { path } => match fs::create_dir(path) {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            other => other,
        },
        Operation::RemoveEmptyDir { path } => fs::remove_dir(path),
    }
}

/// Move a file, surviving cross-device boundaries.
///
/// A plain rename is attempted first. On a cross-device failure the file
/// is copied to a temporary name beside the destination, the copy is
/// verified (size, then full fingerprint), renamed into place, and only
/// then is the source deleted. Any failure along the way leaves the
/// source untouched.
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            info!(
                "CROSS-DEVICE MOVE, COPYING: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_verify_replace(src, dst)
        }
        Err(e) => Err(e),
    }
}

fn copy_verify_replace(src: &Path, dst: &Path) -> io::Result<()> {
    let tmp = partial_path(dst);
    let result = copy_and_verify(src, dst, &tmp);
    if result.is_err() {
        // Best effort; the temp file is an artifact, the source is the
        // data.
        let _ = fs::remove_file(&tmp);
        return result;
    }
    fs::remove_file(src)
}

fn copy_and_verify(src: &Path, dst: &Path, tmp: &Path) -> io::Result<()> {
    {
        let mut reader = fs::File::open(src)?;
        let mut writer = fs::File::create(tmp)?;
        io::copy(&mut reader, &mut writer)?;
        writer.sync_all()?;
    }

    let src_len = fs::metadata(src)?.len();
    let tmp_len = fs::metadata(tmp)?.len();
    if src_len != tmp_len {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("copy size mismatch: {} != {}", tmp_len, src_len),
        ));
    }
    if fingerprint(src)? != fingerprint(tmp)? {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "copy fingerprint mismatch",
        ));
    }

    fs::rename(tmp, dst)
}

fn partial_path(dst: &Path) -> PathBuf {
    let name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    match dst.parent() {
        Some(parent) => parent.join(format!(".{}.part", name)),
        None => PathBuf::from(format!(".{}.part", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::Journal;
    use std::fs;
    use tempfile::TempDir;

    fn planned(seq: u64, op: Operation) -> PlannedOp {
        PlannedOp {
            seq,
            op,
            size: None,
        }
    }

    #[test]
    fn test_execute_applies_in_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("file.mkv");
        fs::write(&src, b"payload").unwrap();
        let dir = temp_dir.path().join("Show Name");
        let dst = dir.join("file.mkv");

        let ops = vec![
            planned(0, Operation::CreateDir { path: dir.clone() }),
            planned(
                1,
                Operation::Move {
                    src: src.clone(),
                    dst: dst.clone(),
                },
            ),
        ];

        let mut journal = Journal::create(temp_dir.path()).expect("journal created");
        journal.record_plan(&ops).expect("plan recorded");
        let report = execute(&ops, &mut journal, None).expect("execution runs");

        assert_eq!(report.applied, 2);
        assert_eq!(report.failed, 0);
        assert!(!src.exists());
        assert!(dst.exists());
    }

    #[test]
    fn test_failed_operation_isolated() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let missing = temp_dir.path().join("not-there.mkv");
        let present = temp_dir.path().join("there.mkv");
        fs::write(&present, b"x").unwrap();

        let ops = vec![
            planned(0, Operation::Delete { path: missing }),
            planned(
                1,
                Operation::Delete {
                    path: present.clone(),
                },
            ),
        ];

        let mut journal = Journal::create(temp_dir.path()).expect("journal created");
        journal.record_plan(&ops).expect("plan recorded");
        let report = execute(&ops, &mut journal, None).expect("execution runs");

        assert_eq!(report.failed, 1);
        assert_eq!(report.applied, 1);
        assert!(!present.exists(), "later operations still run");

        let entries = Journal::load(journal.path()).expect("journal loads");
        assert_eq!(entries[0].outcome, Outcome::Failed);
        assert!(entries[0].error.is_some());
        assert_eq!(entries[1].outcome, Outcome::Applied);
    }

    #[test]
    fn test_create_dir_tolerates_existing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("existing");
        fs::create_dir(&dir).unwrap();

        assert!(apply(&Operation::CreateDir { path: dir }).is_ok());
    }

    #[test]
    fn test_copy_verify_replace_moves_content() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("src.mkv");
        let dst = temp_dir.path().join("dst.mkv");
        fs::write(&src, b"full payload").unwrap();

        copy_verify_replace(&src, &dst).expect("copy path works");
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"full payload");
        // No temp residue.
        assert!(!temp_dir.path().join(".dst.mkv.part").exists());
    }

    #[test]
    fn test_copy_failure_preserves_source() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("src.mkv");
        fs::write(&src, b"precious").unwrap();
        // Destination parent does not exist, so the copy fails.
        let dst = temp_dir.path().join("missing-dir").join("dst.mkv");

        assert!(copy_verify_replace(&src, &dst).is_err());
        assert_eq!(fs::read(&src).unwrap(), b"precious");
    }
}
