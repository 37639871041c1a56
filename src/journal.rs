//! The durable, append-only journal of a run.
//!
//! One journal file per run, line-delimited JSON, written at the
//! processed root. Planning writes every operation as a `planned` record
//! before anything is applied; execution appends one `applied` or
//! `failed` record per operation. Loading folds records by sequence
//! number, last outcome wins, so a crash at any point leaves a journal
//! that precisely reflects what was attempted.

use crate::plan::{Operation, PlannedOp, JOURNAL_PREFIX};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Outcome of one journaled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Recorded before execution.
    Planned,
    /// Applied successfully.
    Applied,
    /// Attempted and failed; the error detail is recorded.
    Failed,
}

/// One line of the journal file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Sequence number; journal order and (reversed) undo order.
    pub seq: u64,
    /// The operation, flattened into the record.
    #[serde(flatten)]
    pub op: Operation,
    /// Source size at plan time for Move/Quarantine records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// RFC 3339 timestamp of when the record was written.
    pub timestamp: String,
    /// Outcome at the time of writing.
    pub outcome: Outcome,
    /// Error detail for failed records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One operation's final state after folding a journal.
#[derive(Debug, Clone)]
pub struct FoldedEntry {
    pub seq: u64,
    pub op: Operation,
    pub size: Option<u64>,
    pub outcome: Outcome,
    pub error: Option<String>,
}

/// Errors around journal persistence.
#[derive(Debug)]
pub enum JournalError {
    /// The journal file could not be created.
    CreateFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A record could not be written or flushed.
    WriteFailed { source: std::io::Error },
    /// The journal file could not be read.
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A line is not a valid journal record.
    InvalidFormat { line: usize, reason: String },
}

impl std::fmt::Display for JournalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CreateFailed { path, source } => {
                write!(f, "Failed to create journal {}: {}", path.display(), source)
            }
            Self::WriteFailed { source } => write!(f, "Failed to write journal: {}", source),
            Self::ReadFailed { path, source } => {
                write!(f, "Failed to read journal {}: {}", path.display(), source)
            }
            Self::InvalidFormat { line, reason } => {
                write!(f, "Invalid journal record on line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for JournalError {}

/// Result type for journal operations.
pub type JournalResult<T> = Result<T, JournalError>;

/// An open, append-only journal for the current run.
pub struct Journal {
    path: PathBuf,
    file: File,
}

impl Journal {
    /// Create the journal file for a run at the processed root.
    ///
    /// The name embeds the run timestamp:
    /// `.mediatidy-journal-YYYYmmdd-HHMMSS.jsonl`. A second run within
    /// the same second gets a numeric suffix; journals are never shared.
    pub fn create(root: &Path) -> JournalResult<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("{}-{}.jsonl", JOURNAL_PREFIX, stamp)
            } else {
                format!("{}-{}-{}.jsonl", JOURNAL_PREFIX, stamp, attempt)
            };
            let path = root.join(name);
            match OpenOptions::new().create_new(true).append(true).open(&path) {
                Ok(file) => return Ok(Self { path, file }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    attempt += 1;
                }
                Err(e) => {
                    return Err(JournalError::CreateFailed { path, source: e });
                }
            }
        }
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the full plan as `planned` records and force it to durable
    /// storage. Nothing may be applied before this returns.
    pub fn record_plan(&mut self, ops: &[PlannedOp]) -> JournalResult<()> {
        for planned in ops {
            self.write_record(&JournalRecord {
                seq: planned.seq,
                op: planned.op.clone(),
                size: planned.size,
                timestamp: chrono::Utc::now().to_rfc3339(),
                outcome: Outcome::Planned,
                error: None,
            })?;
        }
        self.file
            .sync_all()
            .map_err(|e| JournalError::WriteFailed { source: e })
    }

    /// Append the outcome of one executed operation.
    pub fn record_outcome(
        &mut self,
        planned: &PlannedOp,
        outcome: Outcome,
        error: Option<String>,
    ) -> JournalResult<()> {
        self.write_record(&JournalRecord {
            seq: planned.seq,
            op: planned.op.clone(),
            size: planned.size,
            timestamp: chrono::Utc::now().to_rfc3339(),
            outcome,
            error,
        })
    }

    fn write_record(&mut self, record: &JournalRecord) -> JournalResult<()> {
        let line = serde_json::to_string(record).map_err(|e| JournalError::WriteFailed {
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()),
        })?;
        writeln!(self.file, "{}", line).map_err(|e| JournalError::WriteFailed { source: e })?;
        self.file
            .flush()
            .map_err(|e| JournalError::WriteFailed { source: e })
    }

    /// Load a journal file and fold its records by sequence number.
    ///
    /// Each operation appears once in the result, carrying the outcome of
    /// its last record; entries come back in sequence order.
    pub fn load(path: &Path) -> JournalResult<Vec<FoldedEntry>> {
        let file = File::open(path).map_err(|e| JournalError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut folded: BTreeMap<u64, FoldedEntry> = BTreeMap::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| JournalError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let record: JournalRecord =
                serde_json::from_str(&line).map_err(|e| JournalError::InvalidFormat {
                    line: index + 1,
                    reason: e.to_string(),
                })?;
            if let Some(entry) = folded.get_mut(&record.seq) {
                entry.outcome = record.outcome;
                entry.error = record.error;
            } else {
                folded.insert(
                    record.seq,
                    FoldedEntry {
                        seq: record.seq,
                        op: record.op,
                        size: record.size,
                        outcome: record.outcome,
                        error: record.error,
                    },
                );
            }
        }

        Ok(folded.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn planned_move(seq: u64, src: &str, dst: &str) -> PlannedOp {
        PlannedOp {
            seq,
            op: Operation::Move {
                src: PathBuf::from(src),
                dst: PathBuf::from(dst),
            },
            size: Some(42),
        }
    }

    #[test]
    fn test_plan_then_outcomes_fold() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut journal = Journal::create(temp_dir.path()).expect("journal created");

        let ops = vec![
            planned_move(0, "/a/one.mkv", "/b/one.mkv"),
            planned_move(1, "/a/two.mkv", "/b/two.mkv"),
        ];
        journal.record_plan(&ops).expect("plan recorded");
        journal
            .record_outcome(&ops[0], Outcome::Applied, None)
            .expect("outcome recorded");
        journal
            .record_outcome(&ops[1], Outcome::Failed, Some("permission denied".to_string()))
            .expect("outcome recorded");

        let entries = Journal::load(journal.path()).expect("journal loads");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].outcome, Outcome::Applied);
        assert_eq!(entries[1].outcome, Outcome::Failed);
        assert_eq!(entries[1].error.as_deref(), Some("permission denied"));
        assert_eq!(entries[0].size, Some(42));
    }

    #[test]
    fn test_plan_only_journal_stays_planned() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut journal = Journal::create(temp_dir.path()).expect("journal created");

        let ops = vec![planned_move(0, "/a/one.mkv", "/b/one.mkv")];
        journal.record_plan(&ops).expect("plan recorded");

        let entries = Journal::load(journal.path()).expect("journal loads");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, Outcome::Planned);
    }

    #[test]
    fn test_journal_name_carries_prefix() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let journal = Journal::create(temp_dir.path()).expect("journal created");
        let name = journal
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        assert!(name.starts_with(JOURNAL_PREFIX));
        assert!(name.ends_with(".jsonl"));
    }

    #[test]
    fn test_operation_round_trips_through_json() {
        let op = Operation::Quarantine {
            src: PathBuf::from("/a/sample.mkv"),
            dst: PathBuf::from("/q/sample.mkv"),
        };
        let record = JournalRecord {
            seq: 7,
            op: op.clone(),
            size: Some(1000),
            timestamp: chrono::Utc::now().to_rfc3339(),
            outcome: Outcome::Planned,
            error: None,
        };
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains("\"op\":\"quarantine\""));
        let parsed: JournalRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.op, op);
        assert_eq!(parsed.seq, 7);
    }

    #[test]
    fn test_invalid_line_rejected() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join(".mediatidy-journal-x.jsonl");
        std::fs::write(&path, "not json\n").unwrap();
        assert!(matches!(
            Journal::load(&path),
            Err(JournalError::InvalidFormat { line: 1, .. })
        ));
    }
}
