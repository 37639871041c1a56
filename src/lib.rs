//! mediatidy - a transactional reorganizer for TV and movie files
//!
//! This library classifies loosely-named media files, plans a set of
//! filesystem operations (moves, deletes, directory changes), resolves
//! naming conflicts and duplicates by content, executes the plan with
//! cross-device and partial-failure safety, and records everything in a
//! replayable journal that can undo a prior run.

pub mod classify;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod execute;
pub mod journal;
pub mod lookup;
pub mod output;
pub mod plan;
pub mod resolve;
pub mod sweep;
pub mod undo;

pub use classify::{Category, Classifier, Entry, Identity};
pub use config::{CompiledPolicy, ConfigError, PolicyConfig};
pub use journal::{Journal, JournalError, Outcome};
pub use plan::{Operation, Plan, Planner, RunContext};
pub use undo::{UndoManager, UndoReport};

pub use cli::{run, run_undo, Mode, RunOptions, RunSummary};
