//! Operation planning: one ordered, purely in-memory plan per run.
//!
//! The planner walks the source tree once, runs each file through the
//! classifier, the path resolver, and the conflict resolver, and collects
//! the resulting filesystem operations. Nothing on disk changes while a
//! plan is built, which is what makes dry-run and plan-only modes
//! trivial: they stop here.

use crate::classify::{Category, Classifier, Identity};
use crate::config::CompiledPolicy;
use crate::conflict::{self, Resolution};
use crate::lookup::YearLookup;
use crate::resolve::PathResolver;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Filename prefix of this tool's journal files; always skipped.
pub const JOURNAL_PREFIX: &str = ".mediatidy-journal";

/// One planned filesystem action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Move a file to its canonical destination.
    Move { src: PathBuf, dst: PathBuf },
    /// Delete a file. Irreversible.
    Delete { path: PathBuf },
    /// Move a would-be deletion into the quarantine directory instead.
    Quarantine { src: PathBuf, dst: PathBuf },
    /// Create one directory level of a destination path.
    CreateDir { path: PathBuf },
    /// Remove a directory left empty by the run.
    RemoveEmptyDir { path: PathBuf },
}

impl Operation {
    /// Short kind label for summaries and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Move { .. } => "move",
            Operation::Delete { .. } => "delete",
            Operation::Quarantine { .. } => "quarantine",
            Operation::CreateDir { .. } => "create_dir",
            Operation::RemoveEmptyDir { .. } => "remove_empty_dir",
        }
    }

    /// One-line human-readable description.
    pub fn describe(&self) -> String {
        match self {
            Operation::Move { src, dst } => {
                format!("move {} -> {}", src.display(), dst.display())
            }
            Operation::Delete { path } => format!("delete {}", path.display()),
            Operation::Quarantine { src, dst } => {
                format!("quarantine {} -> {}", src.display(), dst.display())
            }
            Operation::CreateDir { path } => format!("create dir {}", path.display()),
            Operation::RemoveEmptyDir { path } => {
                format!("remove empty dir {}", path.display())
            }
        }
    }
}

/// An operation with its stable sequence number and pre-state facts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOp {
    /// Sequence number; assignment order is journal order, and undo runs
    /// in reverse of it.
    pub seq: u64,
    /// The operation itself.
    pub op: Operation,
    /// Source size at plan time for Move/Quarantine, used by undo to
    /// judge whether a quarantined file is still unmodified.
    pub size: Option<u64>,
}

/// The complete output of one planning pass.
#[derive(Debug, Default)]
pub struct Plan {
    /// Ordered operations.
    pub ops: Vec<PlannedOp>,
    /// Files that could not be classified, with the reason.
    pub unclassified: Vec<(PathBuf, String)>,
    /// Directories the plan touches; the sweeper confines itself to
    /// these and their descendants.
    pub touched_dirs: BTreeSet<PathBuf>,
    /// Release/wrapper folders observed during the walk, reported if
    /// they still exist after the run.
    pub tracked_folders: BTreeSet<PathBuf>,
}

impl Plan {
    /// True when the plan contains no operations.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Operation counts by kind, for the summary table.
    pub fn op_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for planned in &self.ops {
            *counts.entry(planned.op.kind().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

/// Everything a planning pass needs, passed explicitly so repeated runs
/// in one process never share state.
pub struct RunContext<'a> {
    /// The processed root directory.
    pub root: &'a Path,
    /// Compiled policy for this run.
    pub policy: &'a CompiledPolicy,
    /// Quarantine directory; junk deletes become moves into it.
    pub quarantine: Option<&'a Path>,
    /// Movie-year lookup capability.
    pub lookup: &'a dyn YearLookup,
}

/// Walks the tree and assembles the plan.
pub struct Planner<'a> {
    ctx: &'a RunContext<'a>,
    classifier: Classifier<'a>,
    resolver: PathResolver,
    plan: Plan,
    next_seq: u64,
    /// Destination paths already promised to an operation this run,
    /// mapped to the source that will produce them.
    claimed: HashMap<PathBuf, PathBuf>,
    /// Directories already covered by a planned CreateDir.
    created_dirs: HashSet<PathBuf>,
}

impl<'a> Planner<'a> {
    /// Build the plan for a run context.
    ///
    /// # Errors
    ///
    /// Only catastrophic conditions error out: an unreadable root or a
    /// failed top-level folder scan. Per-file problems are recorded in
    /// the plan's unclassified list instead.
    pub fn plan(ctx: &'a RunContext<'a>) -> io::Result<Plan> {
        let mut planner = Planner {
            ctx,
            classifier: Classifier::new(ctx.policy),
            resolver: PathResolver::new(ctx.root)?,
            plan: Plan::default(),
            next_seq: 0,
            claimed: HashMap::new(),
            created_dirs: HashSet::new(),
        };

        for file in planner.collect_files()? {
            planner.plan_file(&file);
        }

        Ok(planner.plan)
    }

    /// Collect all files under the root in a stable order, so the plan is
    /// deterministic for a given starting tree. Unreadable entries are
    /// logged and skipped rather than aborting the walk.
    fn collect_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(self.ctx.root).sort_by_file_name() {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => warn!("SKIP (walk error): {}", e),
            }
        }
        Ok(files)
    }

    fn plan_file(&mut self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if name.starts_with(JOURNAL_PREFIX) {
            return;
        }

        let relative = path.strip_prefix(self.ctx.root).unwrap_or(path);
        if self.ctx.policy.is_excluded(relative) {
            info!("SKIP (excluded): {}", path.display());
            return;
        }

        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("SKIP (unreadable): {}: {}", path.display(), e);
                self.plan
                    .unclassified
                    .push((path.to_path_buf(), format!("unreadable: {}", e)));
                return;
            }
        };

        let entry = self.classifier.classify(path, self.ctx.root, size);
        self.track_folders(path);

        // Hidden files that are not recognized junk stay untouched, and
        // silently so; deleting a stranger's dotfiles is not this tool's
        // job.
        if name.starts_with('.') && !entry.category.is_junk() {
            return;
        }

        match entry.category {
            Category::JunkSample
            | Category::JunkArchive
            | Category::JunkImage
            | Category::JunkMetadata => self.plan_junk(path, size, entry.category),
            Category::Video | Category::Subtitle => self.plan_media(entry),
            Category::Unclassified => {
                info!("SKIP (unknown ext, not in release folder): {}", path.display());
                self.plan
                    .unclassified
                    .push((path.to_path_buf(), "unknown file type".to_string()));
            }
        }
    }

    fn plan_junk(&mut self, path: &Path, size: u64, category: Category) {
        if let Some(quarantine) = self.ctx.quarantine {
            let relative = path.strip_prefix(self.ctx.root).unwrap_or(path);
            let dst = quarantine.join(relative);
            if dst.exists() || self.claimed.contains_key(&dst) {
                warn!(
                    "QUARANTINE DEST EXISTS, DELETING SOURCE: {}",
                    path.display()
                );
                self.push_delete(path);
                return;
            }
            info!(
                "QUARANTINE {}: {} -> {}",
                category.label().to_uppercase(),
                path.display(),
                dst.display()
            );
            self.claimed.insert(dst.clone(), path.to_path_buf());
            self.touch_source(path);
            self.push(
                Operation::Quarantine {
                    src: path.to_path_buf(),
                    dst,
                },
                Some(size),
            );
        } else {
            info!("DELETE {}: {}", category.label().to_uppercase(), path.display());
            self.push_delete(path);
        }
    }

    fn plan_media(&mut self, entry: crate::classify::Entry) {
        let path = entry.path.clone();

        // Language filtering for subtitle sidecars. Release-folder
        // sidecars are always subject to it; everything else only when
        // root-subtitle preservation is switched off.
        if entry.category == Category::Subtitle {
            let in_release = self.classifier.in_release_context(&path, self.ctx.root);
            let filtered = in_release || !self.ctx.policy.preserve_root_subtitles();
            let english = entry
                .subtitle
                .as_ref()
                .map(|t| t.is_english())
                .unwrap_or(false);
            if filtered && !english {
                info!("DELETE NON-ENGLISH SUBTITLE: {}", path.display());
                self.push_delete(&path);
                return;
            }
        }

        let Some(identity) = entry.identity.clone() else {
            warn!("SKIP (unparsed media): {}", path.display());
            self.plan
                .unclassified
                .push((path, "unparsed media name".to_string()));
            return;
        };

        // A movie without a year consults the lookup capability before
        // the destination can be computed.
        let identity = match identity {
            Identity::Movie { title, year: None } => {
                match self.ctx.lookup.year_for(&title) {
                    Some(year) => {
                        info!("YEAR LOOKUP: '{}' -> {}", title, year);
                        Identity::Movie {
                            title,
                            year: Some(year),
                        }
                    }
                    None => {
                        warn!("SKIP (no year, lookup unavailable): {}", path.display());
                        self.plan
                            .unclassified
                            .push((path, format!("no release year for '{}'", title)));
                        return;
                    }
                }
            }
            other => other,
        };

        let resolved_entry = crate::classify::Entry {
            identity: Some(identity),
            ..entry
        };
        let Some(mut dest) = self.resolver.resolve(&resolved_entry) else {
            warn!("SKIP (unparsed media): {}", path.display());
            self.plan
                .unclassified
                .push((path, "unparsed media name".to_string()));
            return;
        };

        // Already in canonical position: emit nothing.
        if dest == path {
            info!("OK (already placed): {}", path.display());
            return;
        }

        // Conflict resolution against the disk and against this plan.
        let occupant = if dest.exists() {
            Some(dest.clone())
        } else {
            self.claimed.get(&dest).cloned()
        };
        if let Some(occupant) = occupant {
            let claimed: HashSet<PathBuf> = self.claimed.keys().cloned().collect();
            match conflict::resolve_conflict(&path, &dest, &occupant, &claimed) {
                Ok(Resolution::DeleteSource) => {
                    info!(
                        "DUPLICATE: {} matches {} (deleting source)",
                        path.display(),
                        occupant.display()
                    );
                    self.push_delete(&path);
                    return;
                }
                Ok(Resolution::MoveTo(alt)) => {
                    if alt == path {
                        // Already parked on its alt slot from a prior run.
                        info!("OK (already placed): {}", path.display());
                        return;
                    }
                    warn!("DEST EXISTS, USING ALT: {}", alt.display());
                    dest = alt;
                }
                Err(e) => {
                    warn!("SKIP (compare failed): {}: {}", path.display(), e);
                    self.plan
                        .unclassified
                        .push((path, format!("content comparison failed: {}", e)));
                    return;
                }
            }
        }

        self.ensure_dirs(&dest);
        info!("MOVE: {} -> {}", path.display(), dest.display());
        self.claimed.insert(dest.clone(), path.clone());
        self.touch_source(&path);
        self.push(
            Operation::Move {
                src: path,
                dst: dest,
            },
            Some(resolved_entry.size),
        );
    }

    /// Emit deduplicated CreateDir operations for every missing ancestor
    /// of a destination, outermost first.
    fn ensure_dirs(&mut self, dest: &Path) {
        let Some(parent) = dest.parent() else {
            return;
        };
        let mut missing = Vec::new();
        let mut current = parent;
        while current != self.ctx.root && current.starts_with(self.ctx.root) {
            if current.exists() || self.created_dirs.contains(current) {
                break;
            }
            missing.push(current.to_path_buf());
            match current.parent() {
                Some(next) => current = next,
                None => break,
            }
        }
        for dir in missing.into_iter().rev() {
            self.created_dirs.insert(dir.clone());
            self.push(Operation::CreateDir { path: dir }, None);
        }
    }

    fn push_delete(&mut self, path: &Path) {
        self.touch_source(path);
        self.push(
            Operation::Delete {
                path: path.to_path_buf(),
            },
            None,
        );
    }

    fn push(&mut self, op: Operation, size: Option<u64>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.plan.ops.push(PlannedOp { seq, op, size });
    }

    /// Record the source's directory chain as touched by the run.
    fn touch_source(&mut self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.ctx.root || !dir.starts_with(self.ctx.root) {
                break;
            }
            self.plan.touched_dirs.insert(dir.to_path_buf());
            current = dir.parent();
        }
    }

    /// Track release folders and non-clean parents for the end-of-run
    /// report.
    fn track_folders(&mut self, path: &Path) {
        let Ok(relative) = path.strip_prefix(self.ctx.root) else {
            return;
        };
        let components: Vec<_> = relative.components().collect();

        if components.len() >= 2 {
            let top_name = components[0].as_os_str().to_string_lossy();
            if self.ctx.policy.is_release_folder_name(&top_name) {
                self.plan
                    .tracked_folders
                    .insert(self.ctx.root.join(components[0].as_os_str()));
            }
        }

        if components.len() >= 3
            && let Some(parent) = path.parent()
            && let Some(parent_name) = parent.file_name()
            && !self
                .classifier
                .is_clean_folder_name(&parent_name.to_string_lossy())
        {
            self.plan.tracked_folders.insert(parent.to_path_buf());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::NoLookup;
    use std::fs;
    use tempfile::TempDir;

    fn plan_for(root: &Path, policy: &CompiledPolicy) -> Plan {
        let ctx = RunContext {
            root,
            policy,
            quarantine: None,
            lookup: &NoLookup,
        };
        Planner::plan(&ctx).expect("planning succeeds")
    }

    #[test]
    fn test_episode_move_planned() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("Show.Name.S01E02.1080p.WEB.mkv"), b"v").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);

        let moves: Vec<_> = plan
            .ops
            .iter()
            .filter_map(|p| match &p.op {
                Operation::Move { src, dst } => Some((src.clone(), dst.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(moves.len(), 1);
        assert_eq!(
            moves[0].1,
            temp_dir
                .path()
                .join("Show Name")
                .join("Season 01")
                .join("Show.Name.S01E02.mkv")
        );

        // CreateDir for show folder and season folder, in outer-to-inner
        // order, before the move.
        let kinds: Vec<_> = plan.ops.iter().map(|p| p.op.kind()).collect();
        assert_eq!(kinds, vec!["create_dir", "create_dir", "move"]);
    }

    #[test]
    fn test_create_dir_deduplicated() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("Show.Name.S01E01.mkv"), b"a").unwrap();
        fs::write(temp_dir.path().join("Show.Name.S01E02.mkv"), b"b").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);

        let create_dirs = plan
            .ops
            .iter()
            .filter(|p| matches!(p.op, Operation::CreateDir { .. }))
            .count();
        assert_eq!(create_dirs, 2); // show folder + season folder, once each
    }

    #[test]
    fn test_idempotent_tree_produces_empty_plan() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let season = temp_dir.path().join("Show Name").join("Season 01");
        fs::create_dir_all(&season).unwrap();
        fs::write(season.join("Show.Name.S01E02.mkv"), b"v").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);
        assert!(plan.is_empty(), "clean tree must produce an empty plan");
    }

    #[test]
    fn test_duplicate_content_deletes_source() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let season = temp_dir.path().join("Show Name").join("Season 01");
        fs::create_dir_all(&season).unwrap();
        fs::write(season.join("Show.Name.S01E02.mkv"), b"same bytes").unwrap();
        fs::write(temp_dir.path().join("Show.Name.S01E02.720p.mkv"), b"same bytes").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);

        assert_eq!(plan.ops.len(), 1);
        assert!(matches!(plan.ops[0].op, Operation::Delete { .. }));
    }

    #[test]
    fn test_conflicting_content_moves_to_alt() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let movie_dir = temp_dir.path().join("Movie Title (2020)");
        fs::create_dir_all(&movie_dir).unwrap();
        fs::write(movie_dir.join("Movie Title (2020).mkv"), b"release one").unwrap();
        fs::write(temp_dir.path().join("Movie.Title.2020.mkv"), b"release two").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);

        let moves: Vec<_> = plan
            .ops
            .iter()
            .filter_map(|p| match &p.op {
                Operation::Move { dst, .. } => Some(dst.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(moves, vec![movie_dir.join("Movie Title (2020) (alt).mkv")]);
    }

    #[test]
    fn test_two_sources_same_destination() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("Movie.Title.2020.mkv"), b"bytes one").unwrap();
        fs::write(temp_dir.path().join("Movie Title (2020).mkv"), b"bytes two").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);

        let mut dests: Vec<_> = plan
            .ops
            .iter()
            .filter_map(|p| match &p.op {
                Operation::Move { dst, .. } => {
                    Some(dst.file_name().unwrap().to_string_lossy().into_owned())
                }
                _ => None,
            })
            .collect();
        dests.sort();
        assert_eq!(
            dests,
            vec!["Movie Title (2020) (alt).mkv", "Movie Title (2020).mkv"]
        );
    }

    #[test]
    fn test_junk_deleted_and_release_subtitle_filtered() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let release = temp_dir.path().join("Show.Name.S01E02.1080p.WEB-GRP");
        fs::create_dir_all(&release).unwrap();
        fs::write(release.join("Show.Name.S01E02.mkv"), b"v").unwrap();
        fs::write(release.join("Show.Name.S01E02.spa.srt"), b"s").unwrap();
        fs::write(release.join("release.nfo"), b"n").unwrap();
        fs::write(release.join("cover.jpg"), b"j").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);

        let deletes: Vec<_> = plan
            .ops
            .iter()
            .filter_map(|p| match &p.op {
                Operation::Delete { path } => {
                    Some(path.file_name().unwrap().to_string_lossy().into_owned())
                }
                _ => None,
            })
            .collect();
        assert!(deletes.contains(&"Show.Name.S01E02.spa.srt".to_string()));
        assert!(deletes.contains(&"release.nfo".to_string()));
        assert!(deletes.contains(&"cover.jpg".to_string()));

        // The video still moves out.
        assert!(plan
            .ops
            .iter()
            .any(|p| matches!(&p.op, Operation::Move { .. })));
    }

    #[test]
    fn test_root_subtitle_preserved_by_default() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("Show.Name.S01E02.spa.srt"), b"s").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);

        // Preserved means moved to its canonical place, not deleted.
        assert!(plan
            .ops
            .iter()
            .all(|p| !matches!(&p.op, Operation::Delete { .. })));
        assert!(plan
            .ops
            .iter()
            .any(|p| matches!(&p.op, Operation::Move { .. })));
    }

    #[test]
    fn test_root_subtitle_filtered_when_disabled() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("Show.Name.S01E02.spa.srt"), b"s").unwrap();

        let config: crate::config::PolicyConfig = toml::from_str(
            r#"
            [policy]
            preserve_root_subtitles = false
            "#,
        )
        .unwrap();
        let policy = config.compile().unwrap();
        let plan = plan_for(temp_dir.path(), &policy);

        assert_eq!(plan.ops.len(), 1);
        assert!(matches!(plan.ops[0].op, Operation::Delete { .. }));
    }

    #[test]
    fn test_quarantine_redirects_junk_preserving_relative_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let quarantine = TempDir::new().expect("Failed to create temp directory");
        let release = temp_dir.path().join("Some.Release.1080p-GRP");
        fs::create_dir_all(&release).unwrap();
        fs::write(release.join("sample.mkv"), b"s").unwrap();

        let policy = CompiledPolicy::default();
        let ctx = RunContext {
            root: temp_dir.path(),
            policy: &policy,
            quarantine: Some(quarantine.path()),
            lookup: &NoLookup,
        };
        let plan = Planner::plan(&ctx).expect("planning succeeds");

        let quarantines: Vec<_> = plan
            .ops
            .iter()
            .filter_map(|p| match &p.op {
                Operation::Quarantine { dst, .. } => Some(dst.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(
            quarantines,
            vec![quarantine
                .path()
                .join("Some.Release.1080p-GRP")
                .join("sample.mkv")]
        );
    }

    #[test]
    fn test_unclassified_reported_not_planned() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("notes.txt"), b"keep me").unwrap();
        fs::write(temp_dir.path().join("random_video.xyz"), b"?").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);

        assert!(plan.is_empty());
        assert_eq!(plan.unclassified.len(), 2);
    }

    #[test]
    fn test_movie_without_year_reported_when_lookup_absent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("Mystery.Film.1080p.mkv"), b"v").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);

        assert!(plan.is_empty());
        assert_eq!(plan.unclassified.len(), 1);
        assert!(plan.unclassified[0].1.contains("no release year"));
    }

    #[test]
    fn test_release_folder_tracked() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let release = temp_dir.path().join("Show.Name.S01E02.1080p.WEB-GRP");
        fs::create_dir_all(&release).unwrap();
        fs::write(release.join("Show.Name.S01E02.mkv"), b"v").unwrap();

        let policy = CompiledPolicy::default();
        let plan = plan_for(temp_dir.path(), &policy);
        assert!(plan.tracked_folders.contains(&release));
    }
}
