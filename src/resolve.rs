//! Canonical destination paths for classified media.
//!
//! Episodes land in `<Show>/Season <NN>/<Show.Name>.S<NN>E<NN>.<ext>`,
//! movies in `<Title> (<Year>)/<Title> (<Year>).<ext>`, and subtitles
//! mirror their companion video's stem with the language tag appended.
//! Top-level folders snap case-insensitively to existing ones through an
//! index built once per run, so no case-insensitive filesystem semantics
//! are ever assumed.

use crate::classify::{Category, Entry, Identity};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Case-insensitive index of the top-level folders under the root.
///
/// Folders created by the plan are registered as they are claimed, so two
/// differently-cased spellings of one show resolve to a single folder
/// within the same run.
pub struct FolderIndex {
    by_normalized: HashMap<String, String>,
}

impl FolderIndex {
    /// Scan the root's existing directories into an index.
    pub fn scan(root: &Path) -> io::Result<Self> {
        let mut by_normalized = HashMap::new();
        for entry in std::fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                by_normalized.insert(name.to_lowercase(), name);
            }
        }
        Ok(Self { by_normalized })
    }

    /// Resolve a desired folder name to the existing spelling if one
    /// matches case-insensitively; otherwise register and keep the
    /// desired spelling.
    pub fn snap(&mut self, desired: &str) -> String {
        let key = desired.to_lowercase();
        if let Some(existing) = self.by_normalized.get(&key) {
            return existing.clone();
        }
        self.by_normalized.insert(key, desired.to_string());
        desired.to_string()
    }

    #[cfg(test)]
    fn with_entries(names: &[&str]) -> Self {
        Self {
            by_normalized: names
                .iter()
                .map(|n| (n.to_lowercase(), n.to_string()))
                .collect(),
        }
    }
}

/// Computes canonical destinations for classified entries.
pub struct PathResolver {
    root: PathBuf,
    index: FolderIndex,
}

impl PathResolver {
    /// Build a resolver for a root, scanning its top-level folders once.
    pub fn new(root: &Path) -> io::Result<Self> {
        Ok(Self {
            root: root.to_path_buf(),
            index: FolderIndex::scan(root)?,
        })
    }

    /// Compute the canonical destination for a video or subtitle entry.
    ///
    /// Returns `None` when the entry has no identity, or is a movie whose
    /// year is still unknown (the planner reports those as unclassified).
    pub fn resolve(&mut self, entry: &Entry) -> Option<PathBuf> {
        let identity = entry.identity.as_ref()?;
        let ext = entry
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())?;
        let tag_suffix = match entry.category {
            Category::Subtitle => entry
                .subtitle
                .as_ref()
                .map(|t| t.suffix())
                .unwrap_or_default(),
            _ => String::new(),
        };

        match identity {
            Identity::Episode {
                show,
                season,
                episode,
                ..
            } => Some(self.episode_dest(show, *season, *episode, &tag_suffix, &ext)),
            Identity::Movie { title, year } => {
                let year = (*year)?;
                Some(self.movie_dest(title, year, &tag_suffix, &ext))
            }
        }
    }

    fn episode_dest(
        &mut self,
        show: &str,
        season: u32,
        episode: u32,
        tag_suffix: &str,
        ext: &str,
    ) -> PathBuf {
        let desired = if show.trim().is_empty() {
            "Unknown Show"
        } else {
            show.trim()
        };
        let folder = self.index.snap(desired);
        let dotted_show = folder.replace(' ', ".");
        let filename = format!(
            "{}.S{:02}E{:02}{}.{}",
            dotted_show, season, episode, tag_suffix, ext
        );

        self.root
            .join(&folder)
            .join(format!("Season {:02}", season))
            .join(filename)
    }

    fn movie_dest(&mut self, title: &str, year: u16, tag_suffix: &str, ext: &str) -> PathBuf {
        let folder = self.index.snap(&format!("{} ({})", title, year));
        let filename = format!("{}{}.{}", folder, tag_suffix, ext);
        self.root.join(&folder).join(filename)
    }
}
