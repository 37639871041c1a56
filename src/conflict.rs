//! Duplicate detection and destination-conflict resolution.
//!
//! When a planned destination already has an occupant, the engine either
//! deletes the source (identical content) or moves it to an `(alt)` name
//! (differing content). Content equality is judged by size first, then a
//! full-content blake3 fingerprint; suffixing never overwrites anything.

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Outcome of resolving an occupied destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Source and occupant hold equivalent content; delete the source.
    DeleteSource,
    /// Contents differ; move the source to this free alternative name.
    MoveTo(PathBuf),
}

/// Compute the blake3 fingerprint of a file's full content.
pub fn fingerprint(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Check whether two files hold identical content.
///
/// A size mismatch is a fast rejection; only same-sized files are hashed.
pub fn same_content(a: &Path, b: &Path) -> io::Result<bool> {
    if std::fs::metadata(a)?.len() != std::fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(fingerprint(a)? == fingerprint(b)?)
}

/// Decide what to do with `src` when `dest` is occupied.
///
/// `occupant` is the on-disk file holding the destination's content: the
/// destination itself when it exists, or the source of an earlier planned
/// move that claimed it. `claimed` lists destinations already promised to
/// other operations in this plan, so alternative names dodge those too.
pub fn resolve_conflict(
    src: &Path,
    dest: &Path,
    occupant: &Path,
    claimed: &HashSet<PathBuf>,
) -> io::Result<Resolution> {
    if same_content(src, occupant)? {
        return Ok(Resolution::DeleteSource);
    }
    Ok(Resolution::MoveTo(unique_alt_path(dest, src, claimed)))
}

/// Find the first free `(alt)` name for a contested destination.
///
/// Tries `<stem> (alt).<ext>`, then `<stem> (alt 2).<ext>`, and so on,
/// until a name is neither on disk nor claimed by the current plan. The
/// source's own name counts as free, so a file already sitting on an alt
/// slot keeps it across runs.
pub fn unique_alt_path(dest: &Path, src: &Path, claimed: &HashSet<PathBuf>) -> PathBuf {
    let stem = dest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = dest
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = dest.parent().unwrap_or_else(|| Path::new(""));

    let mut counter = 1u32;
    loop {
        let suffix = if counter == 1 {
            "alt".to_string()
        } else {
            format!("alt {}", counter)
        };
        let candidate = parent.join(format!("{} ({}){}", stem, suffix, ext));
        if candidate == src || (!candidate.exists() && !claimed.contains(&candidate)) {
            return candidate;
        }
        counter += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_stable_and_content_sensitive() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let a = temp_dir.path().join("a.bin");
        let b = temp_dir.path().join("b.bin");
        fs::write(&a, b"same bytes").unwrap();
        fs::write(&b, b"same bytes").unwrap();

        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());

        fs::write(&b, b"other bytes").unwrap();
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn test_same_content_size_fast_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let a = temp_dir.path().join("a.bin");
        let b = temp_dir.path().join("b.bin");
        fs::write(&a, b"short").unwrap();
        fs::write(&b, b"much longer content").unwrap();

        assert!(!same_content(&a, &b).unwrap());
    }

    #[test]
    fn test_resolve_conflict_identical_deletes_source() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("src.mkv");
        let dest = temp_dir.path().join("dest.mkv");
        fs::write(&src, b"video payload").unwrap();
        fs::write(&dest, b"video payload").unwrap();

        let resolution = resolve_conflict(&src, &dest, &dest, &HashSet::new()).unwrap();
        assert_eq!(resolution, Resolution::DeleteSource);
    }

    #[test]
    fn test_resolve_conflict_different_picks_alt() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let src = temp_dir.path().join("src.mkv");
        let dest = temp_dir.path().join("dest.mkv");
        fs::write(&src, b"payload one").unwrap();
        fs::write(&dest, b"payload two").unwrap();

        let resolution = resolve_conflict(&src, &dest, &dest, &HashSet::new()).unwrap();
        assert_eq!(
            resolution,
            Resolution::MoveTo(temp_dir.path().join("dest (alt).mkv"))
        );
    }

    #[test]
    fn test_alt_suffix_increments_past_occupied_names() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("file.mkv");
        let src = temp_dir.path().join("incoming.mkv");
        fs::write(&dest, b"x").unwrap();
        fs::write(temp_dir.path().join("file (alt).mkv"), b"x").unwrap();
        fs::write(temp_dir.path().join("file (alt 2).mkv"), b"x").unwrap();

        let alt = unique_alt_path(&dest, &src, &HashSet::new());
        assert_eq!(alt, temp_dir.path().join("file (alt 3).mkv"));
    }

    #[test]
    fn test_alt_suffix_respects_planned_claims() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("file.mkv");
        let src = temp_dir.path().join("incoming.mkv");
        let mut claimed = HashSet::new();
        claimed.insert(temp_dir.path().join("file (alt).mkv"));

        let alt = unique_alt_path(&dest, &src, &claimed);
        assert_eq!(alt, temp_dir.path().join("file (alt 2).mkv"));
    }

    #[test]
    fn test_alt_slot_is_stable_for_its_own_occupant() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("file.mkv");
        let src = temp_dir.path().join("file (alt).mkv");
        fs::write(&dest, b"x").unwrap();
        fs::write(&src, b"y").unwrap();

        // A file already on an alt slot resolves back to itself instead
        // of sliding to the next free number every run.
        let alt = unique_alt_path(&dest, &src, &HashSet::new());
        assert_eq!(alt, src);
    }
}
