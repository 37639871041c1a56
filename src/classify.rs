//! File classification: categories, parsed identity, language tags.
//!
//! The classifier inspects one filesystem entry (path, base name,
//! extension) and decides what it is: a video or subtitle with a parsed
//! identity, one of the junk categories, or unclassified. It never
//! touches file content.
//!
//! # Examples
//!
//! ```
//! use mediatidy::classify::{Classifier, Identity};
//! use mediatidy::config::CompiledPolicy;
//!
//! let policy = CompiledPolicy::default();
//! let classifier = Classifier::new(&policy);
//!
//! match classifier.parse_episode("Show.Name.S01E02.1080p.WEB") {
//!     Some(Identity::Episode { show, season, episode, .. }) => {
//!         assert_eq!(show, "Show Name");
//!         assert_eq!((season, episode), (1, 2));
//!     }
//!     _ => panic!("expected an episode"),
//! }
//! ```

use crate::config::CompiledPolicy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Video extensions the engine reorganizes.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi", "mov", "m4v", "wmv"];

/// Subtitle (sidecar) extensions the engine reorganizes.
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "sub", "idx", "vtt", "ass", "ssa"];

/// Image extensions treated as junk.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// Archive and repair-set extensions treated as junk.
pub const ARCHIVE_EXTENSIONS: &[&str] = &["rar", "r00", "r01", "sfv", "nzb", "par2", "srr"];

/// OS metadata file names treated as junk (compared case-insensitively).
pub const OS_METADATA_NAMES: &[&str] = &[".ds_store", ".ds_info", "thumbs.db", "desktop.ini"];

/// Directory names that hold subtitles inside a release folder.
pub const SUBS_FOLDER_NAMES: &[&str] = &["subs", "subtitles", "sub"];

const SAMPLE_TOKENS: &[&str] = &["sample", "proof", "trailer"];

/// Language tokens mapped to their normalized three-letter tag.
const LANGUAGE_TOKENS: &[(&str, &str)] = &[
    ("en", "eng"),
    ("eng", "eng"),
    ("english", "eng"),
    ("es", "spa"),
    ("spa", "spa"),
    ("spanish", "spa"),
    ("fr", "fre"),
    ("fre", "fre"),
    ("french", "fre"),
    ("de", "ger"),
    ("ger", "ger"),
    ("german", "ger"),
];

const MODIFIER_TOKENS: &[&str] = &["forced", "sdh", "cc", "hi"];

/// Torrent-site prefixes stripped before parsing.
const NOISE_PREFIX_PATTERNS: &[&str] = &[
    r"(?i)^www\.UIndex\.org\s*-\s*",
    r"(?i)^\[(?:tgx|rartv|rarbg|eztv|yts|yify)\][\s._-]*",
    r"(?i)^(?:tgx|rartv|rarbg|eztv|yts|yify|eztv\.re)[\s._-]+",
    r"(?i)^www\.",
];

/// Quality and source markers stripped from movie titles.
const QUALITY_MARKER_PATTERN: &str = r"(?i)\b(?:2160p|1080p|720p|480p|4K|UHD|BluRay|BDRip|BRRip|WEB-?DL|WEBRip|HDRip|DVDRip|DVDSCR|CAM|TS|TC|HDTV|x264|x265|H\.?264|H\.?265|HEVC|AVC|AAC|AC3|DTS|DD5\.?1|FLAC|Atmos|REMUX|PROPER|REPACK|EXTENDED|UNRATED|DIRECTORS\.?CUT|THEATRICAL|IMAX|10bit|HDR10|HDR|DV|DoVi)\b";

/// The category assigned to one filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// A video file (identity may still be unparsed).
    Video,
    /// A subtitle sidecar.
    Subtitle,
    /// Sample, proof, or trailer material.
    JunkSample,
    /// Archive or repair-set leftovers (rar, sfv, par2, ...).
    JunkArchive,
    /// Image files, including everything inside a screens directory.
    JunkImage,
    /// OS metadata files and release-folder residue (nfo and friends).
    JunkMetadata,
    /// Nothing the engine recognizes; left in place and reported.
    Unclassified,
}

impl Category {
    /// Short label used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Video => "video",
            Category::Subtitle => "subtitle",
            Category::JunkSample => "sample",
            Category::JunkArchive => "archive",
            Category::JunkImage => "image",
            Category::JunkMetadata => "metadata",
            Category::Unclassified => "unclassified",
        }
    }

    /// True for the categories that are deleted (or quarantined) outright.
    pub fn is_junk(&self) -> bool {
        matches!(
            self,
            Category::JunkSample
                | Category::JunkArchive
                | Category::JunkImage
                | Category::JunkMetadata
        )
    }
}

/// Parsed identity of a media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// A TV episode.
    Episode {
        /// Normalized show title ("Show Name").
        show: String,
        /// Season number.
        season: u32,
        /// Episode number.
        episode: u32,
        /// Trailing text after the episode pattern (quality tags etc.),
        /// preserved verbatim.
        descriptor: String,
    },
    /// A movie.
    Movie {
        /// Normalized title, quality markers stripped.
        title: String,
        /// Release year; absent when the name carries no year token.
        year: Option<u16>,
    },
}

/// Language tag and modifiers extracted from a subtitle filename.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubtitleTag {
    /// Normalized three-letter language tag ("eng", "spa", ...).
    pub lang: Option<&'static str>,
    /// Modifiers in canonical order ("forced", "sdh", "cc", "hi").
    pub modifiers: Vec<&'static str>,
}

impl SubtitleTag {
    /// Whether the tag indicates an English subtitle.
    pub fn is_english(&self) -> bool {
        self.lang == Some("eng")
    }

    /// Filename suffix for the tag, e.g. `.eng.forced`, or empty.
    pub fn suffix(&self) -> String {
        let mut parts = Vec::new();
        if let Some(lang) = self.lang {
            parts.push(lang);
        }
        parts.extend(self.modifiers.iter().copied());
        if parts.is_empty() {
            String::new()
        } else {
            format!(".{}", parts.join("."))
        }
    }
}

/// One classified filesystem entry, immutable for the rest of the run.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Size in bytes at plan time.
    pub size: u64,
    /// Detected category.
    pub category: Category,
    /// Parsed identity for video/subtitle entries.
    pub identity: Option<Identity>,
    /// Language tag, present only for subtitle entries.
    pub subtitle: Option<SubtitleTag>,
}

/// Classifies filesystem entries by name and extension rules.
///
/// All patterns are compiled once at construction; classification itself
/// is allocation-light and never reads file content.
pub struct Classifier<'a> {
    policy: &'a CompiledPolicy,
    episode_regexes: Vec<Regex>,
    movie_paren_regex: Regex,
    movie_year_regex: Regex,
    noise_regexes: Vec<Regex>,
    quality_regex: Regex,
    trailing_year_regex: Regex,
    release_group_regex: Regex,
    bracket_tag_regex: Regex,
    clean_season_regex: Regex,
    clean_movie_regex: Regex,
}

impl<'a> Classifier<'a> {
    /// Create a classifier bound to a compiled policy.
    pub fn new(policy: &'a CompiledPolicy) -> Self {
        let episode_regexes = vec![
            Regex::new(r"(?i)^(?P<show>.*?)[.\s_-]*S(?P<season>\d{1,2})[.\s_-]*E(?P<episode>\d{1,2})")
                .expect("episode pattern compiles"),
            Regex::new(r"(?i)^(?P<show>.*?)[.\s_-]*(?P<season>\d{1,2})x(?P<episode>\d{1,2})")
                .expect("episode pattern compiles"),
            Regex::new(
                r"(?i)^(?P<show>.*?)[.\s_-]*Season[.\s_-]*(?P<season>\d{1,2})[.\s_-]*Episode[.\s_-]*(?P<episode>\d{1,2})",
            )
            .expect("episode pattern compiles"),
        ];

        Self {
            policy,
            episode_regexes,
            movie_paren_regex: Regex::new(r"^(?P<title>.+?)\s*\((?P<year>(?:19|20)\d{2})\)")
                .expect("movie pattern compiles"),
            movie_year_regex: Regex::new(
                r"^(?P<title>.+?)[.\s_(-](?P<year>(?:19|20)\d{2})(?:[).\s_-]|$)",
            )
            .expect("movie pattern compiles"),
            noise_regexes: NOISE_PREFIX_PATTERNS
                .iter()
                .map(|p| Regex::new(p).expect("noise pattern compiles"))
                .collect(),
            quality_regex: Regex::new(QUALITY_MARKER_PATTERN).expect("quality pattern compiles"),
            trailing_year_regex: Regex::new(r"\s*\(\d{4}\)\s*$").expect("year pattern compiles"),
            release_group_regex: Regex::new(r"\s*-\s*[A-Z0-9]{2,}$").expect("group pattern compiles"),
            bracket_tag_regex: Regex::new(r"\s*\[[^\]]+\]$").expect("bracket pattern compiles"),
            clean_season_regex: Regex::new(r"(?i)^Season \d{2}$").expect("season pattern compiles"),
            clean_movie_regex: Regex::new(r"^.+ \(\d{4}\)$").expect("movie folder pattern compiles"),
        }
    }

    /// Classify one file under `root`.
    pub fn classify(&self, path: &Path, root: &Path, size: u64) -> Entry {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lower_name = name.to_lowercase();
        let ext = extension_of(path);

        let category = if OS_METADATA_NAMES.contains(&lower_name.as_str()) {
            Category::JunkMetadata
        } else if self.in_screens_dir(path, root) {
            Category::JunkImage
        } else if self.is_sample_file(path) {
            Category::JunkSample
        } else if ARCHIVE_EXTENSIONS.contains(&ext.as_str()) {
            Category::JunkArchive
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Category::JunkImage
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Category::Video
        } else if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) {
            Category::Subtitle
        } else if self.in_junk_context(path, root) {
            // Residue inside a release folder: nfo, txt, url, whatever the
            // release group shipped alongside the media.
            Category::JunkMetadata
        } else {
            Category::Unclassified
        };

        let identity = match category {
            Category::Video | Category::Subtitle => self.identity_chain(path, root),
            _ => None,
        };
        let subtitle = match category {
            Category::Subtitle => Some(subtitle_tag(&name)),
            _ => None,
        };

        Entry {
            path: path.to_path_buf(),
            size,
            category,
            identity,
            subtitle,
        }
    }

    /// Parse a TV episode identity from a filename or folder name.
    ///
    /// Accepts `S01E02`, `1x02`, and spelled-out `Season 1 Episode 2`
    /// forms with dot/underscore/dash/space separators.
    pub fn parse_episode(&self, name: &str) -> Option<Identity> {
        let cleaned = self.strip_noise_prefix(&normalize_separators(name));

        for regex in &self.episode_regexes {
            if let Some(caps) = regex.captures(&cleaned) {
                let season: u32 = caps["season"].parse().ok()?;
                let episode: u32 = caps["episode"].parse().ok()?;

                let spaced = separators_to_spaces(&caps["show"]);
                let without_year = self.trailing_year_regex.replace(&spaced, "");
                let show = title_case(without_year.trim());

                let rest = &cleaned[caps.get(0).map(|m| m.end()).unwrap_or(cleaned.len())..];
                let descriptor = rest.trim_matches(['.', ' ', '-', '_']).to_string();

                return Some(Identity::Episode {
                    show,
                    season,
                    episode,
                    descriptor,
                });
            }
        }

        None
    }

    /// Parse a movie identity with a year anchor from a filename or
    /// folder name. Returns `None` when no plausible year token exists;
    /// see [`Classifier::parse_movie_without_year`] for that case.
    pub fn parse_movie(&self, name: &str) -> Option<Identity> {
        let cleaned = self.strip_noise_prefix(&normalize_separators(name));

        // Parenthesized year first: "Movie Name (2024)".
        if let Some(caps) = self.movie_paren_regex.captures(&cleaned) {
            let year: u16 = caps["year"].parse().ok()?;
            let title = self.clean_movie_title(&caps["title"]);
            if !title.is_empty() {
                return Some(Identity::Movie {
                    title,
                    year: Some(year),
                });
            }
        }

        // Dotted release form: "Movie.Name.2024.1080p...".
        if let Some(caps) = self.movie_year_regex.captures(&cleaned) {
            let year: u16 = caps["year"].parse().ok()?;
            let title = self.clean_movie_title(&caps["title"]);
            if !title.is_empty() {
                return Some(Identity::Movie {
                    title,
                    year: Some(year),
                });
            }
        }

        None
    }

    /// Fallback movie identity for names without a year token; the year
    /// stays absent pending external lookup.
    pub fn parse_movie_without_year(&self, name: &str) -> Option<Identity> {
        let cleaned = self.strip_noise_prefix(&normalize_separators(name));
        let title = self.clean_movie_title(&cleaned);
        if title.chars().any(|c| c.is_alphabetic()) {
            Some(Identity::Movie { title, year: None })
        } else {
            None
        }
    }

    /// Resolve an identity for a media file, trying the file stem, the
    /// parent folder name, and (for files in a subs folder) the
    /// grandparent folder name, in that order.
    pub fn identity_chain(&self, path: &Path, root: &Path) -> Option<Identity> {
        let stem = stem_of(path);
        let mut names = vec![stem.clone()];

        if let Some(parent) = path.parent()
            && parent != root
            && parent.starts_with(root)
            && let Some(parent_name) = parent.file_name()
        {
            let parent_name = parent_name.to_string_lossy().into_owned();
            let parent_is_subs = is_subs_folder(&parent_name);
            names.push(parent_name);

            if parent_is_subs
                && let Some(grandparent) = parent.parent()
                && grandparent != root
                && grandparent.starts_with(root)
                && let Some(gp_name) = grandparent.file_name()
            {
                names.push(gp_name.to_string_lossy().into_owned());
            }
        }

        for name in &names {
            if let Some(identity) = self.parse_episode(name) {
                return Some(identity);
            }
        }
        for name in &names {
            if let Some(identity) = self.parse_movie(name) {
                return Some(identity);
            }
        }

        self.parse_movie_without_year(&stem)
    }

    /// Whether the file sits in a release-folder context: directly in a
    /// release folder, or in a subs folder whose parent is one.
    pub fn in_release_context(&self, path: &Path, root: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        if parent == root || !parent.starts_with(root) {
            return false;
        }
        let Some(parent_name) = parent.file_name().map(|n| n.to_string_lossy().into_owned())
        else {
            return false;
        };

        if self.policy.is_release_folder_name(&parent_name) {
            return true;
        }

        if is_subs_folder(&parent_name)
            && let Some(grandparent) = parent.parent()
            && grandparent != root
            && grandparent.starts_with(root)
            && let Some(gp_name) = grandparent.file_name()
            && self
                .policy
                .is_release_folder_name(&gp_name.to_string_lossy())
        {
            return true;
        }

        false
    }

    /// Whether a folder already follows the clean naming convention
    /// ("Season NN" or "Title (Year)").
    pub fn is_clean_folder_name(&self, name: &str) -> bool {
        self.clean_season_regex.is_match(name) || self.clean_movie_regex.is_match(name)
    }

    /// Sample/proof/trailer detection: a separator-delimited token in the
    /// name, or membership in a `Sample/` folder.
    pub fn is_sample_file(&self, path: &Path) -> bool {
        let stem = stem_of(path).to_lowercase();
        let has_token = stem
            .split(['.', ' ', '-', '_'])
            .any(|token| SAMPLE_TOKENS.contains(&token));
        if has_token {
            return true;
        }
        if SAMPLE_TOKENS.iter().any(|t| stem.starts_with(t)) {
            return true;
        }

        path.parent()
            .and_then(|p| p.file_name())
            .map(|n| {
                let lower = n.to_string_lossy().to_lowercase();
                lower == "sample" || lower == "samples"
            })
            .unwrap_or(false)
    }

    fn in_screens_dir(&self, path: &Path, root: &Path) -> bool {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == root || !dir.starts_with(root) {
                return false;
            }
            if let Some(name) = dir.file_name()
                && name.to_string_lossy().to_lowercase().contains("screens")
            {
                return true;
            }
            current = dir.parent();
        }
        false
    }

    /// Context in which unknown extensions count as release residue: a
    /// release-folder context, or a parent folder that itself parses as a
    /// media name.
    fn in_junk_context(&self, path: &Path, root: &Path) -> bool {
        if self.in_release_context(path, root) {
            return true;
        }
        let Some(parent) = path.parent() else {
            return false;
        };
        if parent == root || !parent.starts_with(root) {
            return false;
        }
        parent
            .file_name()
            .map(|n| {
                let name = n.to_string_lossy();
                self.parse_episode(&name).is_some() || self.parse_movie(&name).is_some()
            })
            .unwrap_or(false)
    }

    fn strip_noise_prefix(&self, name: &str) -> String {
        let mut s = name.to_string();
        for regex in &self.noise_regexes {
            s = regex.replace(&s, "").into_owned();
        }
        s.trim_start().to_string()
    }

    fn clean_movie_title(&self, raw: &str) -> String {
        let spaced = raw.replace(['.', '_'], " ");
        let no_quality = self.quality_regex.replace_all(&spaced, " ");
        let no_group = self.release_group_regex.replace(&no_quality, "");
        let no_brackets = self.bracket_tag_regex.replace(&no_group, "");
        let collapsed = collapse_whitespace(&no_brackets);
        title_case_preserving_acronyms(&collapsed)
    }
}

/// Extract the language tag and modifiers from a subtitle filename.
///
/// ```
/// use mediatidy::classify::subtitle_tag;
///
/// let tag = subtitle_tag("Movie Title (2020).eng.forced.srt");
/// assert_eq!(tag.lang, Some("eng"));
/// assert_eq!(tag.modifiers, vec!["forced"]);
/// ```
pub fn subtitle_tag(name: &str) -> SubtitleTag {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let tokens: Vec<&str> = stem.split(['.', ' ', '-', '_', '(', ')', '[', ']']).collect();

    let mut tag = SubtitleTag::default();
    // Table order is priority order, English variants first, so a stray
    // title word never shadows an explicit language marker.
    for &(token, normalized) in LANGUAGE_TOKENS {
        if tokens.contains(&token) {
            tag.lang = Some(normalized);
            break;
        }
    }
    for &modifier in MODIFIER_TOKENS {
        if tokens.contains(&modifier) {
            tag.modifiers.push(modifier);
        }
    }
    tag
}

/// Whether a folder name is a conventional subtitle subfolder.
pub fn is_subs_folder(name: &str) -> bool {
    SUBS_FOLDER_NAMES.contains(&name.to_lowercase().as_str())
}

/// Normalize unicode dashes and whitespace to plain ASCII forms.
pub fn normalize_separators(s: &str) -> String {
    let s = s
        .replace(['\u{2013}', '\u{2014}'], "-")
        .replace('\u{a0}', " ");
    collapse_whitespace(&s)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn separators_to_spaces(s: &str) -> String {
    let replaced = s.replace(['.', '_', '-'], " ");
    collapse_whitespace(&replaced)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Title-case every word: first letter upper, rest lower.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Title-case words but keep short all-caps acronyms (FBI, UFO) intact.
fn title_case_preserving_acronyms(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let is_acronym = word.len() <= 4
                && word.chars().any(|c| c.is_alphabetic())
                && word
                    .chars()
                    .filter(|c| c.is_alphabetic())
                    .all(|c| c.is_uppercase());
            if is_acronym {
                word.to_string()
            } else {
                capitalize(word)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}
