//! Run policy configuration.
//!
//! This module loads and compiles the policy knobs that govern a run:
//! release-folder detection patterns, the root-level subtitle rule, and
//! glob patterns for files the engine must never touch.
//!
//! # Configuration File Format
//!
//! Configuration is stored in TOML format with the following structure:
//!
//! ```toml
//! [policy]
//! preserve_root_subtitles = true
//!
//! # Appended to the built-in release-folder patterns (regex syntax).
//! release_folder_patterns = []
//!
//! # Files the engine leaves in place, matched against the path relative
//! # to the processed root (glob syntax).
//! exclude = ["*.part"]
//! ```

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Built-in patterns that mark a directory name as a scene-release folder.
///
/// A release folder typically wraps one media item together with samples,
/// screens, and release-group sidecars; its name carries quality tags,
/// codec tags, or a trailing group suffix.
const BUILTIN_RELEASE_PATTERNS: &[&str] = &[
    r"\d{3,4}p",
    r"(?i)(WEB-?DL|WEBRip|BluRay|BDRip|HDRip|DVDRip)",
    r"(?i)(x264|x265|h264|h265|HEVC)",
    r"\[[^\]]*\]$",
    r"(?i)-[A-Z0-9]+$",
    r"(?i)(YIFY|YTS|RARBG|TGx)",
];

/// Errors that can occur during configuration loading and compilation.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// Invalid glob pattern in the exclude list.
    InvalidGlobPattern(String),
    /// Invalid regex pattern with the actual error reason.
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid glob pattern '{}'", pattern)
            }
            ConfigError::InvalidRegexPattern { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Policy configuration as deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub policy: PolicyRules,
}

/// The policy knobs of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRules {
    /// Whether subtitles outside a release-folder context are preserved
    /// regardless of language. When false, the non-English filter applies
    /// everywhere. Defaults to true.
    #[serde(default = "default_preserve_root_subtitles")]
    pub preserve_root_subtitles: bool,

    /// Extra release-folder detection patterns (regex), appended to the
    /// built-in set.
    #[serde(default)]
    pub release_folder_patterns: Vec<String>,

    /// Glob patterns for files to leave untouched, matched against the
    /// path relative to the processed root.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_preserve_root_subtitles() -> bool {
    true
}

impl Default for PolicyRules {
    fn default() -> Self {
        Self {
            preserve_root_subtitles: true,
            release_folder_patterns: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

impl PolicyConfig {
    /// Load configuration with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.mediatidyrc.toml` in the current directory
    /// 3. Look for `~/.config/mediatidy/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read or parsed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".mediatidyrc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("mediatidy")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Compile the configuration into matchers usable during a run.
    ///
    /// # Errors
    ///
    /// Returns an error if any user-supplied regex or glob pattern is
    /// invalid.
    pub fn compile(self) -> Result<CompiledPolicy, ConfigError> {
        CompiledPolicy::new(self.policy)
    }
}

/// Compiled policy: pre-built regex and glob matchers.
///
/// Built once per run and passed through the run context so repeated
/// invocations in the same process never share state.
pub struct CompiledPolicy {
    preserve_root_subtitles: bool,
    release_folder_regexes: Vec<Regex>,
    exclude_globs: Vec<Pattern>,
}

impl CompiledPolicy {
    fn new(rules: PolicyRules) -> Result<Self, ConfigError> {
        let mut release_folder_regexes = Vec::new();
        for pattern in BUILTIN_RELEASE_PATTERNS {
            release_folder_regexes.push(Regex::new(pattern).map_err(|e| {
                ConfigError::InvalidRegexPattern {
                    pattern: (*pattern).to_string(),
                    reason: e.to_string(),
                }
            })?);
        }
        for pattern in &rules.release_folder_patterns {
            release_folder_regexes.push(Regex::new(pattern).map_err(|e| {
                ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                }
            })?);
        }

        let exclude_globs = rules
            .exclude
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            preserve_root_subtitles: rules.preserve_root_subtitles,
            release_folder_regexes,
            exclude_globs,
        })
    }

    /// Whether subtitles outside a release-folder context keep their
    /// language unconditionally.
    pub fn preserve_root_subtitles(&self) -> bool {
        self.preserve_root_subtitles
    }

    /// Check whether a directory name looks like a scene-release folder.
    pub fn is_release_folder_name(&self, name: &str) -> bool {
        self.release_folder_regexes
            .iter()
            .any(|re| re.is_match(name))
    }

    /// Check whether a path (relative to the processed root) is excluded
    /// from the run entirely.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        self.exclude_globs
            .iter()
            .any(|pattern| pattern.matches_path(relative))
    }
}

impl Default for CompiledPolicy {
    fn default() -> Self {
        // Only built-in patterns are involved, which always compile.
        CompiledPolicy::new(PolicyRules::default()).expect("built-in patterns compile")
    }
}
