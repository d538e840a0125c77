//! Engine configuration (`braid.toml`).
//!
//! Every field has a default, unknown fields are rejected, and a missing file
//! means "all defaults". The merge section controls conflict presentation and
//! the whole-file favor policy; the rename and replay sections control the
//! optional rename pass and rebase behavior.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BraidConfig {
    /// Three-way merge settings.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Rename detection settings.
    #[serde(default)]
    pub rename: RenameConfig,

    /// Rebase / cherry-pick settings.
    #[serde(default)]
    pub replay: ReplayConfig,
}

// ---------------------------------------------------------------------------
// MergeConfig
// ---------------------------------------------------------------------------

/// Three-way merge settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// How conflict hunks are rendered into the merged file.
    #[serde(default)]
    pub conflict_style: ConflictStyle,

    /// Width of the conflict marker runs (default: 7).
    #[serde(default = "default_marker_size")]
    pub marker_size: usize,

    /// Whole-file policy applied before per-path merging.
    #[serde(default)]
    pub favor: Favor,

    /// Merge commits with no common ancestor against an empty base instead
    /// of failing with `UnrelatedHistories`.
    #[serde(default)]
    pub allow_unrelated_histories: bool,

    /// Separator between a name and a side label when content has to be
    /// preserved at an alternate path (default: `"~"`, giving `name~theirs`).
    #[serde(default = "default_alternate_suffix")]
    pub alternate_suffix: String,

    /// Merge sibling subtrees on the rayon pool (default: true).
    #[serde(default = "default_true")]
    pub parallel: bool,

    /// Labels written after conflict markers.
    #[serde(default)]
    pub labels: Labels,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            conflict_style: ConflictStyle::default(),
            marker_size: default_marker_size(),
            favor: Favor::default(),
            allow_unrelated_histories: false,
            alternate_suffix: default_alternate_suffix(),
            parallel: true,
            labels: Labels::default(),
        }
    }
}

const fn default_marker_size() -> usize {
    7
}

fn default_alternate_suffix() -> String {
    "~".to_owned()
}

const fn default_true() -> bool {
    true
}

/// Conflict marker labels.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Labels {
    #[serde(default = "default_ours_label")]
    pub ours: String,
    #[serde(default = "default_theirs_label")]
    pub theirs: String,
    #[serde(default = "default_base_label")]
    pub base: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            ours: default_ours_label(),
            theirs: default_theirs_label(),
            base: default_base_label(),
        }
    }
}

fn default_ours_label() -> String {
    "ours".to_owned()
}

fn default_theirs_label() -> String {
    "theirs".to_owned()
}

fn default_base_label() -> String {
    "base".to_owned()
}

/// Conflict rendering style.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStyle {
    /// `<<<<<<<` ours `=======` theirs `>>>>>>>`.
    #[default]
    Merge,
    /// Like `Merge`, with the base hunk after a `|||||||` marker.
    Diff3,
}

impl fmt::Display for ConflictStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Diff3 => write!(f, "diff3"),
        }
    }
}

/// Whole-file resolution policy for paths both sides changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Favor {
    /// No policy: both-sides changes are merged line by line.
    #[default]
    None,
    /// Take our version of every path both sides changed.
    Ours,
    /// Take their version of every path both sides changed.
    Theirs,
}

impl fmt::Display for Favor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
        }
    }
}

// ---------------------------------------------------------------------------
// RenameConfig
// ---------------------------------------------------------------------------

/// Rename detection settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RenameConfig {
    /// Run the rename pass when diffing (default: false).
    #[serde(default)]
    pub enabled: bool,

    /// Minimum similarity percentage (0-100) for an inexact rename
    /// (default: 50).
    #[serde(default = "default_rename_threshold")]
    pub threshold: u8,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: default_rename_threshold(),
        }
    }
}

const fn default_rename_threshold() -> u8 {
    50
}

// ---------------------------------------------------------------------------
// ReplayConfig
// ---------------------------------------------------------------------------

/// Rebase / cherry-pick settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayConfig {
    /// Keep commits whose change is already present upstream instead of
    /// dropping them (default: false).
    #[serde(default)]
    pub keep_empty: bool,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading an engine configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl BraidConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but contains invalid TOML, unknown fields, or
    ///   out-of-range values, returns a [`ConfigError`].
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found), parse
    /// errors, or validation failures.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, or values
    /// that fail validation.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that the TOML types cannot express.
    ///
    /// # Errors
    /// Returns `ConfigError` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError {
            path: None,
            message,
        };
        if self.merge.marker_size < 3 {
            return Err(invalid(format!(
                "merge.marker_size must be at least 3, got {}",
                self.merge.marker_size
            )));
        }
        if self.merge.alternate_suffix.is_empty() || self.merge.alternate_suffix.contains('/') {
            return Err(invalid(format!(
                "merge.alternate_suffix must be non-empty and contain no '/', got {:?}",
                self.merge.alternate_suffix
            )));
        }
        let labels = &self.merge.labels;
        for (key, value) in [
            ("ours", &labels.ours),
            ("theirs", &labels.theirs),
            ("base", &labels.base),
        ] {
            if value.is_empty() || value.contains('/') || value.contains('\n') {
                return Err(invalid(format!(
                    "merge.labels.{key} must be non-empty, single-line, and contain no '/'"
                )));
            }
        }
        if self.rename.threshold > 100 {
            return Err(invalid(format!(
                "rename.threshold must be 0-100, got {}",
                self.rename.threshold
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
