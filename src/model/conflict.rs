//! Structured conflict model and merge results.
//!
//! Conflicts are reported per path and, for line merges, per hunk. The merged
//! tree always exists alongside them: conflicted files carry marker text and
//! displaced content sits at an alternate path, so a caller can inspect or
//! resolve everything from the tree alone.
//!
//! # Conflict kinds
//!
//! | Kind | Description |
//! |------|-------------|
//! | [`ConflictKind::Content`] | Both sides changed the same lines of a file |
//! | [`ConflictKind::AddAdd`] | Both sides added the path with different content |
//! | [`ConflictKind::ModifyDelete`] | One side changed the path, the other deleted it |
//! | [`ConflictKind::FileDirectory`] | One side has a file where the other has a directory |
//!
//! # Serialization
//!
//! Conflicts serialize to tagged JSON for reporting:
//!
//! ```json
//! {
//!   "path": "src/lib.rs",
//!   "kind": { "type": "content" },
//!   "region": { "kind": "lines", "start": 1, "end": 2 },
//!   "base": { "hunk": "2\n" },
//!   "ours": { "hunk": "A\n" },
//!   "theirs": { "hunk": "B\n" }
//! }
//! ```

use std::fmt;

use braid_store::{ObjectId, TreeEntry};
use serde::{Serialize, Serializer};

use super::path::RepoPath;

// ---------------------------------------------------------------------------
// Side
// ---------------------------------------------------------------------------

/// One of the two sides being merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Ours,
    Theirs,
}

impl Side {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Ours => Self::Theirs,
            Self::Theirs => Self::Ours,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ours => write!(f, "ours"),
            Self::Theirs => write!(f, "theirs"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConflictKind
// ---------------------------------------------------------------------------

/// Why a path conflicted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConflictKind {
    /// Both sides edited overlapping lines (or both changed a binary file).
    Content,
    /// Both sides created the path with different content.
    AddAdd,
    /// One side deleted the path while the other changed it.
    ModifyDelete {
        /// The side that deleted.
        deleted_by: Side,
    },
    /// One side has a directory at the path and the other a file.
    FileDirectory {
        /// The side holding the directory.
        directory_on: Side,
    },
}

impl ConflictKind {
    /// Whether this conflict is about tree shape rather than file content.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(self, Self::ModifyDelete { .. } | Self::FileDirectory { .. })
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Content => write!(f, "content"),
            Self::AddAdd => write!(f, "add/add"),
            Self::ModifyDelete { deleted_by } => {
                write!(f, "modify/delete (deleted by {deleted_by})")
            }
            Self::FileDirectory { directory_on } => {
                write!(f, "file/directory (directory on {directory_on})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Region
// ---------------------------------------------------------------------------

/// Where in the base version a conflict sits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Region {
    /// Base lines `start..end` (0-based, end exclusive). Empty when both
    /// sides inserted at the same spot.
    Lines { start: usize, end: usize },
    /// The whole entry (binary files and structural conflicts).
    WholeFile,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lines { start, end } => write!(f, "lines {}-{end}", start + 1),
            Self::WholeFile => write!(f, "whole file"),
        }
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

/// One side's contribution to a conflict.
///
/// Line conflicts carry the hunk bytes, line terminators included.
/// Whole-entry conflicts carry the tree entry instead.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Content {
    #[serde(serialize_with = "serialize_lossy")]
    Hunk(Vec<u8>),
    #[serde(serialize_with = "serialize_entry")]
    Entry(TreeEntry),
}

impl Content {
    /// Hunk bytes, if this is a line hunk.
    #[must_use]
    pub fn hunk(&self) -> Option<&[u8]> {
        match self {
            Self::Hunk(bytes) => Some(bytes),
            Self::Entry(_) => None,
        }
    }

    /// The entry, if this is a whole-entry side.
    #[must_use]
    pub const fn entry(&self) -> Option<&TreeEntry> {
        match self {
            Self::Entry(entry) => Some(entry),
            Self::Hunk(_) => None,
        }
    }
}

fn serialize_lossy<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

fn serialize_entry<S: Serializer>(entry: &TreeEntry, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&format_args!("{} {}", entry.kind, entry.id))
}

// ---------------------------------------------------------------------------
// Conflict
// ---------------------------------------------------------------------------

/// A single unresolved conflict.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Conflict {
    /// Path of the conflicted entry in the merged tree.
    pub path: RepoPath,
    pub kind: ConflictKind,
    pub region: Region,
    /// Base side; `None` when the path (or hunk) did not exist in the base.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<Content>,
    /// Our side; `None` when we deleted it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ours: Option<Content>,
    /// Their side; `None` when they deleted it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theirs: Option<Content>,
    /// Where displaced content was preserved, for structural conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternate_path: Option<RepoPath>,
}

impl Conflict {
    /// The content for one side.
    #[must_use]
    pub const fn side(&self, side: Side) -> Option<&Content> {
        match side {
            Side::Ours => self.ours.as_ref(),
            Side::Theirs => self.theirs.as_ref(),
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} conflict in {}", self.kind, self.path)?;
        if let Region::Lines { .. } = self.region {
            write!(f, " ({})", self.region)?;
        }
        if let Some(alt) = &self.alternate_path {
            write!(f, "; kept at {alt}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MergeResult
// ---------------------------------------------------------------------------

/// Output of a merge.
///
/// `tree` is always populated. `conflicts` is empty exactly when the merge
/// is clean, and is ordered by path (hunks of one file by position).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    pub tree: ObjectId,
    pub conflicts: Vec<Conflict>,
    /// The result is simply their side: ours had nothing to contribute.
    pub fast_forwarded: bool,
}

impl MergeResult {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Distinct conflicted paths, in order.
    #[must_use]
    pub fn conflicted_paths(&self) -> Vec<&RepoPath> {
        let mut paths: Vec<&RepoPath> = self.conflicts.iter().map(|c| &c.path).collect();
        paths.dedup();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_conflict() -> Conflict {
        Conflict {
            path: RepoPath::from("src/lib.rs"),
            kind: ConflictKind::Content,
            region: Region::Lines { start: 1, end: 2 },
            base: Some(Content::Hunk(b"2\n".to_vec())),
            ours: Some(Content::Hunk(b"A\n".to_vec())),
            theirs: Some(Content::Hunk(b"B\n".to_vec())),
            alternate_path: None,
        }
    }

    #[test]
    fn display_names_kind_path_and_lines() {
        assert_eq!(
            content_conflict().to_string(),
            "content conflict in src/lib.rs (lines 2-2)"
        );
    }

    #[test]
    fn serializes_to_tagged_json() {
        let json = serde_json::to_value(content_conflict()).unwrap();
        assert_eq!(json["path"], "src/lib.rs");
        assert_eq!(json["kind"]["type"], "content");
        assert_eq!(json["region"]["kind"], "lines");
        assert_eq!(json["ours"]["hunk"], "A\n");
        assert!(json.get("alternate_path").is_none());
    }

    #[test]
    fn modify_delete_kind_display() {
        let kind = ConflictKind::ModifyDelete {
            deleted_by: Side::Theirs,
        };
        assert_eq!(kind.to_string(), "modify/delete (deleted by theirs)");
        assert!(kind.is_structural());
        assert!(!ConflictKind::AddAdd.is_structural());
    }

    #[test]
    fn conflicted_paths_deduplicates_hunks() {
        let result = MergeResult {
            tree: ObjectId::from_bytes([0; 32]),
            conflicts: vec![content_conflict(), content_conflict()],
            fast_forwarded: false,
        };
        assert!(!result.is_clean());
        assert_eq!(result.conflicted_paths().len(), 1);
    }
}
