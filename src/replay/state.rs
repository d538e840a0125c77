//! Replay phases and the persisted rebase state.
//!
//! # Lifecycle
//!
//! ```text
//! Pending → Applying → Pending | Completed
//!              │
//!              └→ Conflicted → Applying   (resolve / skip)
//!
//! Pending → Completed                   (nothing left)
//! Pending | Applying | Conflicted → Aborted
//! ```
//!
//! The state is plain data and serializes to JSON, so an interrupted
//! rebase can be saved to disk and resumed by another process. Writes are
//! atomic: the JSON goes to a temporary file in the target directory, is
//! fsynced, and is then renamed over the target.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use braid_store::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::MergeError;

/// The phase of a replay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPhase {
    /// Commits remain and none is being applied.
    Pending,
    /// A commit is being merged onto the current head.
    Applying,
    /// The current commit produced conflicts and needs a resolution.
    Conflicted,
    /// Every commit has been replayed.
    Completed,
    /// The replay was abandoned; the original head is unchanged.
    Aborted,
}

impl ReplayPhase {
    /// Returns `true` for `Completed` and `Aborted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    #[must_use]
    pub const fn valid_transitions(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Applying, Self::Completed, Self::Aborted],
            Self::Applying => &[Self::Pending, Self::Conflicted, Self::Completed, Self::Aborted],
            Self::Conflicted => &[Self::Applying, Self::Aborted],
            Self::Completed | Self::Aborted => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for ReplayPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Applying => write!(f, "applying"),
            Self::Conflicted => write!(f, "conflicted"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// One replayed commit. `replayed` is `None` when the commit was dropped
/// (skipped, or empty after merging).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewrittenCommit {
    pub original: ObjectId,
    pub replayed: Option<ObjectId>,
}

/// Everything needed to continue a replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebaseState {
    /// Where the replay started.
    pub onto: ObjectId,
    /// The tip replayed commits are stacked on.
    pub head: ObjectId,
    /// The commit being applied or awaiting resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<ObjectId>,
    /// Commits still to replay, oldest first.
    pub remaining: Vec<ObjectId>,
    /// Commits already handled, in replay order.
    #[serde(default)]
    pub rewritten: Vec<RewrittenCommit>,
    pub phase: ReplayPhase,
    /// The merged tree (with conflict markers) of the conflicted commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conflicted_tree: Option<ObjectId>,
}

impl RebaseState {
    /// A pending replay of `commits` onto `onto`.
    #[must_use]
    pub const fn new(onto: ObjectId, commits: Vec<ObjectId>) -> Self {
        Self {
            onto,
            head: onto,
            current: None,
            remaining: commits,
            rewritten: Vec::new(),
            phase: ReplayPhase::Pending,
            conflicted_tree: None,
        }
    }

    /// Move to `next`.
    ///
    /// # Errors
    /// Returns [`MergeError::InvalidTransition`] if the lifecycle does not
    /// allow the move.
    pub fn advance(&mut self, next: ReplayPhase, action: &'static str) -> Result<(), MergeError> {
        if !self.phase.can_transition_to(next) {
            return Err(MergeError::InvalidTransition {
                state: self.phase.to_string(),
                action,
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Write the state as pretty JSON, atomically.
    ///
    /// # Errors
    /// Returns [`MergeError::State`] on I/O or serialization failure.
    pub fn save(&self, path: &Path) -> Result<(), MergeError> {
        let fail = |message: String| MergeError::State {
            path: path.to_owned(),
            message,
        };
        let json = serde_json::to_string_pretty(self).map_err(|e| fail(e.to_string()))?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| fail(format!("create {}: {e}", dir.display())))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| fail(format!("create temp file in {}: {e}", dir.display())))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| fail(format!("write: {e}")))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| fail(format!("fsync: {e}")))?;
        tmp.persist(path).map_err(|e| fail(format!("rename: {}", e.error)))?;
        Ok(())
    }

    /// Read a state written by [`save`](Self::save).
    ///
    /// # Errors
    /// Returns [`MergeError::State`] if the file is missing or malformed.
    pub fn load(path: &Path) -> Result<Self, MergeError> {
        let fail = |message: String| MergeError::State {
            path: path.to_owned(),
            message,
        };
        let contents = fs::read_to_string(path).map_err(|e| fail(format!("read: {e}")))?;
        serde_json::from_str(&contents).map_err(|e| fail(e.to_string()))
    }
}
