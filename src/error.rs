//! Error types for the merge engine.
//!
//! Only inconsistent history and backend failures are errors. A merge that
//! produces conflicts is a successful [`MergeResult`](crate::MergeResult)
//! with a non-empty conflict list, and an interrupted rebase is the
//! `Conflicted` state of its [`RebaseHandle`](crate::RebaseHandle).

use std::path::PathBuf;

use braid_store::{ObjectId, ObjectKind, StoreError};
use thiserror::Error;

use crate::config::ConfigError;

/// Ways the commit graph or object store can be inconsistent.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Corruption {
    /// A commit parent or tree entry names an object that is not stored.
    #[error("dangling reference to {id}")]
    DanglingObject { id: ObjectId },

    /// A commit is reachable from itself through its parents.
    #[error("commit {id} is its own ancestor")]
    Cycle { id: ObjectId },

    /// An id resolves to an object of the wrong kind (e.g. a tree entry
    /// marked as a directory that names a blob).
    #[error("object {id} is not a {expected}")]
    WrongKind { id: ObjectId, expected: ObjectKind },

    /// The store reported the object as damaged.
    #[error("object {id} is damaged: {message}")]
    Damaged { id: ObjectId, message: String },
}

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The history or object graph violates an invariant. Fatal: the merge
    /// cannot proceed and the inputs need repair.
    #[error("graph corruption: {0}")]
    GraphCorruption(Corruption),

    /// The two commits share no ancestor and unrelated merges are disabled.
    #[error("refusing to merge unrelated histories {} and {}", .ours.short(), .theirs.short())]
    UnrelatedHistories {
        /// Our side of the merge.
        ours: ObjectId,
        /// Their side of the merge.
        theirs: ObjectId,
    },

    /// A rebase handle method was called in a state that does not allow it.
    #[error("cannot {action} while replay is {state}")]
    InvalidTransition {
        /// The replay phase at the time of the call.
        state: String,
        /// The attempted operation.
        action: &'static str,
    },

    /// A storage backend failure unrelated to graph consistency.
    #[error(transparent)]
    Store(StoreError),

    /// Reading or writing persisted replay state failed.
    #[error("replay state {}: {message}", .path.display())]
    State {
        /// The state file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MergeError {
    /// Returns `true` for [`MergeError::GraphCorruption`].
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::GraphCorruption(_))
    }
}

impl From<Corruption> for MergeError {
    fn from(corruption: Corruption) -> Self {
        Self::GraphCorruption(corruption)
    }
}

/// Lookups only ever follow ids taken from the graph itself, so a missing
/// or mistyped object means the graph is inconsistent.
impl From<StoreError> for MergeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => Self::GraphCorruption(Corruption::DanglingObject { id }),
            StoreError::KindMismatch { id, expected } => {
                Self::GraphCorruption(Corruption::WrongKind { id, expected })
            }
            StoreError::Corrupt { id, message } => {
                Self::GraphCorruption(Corruption::Damaged { id, message })
            }
            other => Self::Store(other),
        }
    }
}
