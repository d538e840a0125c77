//! Error types for store operations.
//!
//! [`StoreError`] is the single error type returned by the
//! [`ContentStore`](crate::ContentStore) and [`CommitGraph`](crate::CommitGraph)
//! traits. Callers match on the variant rather than parsing messages.

use thiserror::Error;

use crate::types::{ObjectId, ObjectIdParseError, ObjectKind};

/// Errors returned by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object with this id is stored.
    #[error("object {id} not found")]
    NotFound {
        /// The id that was requested.
        id: ObjectId,
    },

    /// The id names an object of a different kind than the caller needed.
    #[error("object {id} is not a {expected}")]
    KindMismatch {
        /// The id that was requested.
        id: ObjectId,
        /// The kind the caller asked for.
        expected: ObjectKind,
    },

    /// The stored bytes for this id are damaged or do not hash to the id.
    #[error("object {id} is corrupt: {message}")]
    Corrupt {
        /// The damaged object.
        id: ObjectId,
        /// What is wrong with it.
        message: String,
    },

    /// A hex id string could not be parsed.
    #[error("invalid object id `{value}`: {reason}")]
    InvalidObjectId {
        /// The raw value that failed.
        value: String,
        /// Why it failed.
        reason: String,
    },

    /// A storage backend failure not covered above.
    #[error("store backend error: {message}")]
    Backend {
        /// Backend-specific detail.
        message: String,
    },
}

impl From<ObjectIdParseError> for StoreError {
    fn from(err: ObjectIdParseError) -> Self {
        Self::InvalidObjectId {
            value: err.value,
            reason: err.reason,
        }
    }
}
