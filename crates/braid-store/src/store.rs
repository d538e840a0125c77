//! The storage traits consumed by the merge engine.
//!
//! The engine never touches storage directly; it only reads and writes
//! through these two traits. Both are object-safe and require `Send + Sync`
//! so a single store can be shared across threads behind an `Arc`.
//!
//! - [`ContentStore`]: implement `get` and `put`; `read_blob`, `read_tree`,
//!   `write_blob`, `write_tree` and `contains` are provided.
//! - [`CommitGraph`]: implement `get_commit` and `put_commit`; `parents` is
//!   provided.

use std::sync::Arc;

use crate::error::StoreError;
use crate::types::{Commit, ObjectId, ObjectKind, Snapshot, Tree};

/// Content-addressed storage for blobs and trees.
///
/// # Convergence
///
/// `put` must be idempotent: storing the same snapshot twice, possibly from
/// different threads at the same time, yields the same id and leaves a
/// single stored object.
pub trait ContentStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Required
    // -----------------------------------------------------------------------

    /// Fetch the snapshot stored under `id`.
    fn get(&self, id: ObjectId) -> Result<Snapshot, StoreError>;

    /// Store a snapshot and return its id.
    fn put(&self, snapshot: Snapshot) -> Result<ObjectId, StoreError>;

    // -----------------------------------------------------------------------
    // Provided
    // -----------------------------------------------------------------------

    /// Whether an object with this id is stored.
    fn contains(&self, id: ObjectId) -> Result<bool, StoreError> {
        match self.get(id) {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch a blob's bytes. Fails with [`StoreError::KindMismatch`] if `id`
    /// names a tree.
    fn read_blob(&self, id: ObjectId) -> Result<Vec<u8>, StoreError> {
        match self.get(id)? {
            Snapshot::Blob(bytes) => Ok(bytes),
            Snapshot::Tree(_) => Err(StoreError::KindMismatch {
                id,
                expected: ObjectKind::Blob,
            }),
        }
    }

    /// Fetch a tree. Fails with [`StoreError::KindMismatch`] if `id` names a
    /// blob.
    fn read_tree(&self, id: ObjectId) -> Result<Tree, StoreError> {
        match self.get(id)? {
            Snapshot::Tree(tree) => Ok(tree),
            Snapshot::Blob(_) => Err(StoreError::KindMismatch {
                id,
                expected: ObjectKind::Tree,
            }),
        }
    }

    fn write_blob(&self, bytes: Vec<u8>) -> Result<ObjectId, StoreError> {
        self.put(Snapshot::Blob(bytes))
    }

    fn write_tree(&self, tree: Tree) -> Result<ObjectId, StoreError> {
        self.put(Snapshot::Tree(tree))
    }
}

/// Queryable commit history.
pub trait CommitGraph: Send + Sync {
    /// Fetch the commit with this id.
    fn get_commit(&self, id: ObjectId) -> Result<Commit, StoreError>;

    /// Store a commit and return its id. Idempotent, like [`ContentStore::put`].
    fn put_commit(&self, commit: Commit) -> Result<ObjectId, StoreError>;

    /// Parent ids of a commit, in recorded order.
    fn parents(&self, id: ObjectId) -> Result<Vec<ObjectId>, StoreError> {
        Ok(self.get_commit(id)?.parents().to_vec())
    }
}

impl<T: ContentStore + ?Sized> ContentStore for Arc<T> {
    fn get(&self, id: ObjectId) -> Result<Snapshot, StoreError> {
        (**self).get(id)
    }

    fn put(&self, snapshot: Snapshot) -> Result<ObjectId, StoreError> {
        (**self).put(snapshot)
    }
}

impl<T: CommitGraph + ?Sized> CommitGraph for Arc<T> {
    fn get_commit(&self, id: ObjectId) -> Result<Commit, StoreError> {
        (**self).get_commit(id)
    }

    fn put_commit(&self, commit: Commit) -> Result<ObjectId, StoreError> {
        (**self).put_commit(commit)
    }

    fn parents(&self, id: ObjectId) -> Result<Vec<ObjectId>, StoreError> {
        (**self).parents(id)
    }
}
