//! In-memory store backed by concurrent hash maps.
//!
//! Objects and commits live in two [`DashMap`]s keyed by id. Inserts go
//! through the map's entry API so concurrent `put`s of the same content keep
//! the first stored copy and every caller gets the same id back.

use dashmap::DashMap;
use tracing::trace;

use crate::error::StoreError;
use crate::store::{CommitGraph, ContentStore};
use crate::types::{Commit, ObjectId, Snapshot};

/// A thread-safe, append-only, in-memory [`ContentStore`] + [`CommitGraph`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<ObjectId, Snapshot>,
    commits: DashMap<ObjectId, Commit>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs and trees.
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of stored commits.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }
}

impl ContentStore for MemoryStore {
    fn get(&self, id: ObjectId) -> Result<Snapshot, StoreError> {
        self.objects
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound { id })
    }

    fn put(&self, snapshot: Snapshot) -> Result<ObjectId, StoreError> {
        let id = snapshot.id();
        self.objects.entry(id).or_insert_with(|| {
            trace!(%id, kind = %snapshot.kind(), "store object");
            snapshot
        });
        Ok(id)
    }

    fn contains(&self, id: ObjectId) -> Result<bool, StoreError> {
        Ok(self.objects.contains_key(&id))
    }
}

impl CommitGraph for MemoryStore {
    fn get_commit(&self, id: ObjectId) -> Result<Commit, StoreError> {
        self.commits
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::NotFound { id })
    }

    fn put_commit(&self, commit: Commit) -> Result<ObjectId, StoreError> {
        let id = commit.id();
        self.commits.entry(id).or_insert(commit);
        Ok(id)
    }

    fn parents(&self, id: ObjectId) -> Result<Vec<ObjectId>, StoreError> {
        self.commits
            .get(&id)
            .map(|entry| entry.value().parents().to_vec())
            .ok_or(StoreError::NotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::types::{CommitMeta, EntryKind, ObjectKind, Signature, Tree, TreeEntry};

    #[test]
    fn put_then_get_roundtrips() {
        let store = MemoryStore::new();
        let id = store.write_blob(b"hello\n".to_vec()).unwrap();
        assert_eq!(store.read_blob(id).unwrap(), b"hello\n");
        assert!(store.contains(id).unwrap());
    }

    #[test]
    fn missing_object_is_not_found() {
        let store = MemoryStore::new();
        let id = ObjectId::from_bytes([1; 32]);
        assert!(matches!(store.get(id), Err(StoreError::NotFound { id: got }) if got == id));
        assert!(!store.contains(id).unwrap());
    }

    #[test]
    fn read_tree_on_blob_is_kind_mismatch() {
        let store = MemoryStore::new();
        let id = store.write_blob(b"x".to_vec()).unwrap();
        let err = store.read_tree(id).unwrap_err();
        assert!(matches!(
            err,
            StoreError::KindMismatch {
                expected: ObjectKind::Tree,
                ..
            }
        ));
    }

    #[test]
    fn identical_puts_converge() {
        let store = MemoryStore::new();
        let a = store.write_blob(b"same".to_vec()).unwrap();
        let b = store.write_blob(b"same".to_vec()).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.object_count(), 1);
    }

    #[test]
    fn concurrent_puts_converge() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let blob = store.write_blob(b"shared".to_vec()).unwrap();
                    let mut tree = Tree::new();
                    tree.insert("f", TreeEntry::file(blob));
                    store.write_tree(tree).unwrap()
                })
            })
            .collect();
        let ids: Vec<ObjectId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.object_count(), 2);
    }

    #[test]
    fn commits_store_and_expose_parents() {
        let store = MemoryStore::new();
        let tree = store.write_tree(Tree::new()).unwrap();
        let sig = Signature::new("Ada", "ada@example.com", 0);
        let meta = CommitMeta {
            author: sig.clone(),
            committer: sig,
            message: "root".into(),
        };
        let root = Commit::new(vec![], tree, meta.clone());
        let root_id = store.put_commit(root).unwrap();
        let child = Commit::new(vec![root_id], tree, meta);
        let child_id = store.put_commit(child).unwrap();
        assert_eq!(store.parents(child_id).unwrap(), vec![root_id]);
        assert!(store.parents(root_id).unwrap().is_empty());
        assert_eq!(store.commit_count(), 2);
        let tree_entry = store.read_tree(tree).unwrap();
        assert!(tree_entry.iter().all(|(_, e)| e.kind == EntryKind::File));
    }

    #[test]
    fn distinct_trees_read_back_as_written() {
        let store = MemoryStore::new();
        let mut shifted = [0u8; 32];
        shifted[31] = b'f';

        let mut a = Tree::new();
        a.insert("a", TreeEntry::file(ObjectId::from_bytes([0; 32])));
        a.insert("fx", TreeEntry::file(ObjectId::from_bytes([7; 32])));
        let mut b = Tree::new();
        b.insert("a\0", TreeEntry::file(ObjectId::from_bytes(shifted)));
        b.insert("x", TreeEntry::file(ObjectId::from_bytes([7; 32])));

        let a_id = store.write_tree(a.clone()).unwrap();
        let b_id = store.write_tree(b.clone()).unwrap();
        assert_ne!(a_id, b_id);
        assert_eq!(store.read_tree(a_id).unwrap(), a);
        assert_eq!(store.read_tree(b_id).unwrap(), b);
    }
}
