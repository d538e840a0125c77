//! braid: a merge engine for content-addressed version control.
//!
//! Given commits and tree snapshots in a store implementing
//! [`ContentStore`] and [`CommitGraph`], braid computes merge bases, diffs
//! trees, merges trees and commits three ways, and replays commits for
//! rebase and cherry-pick. It never touches a working directory: inputs are
//! ids, outputs are new ids plus a structured conflict list.
//!
//! # Layout
//!
//! | Module       | Role |
//! |--------------|------|
//! | [`graph`]    | commit loading, reachability, cycle checks, replay ranges |
//! | [`ancestry`] | merge bases, ancestor and fast-forward queries |
//! | [`diff`]     | recursive tree diff and the optional rename pass |
//! | [`merge`]    | diff3 text merge, tree merge, favor policy, commit merge |
//! | [`replay`]   | the rebase state machine and its persisted state |
//! | [`engine`]   | [`Engine`], one facade over all of the above |
//! | [`config`]   | `braid.toml` loading and validation |
//! | [`model`]    | [`MergeResult`], [`Conflict`], [`RepoPath`] |
//! | [`error`]    | [`MergeError`] and [`Corruption`] |
//!
//! Storage types and the in-memory store come from `braid-store` and are
//! re-exported here.

pub mod ancestry;
pub mod config;
pub mod diff;
pub mod engine;
pub mod error;
pub mod graph;
pub mod merge;
pub mod model;
pub mod replay;

pub use braid_store::{
    Commit, CommitGraph, CommitMeta, ContentStore, EntryKind, MemoryStore, ObjectId, Signature,
    Snapshot, StoreError, Tree, TreeEntry,
};
pub use config::BraidConfig;
pub use engine::Engine;
pub use error::{Corruption, MergeError};
pub use merge::MergeOptions;
pub use model::{Conflict, ConflictKind, Content, MergeResult, Region, RepoPath, Side};
pub use replay::{RebaseHandle, RebaseState, ReplayPhase, ReplayStatus};

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use braid_store::{
        Commit, CommitGraph, CommitMeta, ContentStore, ObjectId, Signature, Tree, TreeEntry,
    };

    enum Node {
        File(String),
        Dir(BTreeMap<String, Node>),
    }

    fn write<S: ContentStore + ?Sized>(store: &S, dir: &BTreeMap<String, Node>) -> ObjectId {
        let mut tree = Tree::new();
        for (name, node) in dir {
            let entry = match node {
                Node::File(text) => {
                    TreeEntry::file(store.write_blob(text.clone().into_bytes()).unwrap())
                }
                Node::Dir(children) => TreeEntry::directory(write(store, children)),
            };
            tree.insert(name.clone(), entry);
        }
        store.write_tree(tree).unwrap()
    }

    /// Store a tree from `(path, content)` pairs; `/` separates directories.
    pub fn build_tree<S: ContentStore + ?Sized>(store: &S, files: &[(&str, &str)]) -> ObjectId {
        let mut root: BTreeMap<String, Node> = BTreeMap::new();
        for (path, content) in files {
            let mut parts: Vec<&str> = path.split('/').collect();
            let file = parts.pop().unwrap();
            let mut dir = &mut root;
            for part in parts {
                let node = dir
                    .entry(part.to_owned())
                    .or_insert_with(|| Node::Dir(BTreeMap::new()));
                let Node::Dir(children) = node else {
                    panic!("{part} is both a file and a directory");
                };
                dir = children;
            }
            dir.insert(file.to_owned(), Node::File((*content).to_owned()));
        }
        write(store, &root)
    }

    /// The text at `path` in `tree`, or `None` if absent or a directory.
    pub fn read_file<S: ContentStore + ?Sized>(
        store: &S,
        tree: ObjectId,
        path: &str,
    ) -> Option<String> {
        let mut parts: Vec<&str> = path.split('/').collect();
        let file = parts.pop()?;
        let mut current = store.read_tree(tree).ok()?;
        for part in parts {
            let entry = current.get(part)?;
            if !entry.is_directory() {
                return None;
            }
            current = store.read_tree(entry.id).ok()?;
        }
        let entry = current.get(file)?;
        if entry.is_directory() {
            return None;
        }
        let bytes = store.read_blob(entry.id).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn commit<G: CommitGraph + ?Sized>(
        graph: &G,
        parents: &[ObjectId],
        tree: ObjectId,
        message: &str,
    ) -> ObjectId {
        let sig = Signature::new("Test", "test@example.com", 1_700_000_000);
        let meta = CommitMeta {
            author: sig.clone(),
            committer: sig,
            message: message.to_owned(),
        };
        graph.put_commit(Commit::new(parents.to_vec(), tree, meta)).unwrap()
    }
}
