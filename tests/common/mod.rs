//! Shared helpers for braid integration tests.
//!
//! Every test builds its own in-memory store through [`TestRepo`]; nothing
//! touches the file system except the tests that persist state or config
//! into a `TempDir`.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use braid::{
    BraidConfig, Commit, CommitGraph, CommitMeta, ContentStore, Engine, MemoryStore, ObjectId,
    Signature, Tree, TreeEntry,
};

static TRACING: Once = Once::new();

/// Install a test subscriber once per binary. `RUST_LOG=braid=debug` shows
/// the engine's spans.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// An in-memory store with an engine over it.
pub struct TestRepo {
    pub store: Arc<MemoryStore>,
    pub engine: Engine<MemoryStore>,
    clock: std::sync::atomic::AtomicI64,
}

impl TestRepo {
    pub fn new() -> Self {
        Self::with_config(BraidConfig::default())
    }

    pub fn with_config(config: BraidConfig) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let engine = Engine::from_arc(Arc::clone(&store)).with_config(config);
        Self {
            store,
            engine,
            clock: std::sync::atomic::AtomicI64::new(1_700_000_000),
        }
    }

    /// Store a tree from `(path, content)` pairs. `/` separates directories.
    pub fn tree(&self, files: &[(&str, &str)]) -> ObjectId {
        let mut sorted: Vec<(Vec<&str>, &str)> = files
            .iter()
            .map(|(path, content)| (path.split('/').collect(), *content))
            .collect();
        sorted.sort();
        self.write_level(&sorted)
    }

    fn write_level(&self, files: &[(Vec<&str>, &str)]) -> ObjectId {
        let mut tree = Tree::new();
        let mut i = 0;
        while i < files.len() {
            let (parts, content) = &files[i];
            if parts.len() == 1 {
                let blob = self.store.write_blob(content.as_bytes().to_vec()).unwrap();
                tree.insert(parts[0], TreeEntry::file(blob));
                i += 1;
                continue;
            }
            let name = parts[0];
            let mut children = Vec::new();
            while i < files.len() && files[i].0.len() > 1 && files[i].0[0] == name {
                children.push((files[i].0[1..].to_vec(), files[i].1));
                i += 1;
            }
            tree.insert(name, TreeEntry::directory(self.write_level(&children)));
        }
        self.store.write_tree(tree).unwrap()
    }

    /// Commit `files` on top of `parents`.
    pub fn commit(&self, parents: &[ObjectId], files: &[(&str, &str)], message: &str) -> ObjectId {
        let tree = self.tree(files);
        self.commit_tree(parents, tree, message)
    }

    pub fn commit_tree(&self, parents: &[ObjectId], tree: ObjectId, message: &str) -> ObjectId {
        let ts = self.clock.fetch_add(60, std::sync::atomic::Ordering::Relaxed);
        let sig = Signature::new("Ada", "ada@example.com", ts);
        let meta = CommitMeta {
            author: sig.clone(),
            committer: sig,
            message: message.to_owned(),
        };
        self.store
            .put_commit(Commit::new(parents.to_vec(), tree, meta))
            .unwrap()
    }

    pub fn commit_of(&self, id: ObjectId) -> Commit {
        self.store.get_commit(id).unwrap()
    }

    pub fn tree_of(&self, commit: ObjectId) -> ObjectId {
        self.commit_of(commit).tree()
    }

    /// Text of the file at `path`, `None` if absent.
    pub fn read(&self, tree: ObjectId, path: &str) -> Option<String> {
        let mut parts: Vec<&str> = path.split('/').collect();
        let file = parts.pop()?;
        let mut current = self.store.read_tree(tree).ok()?;
        for part in parts {
            let entry = current.get(part)?;
            current = self.store.read_tree(entry.id).ok()?;
        }
        let entry = current.get(file)?;
        let bytes = self.store.read_blob(entry.id).ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Every file path in `tree`, sorted.
    pub fn files(&self, tree: ObjectId) -> Vec<String> {
        let mut out = Vec::new();
        self.collect(tree, "", &mut out);
        out
    }

    fn collect(&self, tree: ObjectId, prefix: &str, out: &mut Vec<String>) {
        for (name, entry) in self.store.read_tree(tree).unwrap().iter() {
            let path = if prefix.is_empty() {
                name.to_owned()
            } else {
                format!("{prefix}/{name}")
            };
            if entry.is_directory() {
                self.collect(entry.id, &path, out);
            } else {
                out.push(path);
            }
        }
    }
}
