//! Core value types for the braid object store.
//!
//! These types form the vocabulary shared between the storage traits
//! ([`ContentStore`](crate::ContentStore), [`CommitGraph`](crate::CommitGraph))
//! and the merge engine. Every object is immutable once built; its identity
//! is the SHA-256 of a canonical encoding (see [`crate::encode`]).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::encode;

// ---------------------------------------------------------------------------
// ObjectId
// ---------------------------------------------------------------------------

/// A content identifier (SHA-256, 32 bytes).
///
/// Stored as raw bytes for cheap comparison, hashing, and Copy semantics.
/// Displays as 64 lowercase hex characters. Equal ids imply equal content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 32]);

impl ObjectId {
    /// Width of an id in bytes.
    pub const LEN: usize = 32;

    /// Create an `ObjectId` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Abbreviated hex form (first 12 characters), for log lines.
    #[must_use]
    pub fn short(&self) -> String {
        let mut s = self.to_string();
        s.truncate(12);
        s
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short())
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::LEN * 2 {
            return Err(ObjectIdParseError {
                value: s.to_owned(),
                reason: format!("expected 64 hex characters, got {}", s.len()),
            });
        }
        let mut bytes = [0u8; 32];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_digit(chunk[0]).ok_or_else(|| invalid_digit(s, chunk[0]))?;
            let lo = hex_digit(chunk[1]).ok_or_else(|| invalid_digit(s, chunk[1]))?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error from parsing a hex string into an [`ObjectId`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectIdParseError {
    /// The raw value that failed.
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for ObjectIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid object id {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for ObjectIdParseError {}

fn invalid_digit(value: &str, byte: u8) -> ObjectIdParseError {
    ObjectIdParseError {
        value: value.to_owned(),
        reason: format!("invalid hex digit '{}'", byte as char),
    }
}

const fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ObjectKind
// ---------------------------------------------------------------------------

/// The three kinds of stored object. Used in error reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::Tree => write!(f, "tree"),
            Self::Commit => write!(f, "commit"),
        }
    }
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

/// Kind of a tree entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    /// A regular file; the entry id names a blob.
    File,
    /// A subdirectory; the entry id names a tree.
    Directory,
}

impl EntryKind {
    /// The object kind an entry of this kind points at.
    #[must_use]
    pub const fn object_kind(self) -> ObjectKind {
        match self {
            Self::File => ObjectKind::Blob,
            Self::Directory => ObjectKind::Tree,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// A single entry in a [`Tree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TreeEntry {
    pub kind: EntryKind,
    pub id: ObjectId,
}

impl TreeEntry {
    #[must_use]
    pub const fn file(id: ObjectId) -> Self {
        Self {
            kind: EntryKind::File,
            id,
        }
    }

    #[must_use]
    pub const fn directory(id: ObjectId) -> Self {
        Self {
            kind: EntryKind::Directory,
            id,
        }
    }

    #[must_use]
    pub const fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

/// A directory snapshot: entry name → entry, ordered lexicographically.
///
/// Names are single path components. The ordering is the canonical order
/// used for hashing and for every traversal the engine performs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<String, TreeEntry>,
}

impl Tree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.get(name)
    }

    /// Insert or replace an entry, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, entry: TreeEntry) -> Option<TreeEntry> {
        self.entries.insert(name.into(), entry)
    }

    /// Remove an entry by name.
    pub fn remove(&mut self, name: &str) -> Option<TreeEntry> {
        self.entries.remove(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TreeEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Entry names in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, TreeEntry)> for Tree {
    fn from_iter<I: IntoIterator<Item = (String, TreeEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// A stored content object: file bytes or a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Snapshot {
    Blob(Vec<u8>),
    Tree(Tree),
}

impl Snapshot {
    /// Compute the content id of this snapshot.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        match self {
            Self::Blob(bytes) => encode::blob_id(bytes),
            Self::Tree(tree) => encode::tree_id(tree),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        match self {
            Self::Blob(_) => ObjectKind::Blob,
            Self::Tree(_) => ObjectKind::Tree,
        }
    }
}

// ---------------------------------------------------------------------------
// Commits
// ---------------------------------------------------------------------------

/// Who made a change, and when (seconds since the Unix epoch).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub timestamp: i64,
}

impl Signature {
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {}", self.name, self.email, self.timestamp)
    }
}

/// Descriptive commit metadata. Not interpreted by the merge engine.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommitMeta {
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

/// A commit: a root tree plus zero or more parents.
///
/// Zero parents marks a root commit, two or more a merge commit. The id is
/// derived from the content when built through [`Commit::new`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Commit {
    id: ObjectId,
    parents: Vec<ObjectId>,
    tree: ObjectId,
    meta: CommitMeta,
}

impl Commit {
    /// Build a commit and compute its content id.
    #[must_use]
    pub fn new(parents: Vec<ObjectId>, tree: ObjectId, meta: CommitMeta) -> Self {
        let id = encode::commit_id(&parents, tree, &meta);
        Self {
            id,
            parents,
            tree,
            meta,
        }
    }

    /// Reassemble a commit read back from a backend under a known id.
    ///
    /// The id is trusted as given; nothing is re-hashed.
    #[must_use]
    pub const fn from_parts(
        id: ObjectId,
        parents: Vec<ObjectId>,
        tree: ObjectId,
        meta: CommitMeta,
    ) -> Self {
        Self {
            id,
            parents,
            tree,
            meta,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    #[must_use]
    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }

    #[must_use]
    pub fn first_parent(&self) -> Option<ObjectId> {
        self.parents.first().copied()
    }

    #[must_use]
    pub const fn tree(&self) -> ObjectId {
        self.tree
    }

    #[must_use]
    pub const fn meta(&self) -> &CommitMeta {
        &self.meta
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }

    #[must_use]
    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> Signature {
        Signature::new("Ada", "ada@example.com", 1_700_000_000)
    }

    fn meta(message: &str) -> CommitMeta {
        CommitMeta {
            author: sig(),
            committer: sig(),
            message: message.to_owned(),
        }
    }

    #[test]
    fn object_id_display_and_parse() {
        let id = Snapshot::Blob(b"hello\n".to_vec()).id();
        let hex = id.to_string();
        assert_eq!(hex.len(), 64);
        assert_eq!(hex.parse::<ObjectId>().unwrap(), id);
        assert_eq!(hex.to_uppercase().parse::<ObjectId>().unwrap(), id);
    }

    #[test]
    fn object_id_parse_rejects_bad_input() {
        let err = "abc".parse::<ObjectId>().unwrap_err();
        assert!(err.reason.contains("expected 64"));
        let bad = "z".repeat(64);
        let err = bad.parse::<ObjectId>().unwrap_err();
        assert!(err.reason.contains("invalid hex digit 'z'"));
    }

    #[test]
    fn object_id_debug_is_abbreviated() {
        let id = ObjectId::from_bytes([0xab; 32]);
        assert_eq!(format!("{id:?}"), "ObjectId(abababababab)");
    }

    #[test]
    fn object_id_serde_as_hex_string() {
        let id = ObjectId::from_bytes([7; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let back: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn tree_iterates_in_name_order() {
        let blob = Snapshot::Blob(Vec::new()).id();
        let mut tree = Tree::new();
        tree.insert("zeta", TreeEntry::file(blob));
        tree.insert("alpha", TreeEntry::file(blob));
        tree.insert("Mid", TreeEntry::file(blob));
        let names: Vec<_> = tree.names().collect();
        assert_eq!(names, vec!["Mid", "alpha", "zeta"]);
    }

    #[test]
    fn tree_id_independent_of_insertion_order() {
        let a = Snapshot::Blob(b"a".to_vec()).id();
        let b = Snapshot::Blob(b"b".to_vec()).id();
        let mut t1 = Tree::new();
        t1.insert("x", TreeEntry::file(a));
        t1.insert("y", TreeEntry::file(b));
        let mut t2 = Tree::new();
        t2.insert("y", TreeEntry::file(b));
        t2.insert("x", TreeEntry::file(a));
        assert_eq!(Snapshot::Tree(t1).id(), Snapshot::Tree(t2).id());
    }

    #[test]
    fn entry_kind_is_part_of_tree_identity() {
        let id = Snapshot::Blob(b"a".to_vec()).id();
        let mut as_file = Tree::new();
        as_file.insert("x", TreeEntry::file(id));
        let mut as_dir = Tree::new();
        as_dir.insert("x", TreeEntry::directory(id));
        assert_ne!(Snapshot::Tree(as_file).id(), Snapshot::Tree(as_dir).id());
    }

    #[test]
    fn commit_id_covers_parents_and_message() {
        let tree = Snapshot::Tree(Tree::new()).id();
        let root = Commit::new(vec![], tree, meta("root"));
        let child = Commit::new(vec![root.id()], tree, meta("root"));
        let other = Commit::new(vec![], tree, meta("other"));
        assert_ne!(root.id(), child.id());
        assert_ne!(root.id(), other.id());
        assert!(root.is_root());
        assert_eq!(child.first_parent(), Some(root.id()));
        assert!(!child.is_merge());
    }
}
