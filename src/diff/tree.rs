//! Structured diff between two tree snapshots.
//!
//! The differ walks both trees in name order. Entries with equal ids are
//! reported as [`Change::Unchanged`] without descending, since equal ids mean
//! equal content all the way down. Directories that differ get a nested
//! [`TreeDelta`] of their own.

use braid_store::{ContentStore, ObjectId, Tree, TreeEntry};

use crate::error::MergeError;
use crate::model::RepoPath;

/// What happened to one entry between the base and the other tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Change {
    Added(TreeEntry),
    Removed(TreeEntry),
    Modified { old: TreeEntry, new: TreeEntry },
    Unchanged(TreeEntry),
}

impl Change {
    /// The entry on the base side, if any.
    #[must_use]
    pub const fn old(&self) -> Option<&TreeEntry> {
        match self {
            Self::Removed(e) | Self::Unchanged(e) | Self::Modified { old: e, .. } => Some(e),
            Self::Added(_) => None,
        }
    }

    /// The entry on the other side, if any.
    #[must_use]
    pub const fn new_entry(&self) -> Option<&TreeEntry> {
        match self {
            Self::Added(e) | Self::Unchanged(e) | Self::Modified { new: e, .. } => Some(e),
            Self::Removed(_) => None,
        }
    }
}

/// One named entry of a [`TreeDelta`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeltaEntry {
    pub name: String,
    pub change: Change,
    /// Nested delta when a directory is involved and something changed.
    pub children: Option<TreeDelta>,
}

/// Per-entry changes of one directory level, in name order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeDelta {
    pub entries: Vec<DeltaEntry>,
}

/// A leaf-level change with its full path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileChange {
    pub path: RepoPath,
    pub change: Change,
}

impl TreeDelta {
    /// `true` if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries
            .iter()
            .all(|e| matches!(e.change, Change::Unchanged(_)))
    }

    /// File-level changes with full paths, in path order. Unchanged entries
    /// are left out; directory additions and removals are expanded into the
    /// files they contain, and a file replaced by a directory (or the
    /// reverse) shows up as a removal plus additions.
    #[must_use]
    pub fn flatten(&self) -> Vec<FileChange> {
        let mut out = Vec::new();
        self.flatten_into(&RepoPath::root(), &mut out);
        out
    }

    fn flatten_into(&self, prefix: &RepoPath, out: &mut Vec<FileChange>) {
        for entry in &self.entries {
            let path = prefix.join(&entry.name);
            match entry.change {
                Change::Unchanged(_) => continue,
                Change::Added(e) | Change::Removed(e) if !e.is_directory() => {
                    out.push(FileChange {
                        path: path.clone(),
                        change: entry.change,
                    });
                }
                Change::Modified { old, new } if !old.is_directory() && !new.is_directory() => {
                    out.push(FileChange {
                        path: path.clone(),
                        change: entry.change,
                    });
                }
                Change::Modified { old, new } if old.is_directory() != new.is_directory() => {
                    let file_change = if old.is_directory() {
                        Change::Added(new)
                    } else {
                        Change::Removed(old)
                    };
                    out.push(FileChange {
                        path: path.clone(),
                        change: file_change,
                    });
                }
                _ => {}
            }
            if let Some(children) = &entry.children {
                children.flatten_into(&path, out);
            }
        }
    }
}

/// Diff two stored trees.
///
/// # Errors
/// Returns [`MergeError::GraphCorruption`] if either id, or any subtree id
/// reached while descending, does not resolve to a tree.
pub fn diff_trees<S: ContentStore + ?Sized>(
    store: &S,
    base: ObjectId,
    other: ObjectId,
) -> Result<TreeDelta, MergeError> {
    if base == other {
        let tree = store.read_tree(base)?;
        return Ok(TreeDelta {
            entries: tree
                .iter()
                .map(|(name, entry)| DeltaEntry {
                    name: name.to_owned(),
                    change: Change::Unchanged(*entry),
                    children: None,
                })
                .collect(),
        });
    }
    let base_tree = store.read_tree(base)?;
    let other_tree = store.read_tree(other)?;
    diff_loaded(store, &base_tree, &other_tree)
}

fn diff_loaded<S: ContentStore + ?Sized>(
    store: &S,
    base: &Tree,
    other: &Tree,
) -> Result<TreeDelta, MergeError> {
    let mut names: Vec<&str> = base.names().chain(other.names()).collect();
    names.sort_unstable();
    names.dedup();

    let mut entries = Vec::with_capacity(names.len());
    for name in names {
        let (change, children) = match (base.get(name), other.get(name)) {
            (Some(old), Some(new)) if old == new => (Change::Unchanged(*old), None),
            (Some(old), Some(new)) => {
                let children = match (old.is_directory(), new.is_directory()) {
                    (true, true) => Some(diff_loaded(
                        store,
                        &store.read_tree(old.id)?,
                        &store.read_tree(new.id)?,
                    )?),
                    (true, false) => {
                        Some(diff_loaded(store, &store.read_tree(old.id)?, &Tree::new())?)
                    }
                    (false, true) => {
                        Some(diff_loaded(store, &Tree::new(), &store.read_tree(new.id)?)?)
                    }
                    (false, false) => None,
                };
                (Change::Modified { old: *old, new: *new }, children)
            }
            (Some(old), None) => {
                let children = if old.is_directory() {
                    Some(diff_loaded(store, &store.read_tree(old.id)?, &Tree::new())?)
                } else {
                    None
                };
                (Change::Removed(*old), children)
            }
            (None, Some(new)) => {
                let children = if new.is_directory() {
                    Some(diff_loaded(store, &Tree::new(), &store.read_tree(new.id)?)?)
                } else {
                    None
                };
                (Change::Added(*new), children)
            }
            (None, None) => continue,
        };
        entries.push(DeltaEntry {
            name: name.to_owned(),
            change,
            children,
        });
    }
    Ok(TreeDelta { entries })
}
