//! Three-way merge of trees and commits.
//!
//! - [`text`] — line-based diff3 merge of file content.
//! - [`tree`] — recursive per-path tree merge.
//! - [`policy`] — the whole-file favor filter applied before per-path rules.
//!
//! [`Merger`] ties them together. Tree merges are pure functions of the
//! three input ids: the same inputs always produce the same tree id and the
//! same conflict list. Commit merges add ancestry: already-merged and
//! fast-forward cases are detected first, and criss-cross histories are
//! merged against a virtual base built by merging the merge bases.

pub mod policy;
pub mod text;
pub mod tree;

use std::collections::BTreeSet;

use braid_store::{Commit, CommitGraph, CommitMeta, ContentStore, ObjectId, Signature, Tree};
use tracing::{debug, instrument, warn};

use crate::ancestry;
use crate::config::{Favor, MergeConfig};
use crate::error::MergeError;
use crate::graph;
use crate::model::MergeResult;

pub use text::{ConflictHunk, Markers, TextMerge, merge_text};
pub use tree::TreeMerger;

#[cfg(all(test, feature = "proptests"))]
mod properties;

/// Settings for one merge, usually derived from [`MergeConfig`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    pub markers: Markers,
    pub favor: Favor,
    pub alternate_suffix: String,
    pub parallel: bool,
    pub allow_unrelated_histories: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self::from_config(&MergeConfig::default())
    }
}

impl MergeOptions {
    #[must_use]
    pub fn from_config(config: &MergeConfig) -> Self {
        Self {
            markers: Markers {
                style: config.conflict_style,
                size: config.marker_size,
                labels: config.labels.clone(),
            },
            favor: config.favor,
            alternate_suffix: config.alternate_suffix.clone(),
            parallel: config.parallel,
            allow_unrelated_histories: config.allow_unrelated_histories,
        }
    }
}

/// Merges trees and commits from one store.
pub struct Merger<'a, S: ?Sized> {
    store: &'a S,
    options: &'a MergeOptions,
}

impl<'a, S: ContentStore + ?Sized> Merger<'a, S> {
    pub const fn new(store: &'a S, options: &'a MergeOptions) -> Self {
        Self { store, options }
    }

    /// Merge `ours` and `theirs` relative to `base`.
    ///
    /// When `ours` is the base, the result is their tree with
    /// `fast_forwarded` set. When `theirs` is the base or both sides are
    /// equal, the result is our tree.
    ///
    /// # Errors
    /// Returns [`MergeError::GraphCorruption`] if an input is not a stored
    /// tree or a reachable id is dangling.
    #[instrument(
        level = "debug",
        skip(self),
        fields(base = %base.short(), ours = %ours.short(), theirs = %theirs.short())
    )]
    pub fn merge_trees(
        &self,
        base: ObjectId,
        ours: ObjectId,
        theirs: ObjectId,
    ) -> Result<MergeResult, MergeError> {
        for id in BTreeSet::from([base, ours, theirs]) {
            self.store.read_tree(id)?;
        }

        if ours == theirs || theirs == base {
            debug!("nothing to merge from theirs");
            return Ok(clean(ours, false));
        }
        if ours == base {
            debug!("fast-forward to theirs");
            return Ok(clean(theirs, true));
        }

        let (tree, conflicts) =
            TreeMerger::new(self.store, self.options).merge_root(base, ours, theirs)?;
        if !conflicts.is_empty() {
            warn!(count = conflicts.len(), "merge produced conflicts");
        }
        Ok(MergeResult {
            tree,
            conflicts,
            fast_forwarded: false,
        })
    }
}

impl<S: ContentStore + CommitGraph + ?Sized> Merger<'_, S> {
    /// Merge two commits.
    ///
    /// - Equal commits, or `theirs` already contained in `ours`: our tree.
    /// - `ours` contained in `theirs`: their tree, fast-forwarded.
    /// - Otherwise a three-way merge against the merge base, or against a
    ///   virtual base when there are several.
    ///
    /// # Errors
    /// - [`MergeError::UnrelatedHistories`] if the commits share no ancestor
    ///   and unrelated merges are not allowed.
    /// - [`MergeError::GraphCorruption`] on dangling or cyclic history.
    #[instrument(
        level = "debug",
        skip(self),
        fields(ours = %ours.short(), theirs = %theirs.short())
    )]
    pub fn merge_commits(
        &self,
        ours: ObjectId,
        theirs: ObjectId,
    ) -> Result<MergeResult, MergeError> {
        graph::verify_acyclic(self.store, ours)?;
        graph::verify_acyclic(self.store, theirs)?;
        let our_commit = graph::load_commit(self.store, ours)?;
        let their_commit = graph::load_commit(self.store, theirs)?;

        if ours == theirs || ancestry::is_ancestor(self.store, theirs, ours)? {
            debug!("already up to date");
            return Ok(clean(our_commit.tree(), false));
        }
        if ancestry::is_ancestor(self.store, ours, theirs)? {
            debug!("fast-forward");
            return Ok(clean(their_commit.tree(), true));
        }

        let base = self.base_tree(ours, theirs, self.options.allow_unrelated_histories)?;
        let mut result = self.merge_trees(base, our_commit.tree(), their_commit.tree())?;
        // A tree-level fast-forward here means our changes were already in
        // the base, not that the ref can move.
        result.fast_forwarded = false;
        Ok(result)
    }

    /// The tree to use as merge base for two commits.
    fn base_tree(
        &self,
        ours: ObjectId,
        theirs: ObjectId,
        allow_unrelated: bool,
    ) -> Result<ObjectId, MergeError> {
        let bases = match ancestry::merge_bases(self.store, ours, theirs) {
            Ok(bases) => bases,
            Err(MergeError::UnrelatedHistories { .. }) if allow_unrelated => {
                warn!(
                    ours = %ours.short(),
                    theirs = %theirs.short(),
                    "merging unrelated histories against an empty base"
                );
                return Ok(self.store.write_tree(Tree::new())?);
            }
            Err(e) => return Err(e),
        };
        let mut iter = bases.into_iter();
        let Some(first) = iter.next() else {
            return Err(MergeError::UnrelatedHistories { ours, theirs });
        };
        let mut acc = first;
        for next in iter {
            acc = self.virtual_merge(acc, next)?;
        }
        Ok(graph::load_commit(self.store, acc)?.tree())
    }

    /// Merge two merge bases into a virtual commit. Conflicts are left in
    /// the tree as marker text and not reported.
    fn virtual_merge(&self, a: ObjectId, b: ObjectId) -> Result<ObjectId, MergeError> {
        debug!(a = %a.short(), b = %b.short(), "building virtual merge base");
        let a_commit = graph::load_commit(self.store, a)?;
        let b_commit = graph::load_commit(self.store, b)?;
        let tree = if ancestry::is_ancestor(self.store, a, b)? {
            b_commit.tree()
        } else if ancestry::is_ancestor(self.store, b, a)? {
            a_commit.tree()
        } else {
            let base = self.base_tree(a, b, true)?;
            self.merge_trees(base, a_commit.tree(), b_commit.tree())?.tree
        };
        let commit = Commit::new(vec![a, b], tree, virtual_meta());
        Ok(self.store.put_commit(commit)?)
    }
}

fn virtual_meta() -> CommitMeta {
    let sig = Signature::new("braid", "braid@localhost", 0);
    CommitMeta {
        author: sig.clone(),
        committer: sig,
        message: "virtual merge base".to_owned(),
    }
}

const fn clean(tree: ObjectId, fast_forwarded: bool) -> MergeResult {
    MergeResult {
        tree,
        conflicts: Vec::new(),
        fast_forwarded,
    }
}
