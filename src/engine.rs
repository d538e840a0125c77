//! The engine facade: one store, one configuration, every operation.
//!
//! [`Engine`] is cheap to clone and `Send + Sync` when the store is, so a
//! single engine can serve concurrent callers. Queries and merges are pure
//! functions of their input ids; the only writes are new content-addressed
//! objects.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use braid_store::{CommitGraph, ContentStore, ObjectId, Tree};
use tracing::{info, instrument};

use crate::ancestry;
use crate::config::BraidConfig;
use crate::diff::{self, RenameReport, TreeDelta};
use crate::error::MergeError;
use crate::graph;
use crate::merge::{MergeOptions, Merger};
use crate::model::MergeResult;
use crate::replay::{RebaseHandle, RebaseState};

/// Merge, ancestry, diff and replay over a shared store.
pub struct Engine<S> {
    store: Arc<S>,
    config: Arc<BraidConfig>,
}

impl<S> Clone for Engine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S> std::fmt::Debug for Engine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").field("config", &self.config).finish_non_exhaustive()
    }
}

impl<S: ContentStore + CommitGraph> Engine<S> {
    /// An engine with default configuration.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self::from_arc(Arc::new(store))
    }

    /// An engine over a store the caller keeps a handle to.
    #[must_use]
    pub fn from_arc(store: Arc<S>) -> Self {
        Self {
            store,
            config: Arc::new(BraidConfig::default()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: BraidConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &BraidConfig {
        &self.config
    }

    #[must_use]
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions::from_config(&self.config.merge)
    }

    // -----------------------------------------------------------------------
    // Ancestry
    // -----------------------------------------------------------------------

    /// All lowest common ancestors of `a` and `b`.
    ///
    /// # Errors
    /// [`MergeError::UnrelatedHistories`] or [`MergeError::GraphCorruption`].
    pub fn merge_base(&self, a: ObjectId, b: ObjectId) -> Result<BTreeSet<ObjectId>, MergeError> {
        ancestry::merge_bases(self.store(), a, b)
    }

    /// # Errors
    /// [`MergeError::GraphCorruption`] on dangling or cyclic history.
    pub fn is_ancestor(&self, a: ObjectId, b: ObjectId) -> Result<bool, MergeError> {
        ancestry::is_ancestor(self.store(), a, b)
    }

    /// # Errors
    /// [`MergeError::GraphCorruption`] on dangling or cyclic history.
    pub fn is_fast_forward(&self, from: ObjectId, to: ObjectId) -> Result<bool, MergeError> {
        ancestry::is_fast_forward(self.store(), from, to)
    }

    /// Check that every commit reachable from `tip` is stored and that the
    /// history has no cycles.
    ///
    /// # Errors
    /// [`MergeError::GraphCorruption`] naming the first problem found.
    pub fn verify_history(&self, tip: ObjectId) -> Result<(), MergeError> {
        graph::verify_acyclic(self.store(), tip)
    }

    // -----------------------------------------------------------------------
    // Diff
    // -----------------------------------------------------------------------

    /// # Errors
    /// [`MergeError::GraphCorruption`] if a tree cannot be loaded.
    pub fn diff(&self, base: ObjectId, other: ObjectId) -> Result<TreeDelta, MergeError> {
        diff::diff_trees(self.store(), base, other)
    }

    /// Flattened file changes, with renames paired up when the rename pass
    /// is enabled in the configuration.
    ///
    /// # Errors
    /// [`MergeError::GraphCorruption`] if a tree or blob cannot be loaded.
    pub fn diff_with_renames(
        &self,
        base: ObjectId,
        other: ObjectId,
    ) -> Result<RenameReport, MergeError> {
        let changes = self.diff(base, other)?.flatten();
        let rename = &self.config.rename;
        if !rename.enabled {
            return Ok(RenameReport {
                renames: Vec::new(),
                remaining: changes,
            });
        }
        diff::detect_renames(self.store(), changes, rename.threshold)
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Three-way merge of trees.
    ///
    /// # Errors
    /// [`MergeError::GraphCorruption`] if an input is not a stored tree.
    pub fn merge_trees(
        &self,
        base: ObjectId,
        ours: ObjectId,
        theirs: ObjectId,
    ) -> Result<MergeResult, MergeError> {
        let options = self.merge_options();
        Merger::new(self.store(), &options).merge_trees(base, ours, theirs)
    }

    /// Merge commit `theirs` into commit `ours`.
    ///
    /// # Errors
    /// [`MergeError::UnrelatedHistories`] (unless allowed by configuration)
    /// or [`MergeError::GraphCorruption`].
    pub fn merge(&self, ours: ObjectId, theirs: ObjectId) -> Result<MergeResult, MergeError> {
        let options = self.merge_options();
        Merger::new(self.store(), &options).merge_commits(ours, theirs)
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    /// A pending replay of `commits` (oldest first) onto `onto`. Nothing is
    /// applied until the handle is driven.
    ///
    /// # Errors
    /// [`MergeError::GraphCorruption`] if `onto` or a commit is not stored.
    pub fn prepare_rebase(
        &self,
        commits: Vec<ObjectId>,
        onto: ObjectId,
    ) -> Result<RebaseHandle<S>, MergeError> {
        graph::load_commit(self.store(), onto)?;
        for &id in &commits {
            graph::load_commit(self.store(), id)?;
        }
        Ok(RebaseHandle::new(self.clone(), RebaseState::new(onto, commits)))
    }

    /// Replay `commits` onto `onto`, running until done or suspended on a
    /// conflict.
    ///
    /// # Errors
    /// [`MergeError::GraphCorruption`] on inconsistent history.
    #[instrument(
        level = "debug",
        skip(self, commits),
        fields(count = commits.len(), onto = %onto.short())
    )]
    pub fn rebase(
        &self,
        commits: Vec<ObjectId>,
        onto: ObjectId,
    ) -> Result<RebaseHandle<S>, MergeError> {
        let mut handle = self.prepare_rebase(commits, onto)?;
        handle.continue_()?;
        Ok(handle)
    }

    /// Replay the commits of `head` that `upstream` lacks onto `onto`
    /// (`upstream` itself when `None`).
    ///
    /// # Errors
    /// [`MergeError::GraphCorruption`] on inconsistent history.
    pub fn rebase_branch(
        &self,
        head: ObjectId,
        upstream: ObjectId,
        onto: Option<ObjectId>,
    ) -> Result<RebaseHandle<S>, MergeError> {
        let commits = graph::commits_to_replay(self.store(), upstream, head)?;
        info!(
            head = %head.short(),
            upstream = %upstream.short(),
            count = commits.len(),
            "rebasing branch"
        );
        self.rebase(commits, onto.unwrap_or(upstream))
    }

    /// Apply `commit`'s change to `onto`'s tree without creating a commit.
    ///
    /// # Errors
    /// [`MergeError::GraphCorruption`] if either commit cannot be loaded.
    #[instrument(
        level = "debug",
        skip(self),
        fields(commit = %commit.short(), onto = %onto.short())
    )]
    pub fn cherry_pick(&self, commit: ObjectId, onto: ObjectId) -> Result<MergeResult, MergeError> {
        let picked = graph::load_commit(self.store(), commit)?;
        let target = graph::load_commit(self.store(), onto)?;
        let base = match picked.first_parent() {
            Some(parent) => graph::load_commit(self.store(), parent)?.tree(),
            None => self.store().write_tree(Tree::new())?,
        };
        let mut result = self.merge_trees(base, target.tree(), picked.tree())?;
        result.fast_forwarded = false;
        Ok(result)
    }

    /// Cherry-pick as a one-commit replay that produces a commit.
    ///
    /// # Errors
    /// [`MergeError::GraphCorruption`] if either commit cannot be loaded.
    pub fn start_cherry_pick(
        &self,
        commit: ObjectId,
        onto: ObjectId,
    ) -> Result<RebaseHandle<S>, MergeError> {
        self.rebase(vec![commit], onto)
    }

    /// Continue a replay saved with [`RebaseHandle::save`].
    ///
    /// # Errors
    /// [`MergeError::State`] if the file is missing or inconsistent.
    pub fn resume_rebase(&self, path: &Path) -> Result<RebaseHandle<S>, MergeError> {
        let state = RebaseState::load(path)?;
        RebaseHandle::resume(self.clone(), state, path)
    }
}
