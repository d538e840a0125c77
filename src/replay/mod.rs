//! History replay: rebase and cherry-pick.
//!
//! A [`RebaseHandle`] drives a [`RebaseState`] through its phases. Each
//! replayed commit `c` is merged as `(parent(c).tree, head.tree, c.tree)`:
//! the commit's own change is "theirs" and the history built so far is
//! "ours". A clean merge is committed on top of the head with `c`'s
//! metadata. A conflicted merge suspends the replay until the caller
//! resolves, skips, or aborts.
//!
//! Nothing outside the store is mutated. Aborting leaves the new commits
//! unreachable; the caller's refs never moved.

pub mod state;

use std::path::Path;

use braid_store::{Commit, CommitGraph, ContentStore, ObjectId, Tree};
use tracing::{debug, info, instrument, warn};

use crate::engine::Engine;
use crate::error::MergeError;
use crate::graph;
use crate::merge::Merger;
use crate::model::Conflict;

pub use state::{RebaseState, ReplayPhase, RewrittenCommit};

/// What a replay looks like from the outside.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayStatus {
    /// Commits left to apply, oldest first.
    Pending { remaining: Vec<ObjectId> },
    /// A commit is being applied.
    Applying { current: ObjectId },
    /// `current` conflicted. `tree` is the merged tree with conflict markers.
    Conflicted {
        current: ObjectId,
        conflicts: Vec<Conflict>,
        tree: ObjectId,
    },
    /// All commits replayed; `head` is the new tip.
    Completed { head: ObjectId },
    Aborted,
}

impl ReplayStatus {
    #[must_use]
    pub const fn is_conflicted(&self) -> bool {
        matches!(self, Self::Conflicted { .. })
    }
}

/// A rebase or cherry-pick in progress.
pub struct RebaseHandle<S> {
    engine: Engine<S>,
    state: RebaseState,
    conflicts: Vec<Conflict>,
}

impl<S> std::fmt::Debug for RebaseHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RebaseHandle")
            .field("state", &self.state)
            .field("conflicts", &self.conflicts.len())
            .finish_non_exhaustive()
    }
}

impl<S: ContentStore + CommitGraph> RebaseHandle<S> {
    pub(crate) const fn new(engine: Engine<S>, state: RebaseState) -> Self {
        Self {
            engine,
            state,
            conflicts: Vec::new(),
        }
    }

    /// Rebuild a handle from state saved at `origin`.
    ///
    /// A state saved mid-apply is rewound so the commit is applied again. A
    /// conflicted state has its conflicts recomputed; merges are
    /// deterministic, so they match the ones seen before saving.
    ///
    /// # Errors
    /// - [`MergeError::State`] if the state is internally inconsistent.
    /// - [`MergeError::GraphCorruption`] if its commits cannot be loaded.
    pub(crate) fn resume(
        engine: Engine<S>,
        mut state: RebaseState,
        origin: &Path,
    ) -> Result<Self, MergeError> {
        let inconsistent = |message: &str| MergeError::State {
            path: origin.to_owned(),
            message: message.to_owned(),
        };
        match state.phase {
            ReplayPhase::Applying => {
                let current = state
                    .current
                    .take()
                    .ok_or_else(|| inconsistent("applying without a current commit"))?;
                state.remaining.insert(0, current);
                state.conflicted_tree = None;
                state.advance(ReplayPhase::Pending, "resume")?;
            }
            ReplayPhase::Conflicted if state.current.is_none() => {
                return Err(inconsistent("conflicted without a current commit"));
            }
            _ => {}
        }

        let mut handle = Self::new(engine, state);
        if let (ReplayPhase::Conflicted, Some(current)) =
            (handle.state.phase, handle.state.current)
        {
            let (tree, conflicts) = handle.merge_onto_head(current)?;
            handle.state.conflicted_tree = Some(tree);
            handle.conflicts = conflicts;
        }
        Ok(handle)
    }

    #[must_use]
    pub fn status(&self) -> ReplayStatus {
        let state = &self.state;
        match (state.phase, state.current, state.conflicted_tree) {
            (ReplayPhase::Conflicted, Some(current), Some(tree)) => ReplayStatus::Conflicted {
                current,
                conflicts: self.conflicts.clone(),
                tree,
            },
            (ReplayPhase::Applying | ReplayPhase::Conflicted, Some(current), _) => {
                ReplayStatus::Applying { current }
            }
            (ReplayPhase::Completed, ..) => ReplayStatus::Completed { head: state.head },
            (ReplayPhase::Aborted, ..) => ReplayStatus::Aborted,
            _ => ReplayStatus::Pending {
                remaining: state.remaining.clone(),
            },
        }
    }

    #[must_use]
    pub const fn state(&self) -> &RebaseState {
        &self.state
    }

    #[must_use]
    pub const fn phase(&self) -> ReplayPhase {
        self.state.phase
    }

    /// The tip of the replayed history so far.
    #[must_use]
    pub const fn head(&self) -> ObjectId {
        self.state.head
    }

    /// Conflicts of the suspended commit; empty unless conflicted.
    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Original commits paired with their replacements, in replay order.
    #[must_use]
    pub fn rewritten(&self) -> &[RewrittenCommit] {
        &self.state.rewritten
    }

    /// Apply the next pending commit.
    ///
    /// # Errors
    /// - [`MergeError::InvalidTransition`] unless the replay is pending.
    /// - [`MergeError::GraphCorruption`] if history is inconsistent; the
    ///   replay is aborted first.
    pub fn step(&mut self) -> Result<ReplayStatus, MergeError> {
        if self.state.phase != ReplayPhase::Pending {
            return Err(self.invalid("step"));
        }
        if self.state.remaining.is_empty() {
            self.state.advance(ReplayPhase::Completed, "step")?;
            return Ok(self.status());
        }
        let next = self.state.remaining.remove(0);
        self.state.current = Some(next);
        self.state.advance(ReplayPhase::Applying, "step")?;

        if let Err(e) = self.apply(next) {
            warn!(commit = %next.short(), error = %e, "replay failed, aborting");
            self.state.phase = ReplayPhase::Aborted;
            return Err(e);
        }
        Ok(self.status())
    }

    /// Apply pending commits until the replay completes or a commit
    /// conflicts. A completed replay is returned unchanged.
    ///
    /// # Errors
    /// - [`MergeError::InvalidTransition`] when conflicted or aborted.
    /// - [`MergeError::GraphCorruption`] as for [`step`](Self::step).
    #[instrument(level = "debug", skip(self), fields(remaining = self.state.remaining.len()))]
    pub fn continue_(&mut self) -> Result<ReplayStatus, MergeError> {
        match self.state.phase {
            ReplayPhase::Completed => return Ok(self.status()),
            ReplayPhase::Pending => {}
            _ => return Err(self.invalid("continue")),
        }
        while self.state.phase == ReplayPhase::Pending {
            self.step()?;
        }
        Ok(self.status())
    }

    /// Commit `tree` in place of the conflicted merge and move past the
    /// suspended commit. Call [`continue_`](Self::continue_) to replay the
    /// rest.
    ///
    /// # Errors
    /// - [`MergeError::InvalidTransition`] unless the replay is conflicted.
    /// - [`MergeError::GraphCorruption`] if `tree` is not a stored tree.
    #[instrument(level = "debug", skip(self), fields(tree = %tree.short()))]
    pub fn resolve(&mut self, tree: ObjectId) -> Result<ReplayStatus, MergeError> {
        let current = self.suspended("resolve")?;
        self.engine.store().read_tree(tree)?;
        self.state.advance(ReplayPhase::Applying, "resolve")?;
        let commit = graph::load_commit(self.engine.store(), current)?;
        self.commit_current(&commit, tree)?;
        Ok(self.status())
    }

    /// Drop the conflicted commit and move on.
    ///
    /// # Errors
    /// [`MergeError::InvalidTransition`] unless the replay is conflicted.
    pub fn skip(&mut self) -> Result<ReplayStatus, MergeError> {
        let current = self.suspended("skip")?;
        self.state.advance(ReplayPhase::Applying, "skip")?;
        info!(commit = %current.short(), "skipping commit");
        self.record(current, None)?;
        Ok(self.status())
    }

    /// Abandon the replay. Aborting twice is a no-op.
    ///
    /// # Errors
    /// [`MergeError::InvalidTransition`] if the replay already completed.
    pub fn abort(&mut self) -> Result<ReplayStatus, MergeError> {
        if self.state.phase == ReplayPhase::Aborted {
            return Ok(ReplayStatus::Aborted);
        }
        self.state.advance(ReplayPhase::Aborted, "abort")?;
        info!(onto = %self.state.onto.short(), "replay aborted");
        self.state.current = None;
        self.state.conflicted_tree = None;
        self.conflicts.clear();
        Ok(ReplayStatus::Aborted)
    }

    /// Persist the state for [`Engine::resume_rebase`].
    ///
    /// # Errors
    /// Returns [`MergeError::State`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), MergeError> {
        self.state.save(path)
    }

    fn apply(&mut self, id: ObjectId) -> Result<(), MergeError> {
        let commit = graph::load_commit(self.engine.store(), id)?;
        let (tree, conflicts) = self.merge_onto_head(id)?;
        if conflicts.is_empty() {
            return self.commit_current(&commit, tree);
        }
        warn!(commit = %id.short(), count = conflicts.len(), "replay stopped on conflicts");
        self.state.conflicted_tree = Some(tree);
        self.conflicts = conflicts;
        self.state.advance(ReplayPhase::Conflicted, "apply")
    }

    /// Merge commit `id`'s change onto the current head.
    fn merge_onto_head(&self, id: ObjectId) -> Result<(ObjectId, Vec<Conflict>), MergeError> {
        let store = self.engine.store();
        let commit = graph::load_commit(store, id)?;
        if commit.is_merge() {
            debug!(commit = %id.short(), "replaying merge commit against its first parent");
        }
        let base = match commit.first_parent() {
            Some(parent) => graph::load_commit(store, parent)?.tree(),
            None => store.write_tree(Tree::new())?,
        };
        let head = graph::load_commit(store, self.state.head)?.tree();
        let options = self.engine.merge_options();
        let result = Merger::new(store, &options).merge_trees(base, head, commit.tree())?;
        Ok((result.tree, result.conflicts))
    }

    fn commit_current(&mut self, original: &Commit, tree: ObjectId) -> Result<(), MergeError> {
        let store = self.engine.store();
        let head_tree = graph::load_commit(store, self.state.head)?.tree();
        if tree == head_tree && !self.engine.config().replay.keep_empty {
            debug!(commit = %original.id().short(), "dropping commit that became empty");
            return self.record(original.id(), None);
        }
        let replayed = Commit::new(vec![self.state.head], tree, original.meta().clone());
        let id = store.put_commit(replayed)?;
        debug!(original = %original.id().short(), replayed = %id.short(), "commit replayed");
        self.state.head = id;
        self.record(original.id(), Some(id))
    }

    /// Close out the current commit and settle into the next phase.
    fn record(&mut self, original: ObjectId, replayed: Option<ObjectId>) -> Result<(), MergeError> {
        self.state.rewritten.push(RewrittenCommit { original, replayed });
        self.state.current = None;
        self.state.conflicted_tree = None;
        self.conflicts.clear();
        if self.state.remaining.is_empty() {
            info!(head = %self.state.head.short(), "replay completed");
            self.state.advance(ReplayPhase::Completed, "finish")
        } else {
            self.state.advance(ReplayPhase::Pending, "finish")
        }
    }

    fn suspended(&self, action: &'static str) -> Result<ObjectId, MergeError> {
        match (self.state.phase, self.state.current) {
            (ReplayPhase::Conflicted, Some(current)) => Ok(current),
            _ => Err(self.invalid(action)),
        }
    }

    fn invalid(&self, action: &'static str) -> MergeError {
        MergeError::InvalidTransition {
            state: self.state.phase.to_string(),
            action,
        }
    }
}
