//! Ancestry resolution: merge bases and fast-forward checks.
//!
//! # Algorithm
//!
//! [`merge_bases`] paints the graph backward from both tips, breadth first.
//! Each commit carries a set of flags: reached from `ours`, reached from
//! `theirs`, and stale. A commit that ends up with both side flags is a
//! candidate common ancestor; it is marked stale, and stale propagates to
//! everything behind it, so nothing older than a candidate can become one.
//! The walk stops as soon as every queued commit is stale; a running count
//! of non-stale queue entries makes that check constant time.
//!
//! Both histories are checked for cycles first, so the paint walk itself
//! can assume a DAG.
//!
//! Breadth-first order does not guarantee that a candidate is found before
//! one of its own ancestors, so a final pass drops every candidate that is
//! an ancestor of another candidate. What remains is the set of lowest
//! common ancestors, of which criss-cross histories have more than one.
//!
//! # Determinism
//!
//! Results are returned as a [`BTreeSet`] so callers iterate them in id
//! order regardless of traversal order.

use std::collections::{BTreeSet, HashMap, VecDeque};

use braid_store::{CommitGraph, ObjectId};
use tracing::{debug, instrument};

use crate::error::MergeError;
use crate::graph;

const FROM_OURS: u8 = 0b001;
const FROM_THEIRS: u8 = 0b010;
const STALE: u8 = 0b100;
const BOTH: u8 = FROM_OURS | FROM_THEIRS;

/// All lowest common ancestors of `ours` and `theirs`.
///
/// A commit is its own ancestor, so `merge_bases(a, a) == {a}` and if `a`
/// is an ancestor of `b` the result is `{a}`.
///
/// # Errors
/// - [`MergeError::UnrelatedHistories`] if the commits share no ancestor.
/// - [`MergeError::GraphCorruption`] on a dangling parent, or a cycle
///   anywhere behind either tip.
#[instrument(level = "debug", skip(graph), fields(ours = %ours.short(), theirs = %theirs.short()))]
pub fn merge_bases<G: CommitGraph + ?Sized>(
    graph: &G,
    ours: ObjectId,
    theirs: ObjectId,
) -> Result<BTreeSet<ObjectId>, MergeError> {
    if ours == theirs {
        return Ok(BTreeSet::from([ours]));
    }

    graph::verify_acyclic(graph, ours)?;
    graph::verify_acyclic(graph, theirs)?;

    let mut flags: HashMap<ObjectId, u8> =
        HashMap::from([(ours, FROM_OURS), (theirs, FROM_THEIRS)]);
    let mut queue: VecDeque<ObjectId> = VecDeque::from([ours, theirs]);
    // Queue entries per commit, and how many entries are not stale.
    let mut queued: HashMap<ObjectId, usize> = HashMap::from([(ours, 1), (theirs, 1)]);
    let mut active = 2usize;
    let mut candidates: Vec<ObjectId> = Vec::new();

    while active > 0 {
        let Some(id) = queue.pop_front() else { break };
        let mut f = flags.get(&id).copied().unwrap_or_default();
        let pending = queued.entry(id).or_default();
        *pending = pending.saturating_sub(1);
        if f & STALE == 0 {
            active = active.saturating_sub(1);
        }

        if f & STALE == 0 && f & BOTH == BOTH {
            candidates.push(id);
            f |= STALE;
            flags.insert(id, f);
            active = active.saturating_sub(queued.get(&id).copied().unwrap_or_default());
        }

        for parent in graph::parents(graph, id)? {
            let old = flags.get(&parent).copied().unwrap_or_default();
            let new = old | f;
            if new != old {
                let pending = queued.entry(parent).or_default();
                if old & STALE == 0 && new & STALE != 0 {
                    active = active.saturating_sub(*pending);
                }
                *pending += 1;
                if new & STALE == 0 {
                    active += 1;
                }
                flags.insert(parent, new);
                queue.push_back(parent);
            }
        }
    }

    if candidates.is_empty() {
        return Err(MergeError::UnrelatedHistories { ours, theirs });
    }

    let bases = prune_dominated(graph, candidates)?;
    debug!(count = bases.len(), "merge bases resolved");
    Ok(bases)
}

/// Drop candidates that are ancestors of another candidate.
fn prune_dominated<G: CommitGraph + ?Sized>(
    graph: &G,
    candidates: Vec<ObjectId>,
) -> Result<BTreeSet<ObjectId>, MergeError> {
    let unique: BTreeSet<ObjectId> = candidates.into_iter().collect();
    if unique.len() == 1 {
        return Ok(unique);
    }
    let mut kept = BTreeSet::new();
    for &candidate in &unique {
        let mut dominated = false;
        for &other in &unique {
            if other != candidate && is_ancestor(graph, candidate, other)? {
                dominated = true;
                break;
            }
        }
        if !dominated {
            kept.insert(candidate);
        }
    }
    Ok(kept)
}

/// Whether `ancestor` is reachable from `descendant` through parent links.
///
/// Every commit is its own ancestor.
///
/// # Errors
/// Returns [`MergeError::GraphCorruption`] on a dangling parent or a cycle
/// among the commits walked. A `false` answer walks all of `descendant`'s
/// history.
pub fn is_ancestor<G: CommitGraph + ?Sized>(
    graph: &G,
    ancestor: ObjectId,
    descendant: ObjectId,
) -> Result<bool, MergeError> {
    if ancestor == descendant {
        return Ok(true);
    }
    graph::reaches(graph, descendant, ancestor)
}

/// Whether moving a ref from `from` to `to` is a fast-forward, i.e. `from`
/// is an ancestor of `to`.
///
/// # Errors
/// Same as [`is_ancestor`].
pub fn is_fast_forward<G: CommitGraph + ?Sized>(
    graph: &G,
    from: ObjectId,
    to: ObjectId,
) -> Result<bool, MergeError> {
    is_ancestor(graph, from, to)
}
