//! Commit graph traversal helpers.
//!
//! All walks are iterative with explicit visited sets keyed by commit id, so
//! deep histories cannot overflow the stack and shared ancestors are visited
//! once.

use std::collections::{HashMap, HashSet, VecDeque};

use braid_store::{Commit, CommitGraph, ObjectId};
use tracing::debug;

use crate::error::{Corruption, MergeError};

/// Fetch a commit, treating a missing commit as a dangling reference.
///
/// # Errors
/// Returns [`MergeError::GraphCorruption`] if the commit is not stored.
pub fn load_commit<G: CommitGraph + ?Sized>(graph: &G, id: ObjectId) -> Result<Commit, MergeError> {
    Ok(graph.get_commit(id)?)
}

/// Parents of a commit, treating a missing commit as a dangling reference.
///
/// # Errors
/// Returns [`MergeError::GraphCorruption`] if the commit is not stored.
pub fn parents<G: CommitGraph + ?Sized>(
    graph: &G,
    id: ObjectId,
) -> Result<Vec<ObjectId>, MergeError> {
    Ok(graph.parents(id)?)
}

/// Every commit reachable from `tip`, `tip` included.
///
/// # Errors
/// Returns [`MergeError::GraphCorruption`] on a dangling parent.
pub fn reachable<G: CommitGraph + ?Sized>(
    graph: &G,
    tip: ObjectId,
) -> Result<HashSet<ObjectId>, MergeError> {
    let mut seen = HashSet::from([tip]);
    let mut queue = VecDeque::from([tip]);
    while let Some(id) = queue.pop_front() {
        for parent in parents(graph, id)? {
            if seen.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    Ok(seen)
}

/// Check that no commit reachable from `tip` is its own ancestor.
///
/// # Errors
/// Returns [`Corruption::Cycle`] naming a commit on the cycle, or
/// [`Corruption::DanglingObject`] on a missing parent.
pub fn verify_acyclic<G: CommitGraph + ?Sized>(graph: &G, tip: ObjectId) -> Result<(), MergeError> {
    search(graph, tip, None).map(drop)
}

/// Whether `target` is reachable from `tip` through parent links, `tip`
/// excluded.
///
/// Every commit visited is checked for cycles, so a `false` answer also
/// means the whole history behind `tip` is acyclic.
///
/// # Errors
/// Same as [`verify_acyclic`].
pub fn reaches<G: CommitGraph + ?Sized>(
    graph: &G,
    tip: ObjectId,
    target: ObjectId,
) -> Result<bool, MergeError> {
    search(graph, tip, Some(target))
}

/// Three-colour depth-first search with an explicit stack: reaching a
/// commit that is still on the current path means a cycle. Stops early when
/// `target` is found.
fn search<G: CommitGraph + ?Sized>(
    graph: &G,
    tip: ObjectId,
    target: Option<ObjectId>,
) -> Result<bool, MergeError> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        OnPath,
        Done,
    }

    let mut marks: HashMap<ObjectId, Mark> = HashMap::new();
    let mut stack: Vec<(ObjectId, Vec<ObjectId>, usize)> = Vec::new();
    marks.insert(tip, Mark::OnPath);
    stack.push((tip, parents(graph, tip)?, 0));

    while let Some((id, ps, next)) = stack.last_mut() {
        if let Some(&parent) = ps.get(*next) {
            *next += 1;
            match marks.get(&parent).copied() {
                Some(Mark::OnPath) => {
                    debug!(commit = %parent, "cycle in commit graph");
                    return Err(Corruption::Cycle { id: parent }.into());
                }
                Some(Mark::Done) => {}
                None if Some(parent) == target => return Ok(true),
                None => {
                    marks.insert(parent, Mark::OnPath);
                    let grand = parents(graph, parent)?;
                    stack.push((parent, grand, 0));
                }
            }
        } else {
            marks.insert(*id, Mark::Done);
            stack.pop();
        }
    }
    Ok(false)
}

/// Commits reachable from `head` but not from `upstream`, oldest first.
///
/// Parents always precede children in the returned list. Merge commits are
/// left out: replaying linearizes history.
///
/// # Errors
/// Returns [`MergeError::GraphCorruption`] on a dangling parent or a cycle
/// anywhere behind either tip.
pub fn commits_to_replay<G: CommitGraph + ?Sized>(
    graph: &G,
    upstream: ObjectId,
    head: ObjectId,
) -> Result<Vec<ObjectId>, MergeError> {
    verify_acyclic(graph, upstream)?;
    verify_acyclic(graph, head)?;
    let excluded = reachable(graph, upstream)?;
    if excluded.contains(&head) {
        return Ok(Vec::new());
    }

    // Iterative post-order DFS: a commit is emitted once all its
    // (non-excluded) parents have been emitted.
    let mut emitted: HashSet<ObjectId> = HashSet::new();
    let mut order = Vec::new();
    let mut stack: Vec<(ObjectId, Vec<ObjectId>, usize)> = vec![(head, parents(graph, head)?, 0)];
    let mut entered: HashSet<ObjectId> = HashSet::from([head]);

    while let Some((id, ps, next)) = stack.last_mut() {
        if let Some(&parent) = ps.get(*next) {
            *next += 1;
            if !excluded.contains(&parent) && entered.insert(parent) {
                let grand = parents(graph, parent)?;
                stack.push((parent, grand, 0));
            }
        } else {
            let id = *id;
            stack.pop();
            if emitted.insert(id) {
                order.push(id);
            }
        }
    }

    let mut linear = Vec::with_capacity(order.len());
    for id in order {
        if parents(graph, id)?.len() <= 1 {
            linear.push(id);
        }
    }
    Ok(linear)
}
