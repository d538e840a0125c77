//! Rename detection over a flattened diff.
//!
//! Runs after [`diff_trees`](super::diff_trees), never inside the merger.
//! Removed files are paired with added files:
//!
//! 1. **Exact**: identical blob ids, score 100.
//! 2. **Similar**: line similarity at or above the threshold, scored as a
//!    percentage with [`similar`]'s line diff ratio. Binary files only pair
//!    exactly.
//!
//! # Determinism
//!
//! All candidate pairs are scored, then taken greedily in order of
//! (score descending, source path, destination path). Each path appears in at
//! most one rename.

use std::collections::BTreeSet;

use braid_store::ContentStore;
use similar::{Algorithm, TextDiff};
use tracing::debug;

use super::tree::{Change, FileChange};
use crate::error::MergeError;
use crate::merge::text::is_binary;
use crate::model::RepoPath;

/// A removed path paired with an added path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rename {
    pub from: RepoPath,
    pub to: RepoPath,
    /// Similarity percentage, 100 for identical content.
    pub score: u8,
}

/// Output of the rename pass: detected renames plus every change that was
/// not part of one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub renames: Vec<Rename>,
    pub remaining: Vec<FileChange>,
}

/// Pair removals with additions in `changes`.
///
/// # Errors
/// Returns [`MergeError::GraphCorruption`] if a blob cannot be loaded.
pub fn detect_renames<S: ContentStore + ?Sized>(
    store: &S,
    changes: Vec<FileChange>,
    threshold: u8,
) -> Result<RenameReport, MergeError> {
    let removed: Vec<&FileChange> = changes
        .iter()
        .filter(|c| matches!(c.change, Change::Removed(_)))
        .collect();
    let added: Vec<&FileChange> = changes
        .iter()
        .filter(|c| matches!(c.change, Change::Added(_)))
        .collect();

    let mut scored: Vec<(u8, &RepoPath, &RepoPath)> = Vec::new();
    let mut contents: Vec<Option<Vec<u8>>> = vec![None; added.len()];
    for from in &removed {
        let Change::Removed(old) = from.change else {
            continue;
        };
        let mut old_bytes: Option<Vec<u8>> = None;
        for (i, to) in added.iter().enumerate() {
            let Change::Added(new) = to.change else {
                continue;
            };
            let score = if old.id == new.id {
                100
            } else {
                if threshold == 100 {
                    continue;
                }
                if old_bytes.is_none() {
                    old_bytes = Some(store.read_blob(old.id)?);
                }
                if contents[i].is_none() {
                    contents[i] = Some(store.read_blob(new.id)?);
                }
                match (&old_bytes, &contents[i]) {
                    (Some(a), Some(b)) => similarity(a, b),
                    _ => 0,
                }
            };
            if score >= threshold {
                scored.push((score, &from.path, &to.path));
            }
        }
    }

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)).then_with(|| a.2.cmp(b.2)));

    let mut used_from: BTreeSet<&RepoPath> = BTreeSet::new();
    let mut used_to: BTreeSet<&RepoPath> = BTreeSet::new();
    let mut renames = Vec::new();
    for (score, from, to) in scored {
        if used_from.contains(from) || used_to.contains(to) {
            continue;
        }
        used_from.insert(from);
        used_to.insert(to);
        debug!(%from, %to, score, "rename detected");
        renames.push(Rename {
            from: from.clone(),
            to: to.clone(),
            score,
        });
    }
    renames.sort_by(|a, b| a.from.cmp(&b.from));

    let remaining = changes
        .iter()
        .filter(|c| !used_from.contains(&c.path) && !used_to.contains(&c.path))
        .cloned()
        .collect();

    Ok(RenameReport { renames, remaining })
}

/// Line similarity of two blobs as a percentage. Binary content scores 0.
#[must_use]
pub fn similarity(old: &[u8], new: &[u8]) -> u8 {
    if is_binary(old) || is_binary(new) {
        return 0;
    }
    let old = String::from_utf8_lossy(old);
    let new = String::from_utf8_lossy(new);
    let ratio = TextDiff::configure()
        .algorithm(Algorithm::Lcs)
        .diff_lines(&*old, &*new)
        .ratio();
    // ratio is in 0.0..=1.0
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = (f64::from(ratio) * 100.0).round() as u8;
    pct.min(100)
}

#[cfg(test)]
mod tests {
    use braid_store::MemoryStore;

    use super::*;
    use crate::diff::diff_trees;
    use crate::test_support::build_tree;

    #[test]
    fn exact_rename_scores_100() {
        let store = MemoryStore::new();
        let base = build_tree(&store, &[("old.txt", "same\ncontent\n")]);
        let other = build_tree(&store, &[("new.txt", "same\ncontent\n")]);
        let changes = diff_trees(&store, base, other).unwrap().flatten();
        let report = detect_renames(&store, changes, 50).unwrap();
        assert_eq!(
            report.renames,
            vec![Rename {
                from: RepoPath::from("old.txt"),
                to: RepoPath::from("new.txt"),
                score: 100,
            }]
        );
        assert!(report.remaining.is_empty());
    }

    #[test]
    fn similar_rename_above_threshold() {
        let store = MemoryStore::new();
        let base = build_tree(&store, &[("a.rs", "1\n2\n3\n4\n5\n6\n7\n8\n9\n10\n")]);
        let other = build_tree(&store, &[("b.rs", "1\n2\n3\n4\n5\n6\n7\n8\n9\nten\n")]);
        let changes = diff_trees(&store, base, other).unwrap().flatten();
        let report = detect_renames(&store, changes, 50).unwrap();
        assert_eq!(report.renames.len(), 1);
        assert!(report.renames[0].score >= 80, "score {}", report.renames[0].score);
    }

    #[test]
    fn dissimilar_files_are_not_paired() {
        let store = MemoryStore::new();
        let base = build_tree(&store, &[("a", "alpha\nbeta\ngamma\n")]);
        let other = build_tree(&store, &[("b", "one\ntwo\nthree\n")]);
        let changes = diff_trees(&store, base, other).unwrap().flatten();
        let report = detect_renames(&store, changes, 50).unwrap();
        assert!(report.renames.is_empty());
        assert_eq!(report.remaining.len(), 2);
    }

    #[test]
    fn each_path_pairs_once_best_score_first() {
        let store = MemoryStore::new();
        let base = build_tree(&store, &[("src", "x\ny\nz\n")]);
        let other = build_tree(&store, &[("copy1", "x\ny\nz\n"), ("copy2", "x\ny\nz\n")]);
        let changes = diff_trees(&store, base, other).unwrap().flatten();
        let report = detect_renames(&store, changes, 50).unwrap();
        assert_eq!(report.renames.len(), 1);
        assert_eq!(report.renames[0].to, RepoPath::from("copy1"));
        assert_eq!(report.remaining.len(), 1);
        assert_eq!(report.remaining[0].path, RepoPath::from("copy2"));
    }

    #[test]
    fn binary_similarity_is_zero() {
        assert_eq!(similarity(b"a\0b", b"a\0c"), 0);
        assert_eq!(similarity(b"same\n", b"same\n"), 100);
    }
}
