//! Property tests for the merge engine.
//!
//! Trees are generated from a small pool of paths and line vocabularies so
//! that random triples overlap often enough to exercise every per-path rule.
//!
//! - **Determinism**: merging the same triple twice yields the same result.
//! - **Idempotence**: `merge(x, x, x)` is `x` with no conflicts.
//! - **Fast-forward**: `merge(a, a, b)` is `b`, fast-forwarded, clean.
//! - **Symmetry**: clean merges give the same tree with sides swapped.
//! - **Minimality**: a path changed identically on both sides never
//!   conflicts.
//! - **Sequential agreement**: the rayon and sequential paths agree.

#![allow(clippy::all, clippy::pedantic, clippy::nursery)]

use std::collections::BTreeMap;

use braid_store::{MemoryStore, ObjectId};
use proptest::prelude::*;

use super::text::merge_text;
use super::{MergeOptions, Markers, Merger};
use crate::test_support::build_tree;

const PATHS: &[&str] = &["a", "b", "d/x", "d/y", "d/e/z", "e"];

fn arb_content() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!["1", "2", "3", "4", "x", "y"]), 0..6)
        .prop_map(|lines| lines.iter().map(|l| format!("{l}\n")).collect())
}

fn arb_files() -> impl Strategy<Value = BTreeMap<&'static str, String>> {
    prop::collection::btree_map(prop::sample::select(PATHS.to_vec()), arb_content(), 0..PATHS.len())
}

fn store_tree(store: &MemoryStore, files: &BTreeMap<&'static str, String>) -> ObjectId {
    let pairs: Vec<(&str, &str)> = files.iter().map(|(p, c)| (*p, c.as_str())).collect();
    build_tree(store, &pairs)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_determinism(b in arb_files(), o in arb_files(), t in arb_files()) {
        let store = MemoryStore::new();
        let (b, o, t) = (store_tree(&store, &b), store_tree(&store, &o), store_tree(&store, &t));
        let options = MergeOptions::default();
        let merger = Merger::new(&store, &options);
        let first = merger.merge_trees(b, o, t).unwrap();
        let second = merger.merge_trees(b, o, t).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_idempotence(x in arb_files()) {
        let store = MemoryStore::new();
        let x = store_tree(&store, &x);
        let options = MergeOptions::default();
        let result = Merger::new(&store, &options).merge_trees(x, x, x).unwrap();
        prop_assert_eq!(result.tree, x);
        prop_assert!(result.is_clean());
    }

    #[test]
    fn prop_fast_forward(a in arb_files(), b in arb_files()) {
        let store = MemoryStore::new();
        let (a, b) = (store_tree(&store, &a), store_tree(&store, &b));
        let options = MergeOptions::default();
        let result = Merger::new(&store, &options).merge_trees(a, a, b).unwrap();
        prop_assert_eq!(result.tree, b);
        prop_assert!(result.is_clean());
        prop_assert_eq!(result.fast_forwarded, a != b);
    }

    #[test]
    fn prop_clean_merges_are_symmetric(b in arb_files(), o in arb_files(), t in arb_files()) {
        let store = MemoryStore::new();
        let (b, o, t) = (store_tree(&store, &b), store_tree(&store, &o), store_tree(&store, &t));
        let options = MergeOptions::default();
        let merger = Merger::new(&store, &options);
        let forward = merger.merge_trees(b, o, t).unwrap();
        let backward = merger.merge_trees(b, t, o).unwrap();
        if forward.is_clean() && backward.is_clean() {
            prop_assert_eq!(forward.tree, backward.tree);
        }
    }

    #[test]
    fn prop_identical_change_never_conflicts(
        base in arb_files(),
        ours in arb_files(),
        theirs in arb_files(),
        path in prop::sample::select(PATHS.to_vec()),
        shared in arb_content(),
    ) {
        let mut ours = ours;
        let mut theirs = theirs;
        ours.insert(path, shared.clone());
        theirs.insert(path, shared);
        let store = MemoryStore::new();
        let (b, o, t) = (
            store_tree(&store, &base),
            store_tree(&store, &ours),
            store_tree(&store, &theirs),
        );
        let options = MergeOptions::default();
        let result = Merger::new(&store, &options).merge_trees(b, o, t).unwrap();
        let conflicted: Vec<String> = result.conflicts.iter().map(|c| c.path.to_string()).collect();
        prop_assert!(!conflicted.iter().any(|p| p == path), "conflict at {path}: {conflicted:?}");
    }

    #[test]
    fn prop_parallel_matches_sequential(b in arb_files(), o in arb_files(), t in arb_files()) {
        let store = MemoryStore::new();
        let (b, o, t) = (store_tree(&store, &b), store_tree(&store, &o), store_tree(&store, &t));
        let parallel = MergeOptions::default();
        let sequential = MergeOptions { parallel: false, ..MergeOptions::default() };
        let p = Merger::new(&store, &parallel).merge_trees(b, o, t).unwrap();
        let s = Merger::new(&store, &sequential).merge_trees(b, o, t).unwrap();
        prop_assert_eq!(p, s);
    }

    #[test]
    fn prop_text_merge_with_one_side_unchanged(base in arb_content(), side in arb_content()) {
        let markers = Markers::default();
        let m = merge_text(base.as_bytes(), base.as_bytes(), side.as_bytes(), &markers);
        prop_assert!(m.is_clean());
        prop_assert_eq!(m.merged, side.into_bytes());
    }
}
