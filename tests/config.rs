//! Loading `braid.toml` from disk and its effect on merges.

mod common;

use std::fs;

use braid::BraidConfig;
use braid::config::{ConflictStyle, Favor};
use common::TestRepo;
use tempfile::TempDir;

#[test]
fn missing_file_means_defaults() {
    let dir = TempDir::new().unwrap();
    let config = BraidConfig::load(&dir.path().join("braid.toml")).unwrap();
    assert_eq!(config, BraidConfig::default());
}

#[test]
fn file_settings_are_loaded() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("braid.toml");
    fs::write(
        &path,
        r#"
[merge]
conflict_style = "diff3"
marker_size = 9
favor = "theirs"

[merge.labels]
ours = "HEAD"

[replay]
keep_empty = true
"#,
    )
    .unwrap();

    let config = BraidConfig::load(&path).unwrap();
    assert_eq!(config.merge.conflict_style, ConflictStyle::Diff3);
    assert_eq!(config.merge.marker_size, 9);
    assert_eq!(config.merge.favor, Favor::Theirs);
    assert_eq!(config.merge.labels.ours, "HEAD");
    assert_eq!(config.merge.labels.theirs, "theirs");
    assert!(config.replay.keep_empty);
    assert!(!config.rename.enabled);
}

#[test]
fn error_names_the_file_and_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("braid.toml");
    fs::write(&path, "[merge]\nmarker_size = 7\nbogus = 1\n").unwrap();
    let err = BraidConfig::load(&path).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("braid.toml"), "{msg}");
    assert!(msg.contains("line 3"), "{msg}");
}

#[test]
fn labels_and_marker_size_shape_conflict_text() {
    let config = BraidConfig::parse(
        r#"
[merge]
marker_size = 4

[merge.labels]
ours = "main"
theirs = "topic"
"#,
    )
    .unwrap();
    let repo = TestRepo::with_config(config);
    let base = repo.tree(&[("f", "x\n")]);
    let ours = repo.tree(&[("f", "y\n")]);
    let theirs = repo.tree(&[("f", "z\n")]);
    let result = repo.engine.merge_trees(base, ours, theirs).unwrap();
    assert_eq!(
        repo.read(result.tree, "f").as_deref(),
        Some("<<<< main\ny\n====\nz\n>>>> topic\n")
    );
}

#[test]
fn favor_ours_resolves_every_conflict_toward_ours() {
    let config = BraidConfig::parse("[merge]\nfavor = \"ours\"\n").unwrap();
    let repo = TestRepo::with_config(config);
    let base = repo.tree(&[("f", "1\n2\n3\n"), ("gone", "g\n")]);
    let ours = repo.tree(&[("f", "1\nA\n3\n")]);
    let theirs = repo.tree(&[("f", "1\nB\n3\n"), ("gone", "changed\n")]);
    let result = repo.engine.merge_trees(base, ours, theirs).unwrap();
    assert!(result.is_clean());
    assert_eq!(repo.files(result.tree), vec!["f"]);
    assert_eq!(repo.read(result.tree, "f").as_deref(), Some("1\nA\n3\n"));
}

#[test]
fn custom_alternate_suffix() {
    let config = BraidConfig::parse("[merge]\nalternate_suffix = \".\"\n").unwrap();
    let repo = TestRepo::with_config(config);
    let base = repo.tree(&[("doc", "v1\n")]);
    let ours = repo.tree(&[("doc", "v2\n")]);
    let theirs = repo.tree(&[("other", "o\n")]);
    let result = repo.engine.merge_trees(base, ours, theirs).unwrap();
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(repo.files(result.tree), vec!["doc.ours", "other"]);
}
