//! Recursive three-way tree merge.
//!
//! Each directory level is merged over the union of entry names, in name
//! order. Every name is first classified into a [`Step`] using only entry
//! ids (no I/O); steps that need content are then executed, on the rayon
//! pool when enabled, and their outcomes are joined back in name order
//! before the directory's tree is written.
//!
//! # Per-path rules
//!
//! | ours vs theirs vs base            | result |
//! |-----------------------------------|--------|
//! | ours == theirs                    | ours (unchanged, identical change, or both deleted) |
//! | ours == base                      | theirs |
//! | theirs == base                    | ours |
//! | both directories                  | recurse |
//! | both files                        | line merge (add/add against an empty base) |
//! | changed vs deleted, file involved | modify/delete: survivor moved to `name~label` |
//! | changed vs deleted, directories   | recurse against an empty side |
//! | file vs directory                 | directory keeps the path, file moved to `name~label` |
//!
//! Merged directories with no entries are dropped from their parent.

use std::collections::BTreeSet;

use braid_store::{ContentStore, ObjectId, Tree, TreeEntry};
use rayon::prelude::*;
use tracing::{debug, trace};

use super::MergeOptions;
use super::policy::apply_favor;
use super::text::{is_binary, merge_text};
use crate::error::MergeError;
use crate::model::{Conflict, ConflictKind, Content, RepoPath, Region, Side};

/// Merged contents of one directory plus every conflict beneath it.
#[derive(Debug)]
pub struct MergedTree {
    pub tree: Tree,
    pub conflicts: Vec<Conflict>,
}

/// What to do with one name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Resolved(Option<TreeEntry>),
    Subtree {
        base: Option<ObjectId>,
        ours: Option<ObjectId>,
        theirs: Option<ObjectId>,
    },
    Content {
        base: Option<TreeEntry>,
        ours: TreeEntry,
        theirs: TreeEntry,
    },
    ModifyDelete {
        base: TreeEntry,
        survivor: TreeEntry,
        deleted_by: Side,
    },
    FileDirectory {
        base: Option<TreeEntry>,
        ours: TreeEntry,
        theirs: TreeEntry,
    },
}

impl Step {
    const fn needs_io(&self) -> bool {
        !matches!(self, Self::Resolved(_))
    }
}

/// Result of executing one step.
#[derive(Debug, Default)]
struct Outcome {
    entry: Option<TreeEntry>,
    conflicts: Vec<Conflict>,
    /// Content that must be kept at an alternate name. The conflict that
    /// refers to it is the last one in `conflicts`.
    displaced: Option<(Side, TreeEntry)>,
}

impl Outcome {
    const fn resolved(entry: Option<TreeEntry>) -> Self {
        Self {
            entry,
            conflicts: Vec::new(),
            displaced: None,
        }
    }
}

/// Merges trees held in `store`.
pub struct TreeMerger<'a, S: ContentStore + ?Sized> {
    store: &'a S,
    options: &'a MergeOptions,
}

impl<'a, S: ContentStore + ?Sized> TreeMerger<'a, S> {
    pub const fn new(store: &'a S, options: &'a MergeOptions) -> Self {
        Self { store, options }
    }

    /// Merge three root trees and write the result.
    ///
    /// Returns the merged tree id and the conflicts in path order.
    ///
    /// # Errors
    /// Returns [`MergeError::GraphCorruption`] if any reachable id is
    /// missing or of the wrong kind.
    pub fn merge_root(
        &self,
        base: ObjectId,
        ours: ObjectId,
        theirs: ObjectId,
    ) -> Result<(ObjectId, Vec<Conflict>), MergeError> {
        let merged = self.merge_dirs(&RepoPath::root(), Some(base), Some(ours), Some(theirs))?;
        let id = self.store.write_tree(merged.tree)?;
        let mut conflicts = merged.conflicts;
        // Stable: hunks of one file stay in file order.
        conflicts.sort_by(|a, b| a.path.cmp(&b.path));
        Ok((id, conflicts))
    }

    /// Merge one directory level. `None` stands for an empty directory.
    fn merge_dirs(
        &self,
        path: &RepoPath,
        base: Option<ObjectId>,
        ours: Option<ObjectId>,
        theirs: Option<ObjectId>,
    ) -> Result<MergedTree, MergeError> {
        let base = self.load(base)?;
        let ours = self.load(ours)?;
        let theirs = self.load(theirs)?;

        let names: BTreeSet<&str> = base
            .names()
            .chain(ours.names())
            .chain(theirs.names())
            .collect();

        let steps: Vec<(&str, Step)> = names
            .iter()
            .map(|&name| {
                let b = base.get(name).copied();
                let (o, t) = apply_favor(
                    self.options.favor,
                    b,
                    ours.get(name).copied(),
                    theirs.get(name).copied(),
                );
                (name, plan(b, o, t))
            })
            .collect();

        let pending = steps.iter().filter(|(_, s)| s.needs_io()).count();
        let outcomes: Vec<Outcome> = if self.options.parallel && pending > 1 {
            steps
                .par_iter()
                .map(|(name, step)| self.execute(path, name, *step))
                .collect::<Result<Vec<_>, MergeError>>()?
        } else {
            steps
                .iter()
                .map(|(name, step)| self.execute(path, name, *step))
                .collect::<Result<Vec<_>, MergeError>>()?
        };

        let mut tree = Tree::new();
        let mut conflicts = Vec::new();
        let mut displaced = Vec::new();
        for ((name, _), outcome) in steps.iter().zip(outcomes) {
            if let Some(entry) = outcome.entry {
                tree.insert(*name, entry);
            }
            let mut outcome_conflicts = outcome.conflicts;
            if let Some((side, entry)) = outcome.displaced
                && let Some(conflict) = outcome_conflicts.pop()
            {
                displaced.push((*name, side, entry, conflict));
            }
            conflicts.append(&mut outcome_conflicts);
        }

        for (name, side, entry, mut conflict) in displaced {
            let alt = self.alternate_name(name, side, &names, &tree);
            debug!(path = %path.join(name), alternate = %alt, "preserving displaced entry");
            tree.insert(alt.clone(), entry);
            conflict.alternate_path = Some(path.join(&alt));
            conflicts.push(conflict);
        }

        Ok(MergedTree { tree, conflicts })
    }

    fn load(&self, id: Option<ObjectId>) -> Result<Tree, MergeError> {
        match id {
            Some(id) => Ok(self.store.read_tree(id)?),
            None => Ok(Tree::new()),
        }
    }

    fn execute(&self, path: &RepoPath, name: &str, step: Step) -> Result<Outcome, MergeError> {
        let here = path.join(name);
        match step {
            Step::Resolved(entry) => Ok(Outcome::resolved(entry)),
            Step::Subtree { base, ours, theirs } => {
                let merged = self.merge_dirs(&here, base, ours, theirs)?;
                let entry = if merged.tree.is_empty() {
                    trace!(path = %here, "dropping empty merged directory");
                    None
                } else {
                    Some(TreeEntry::directory(self.store.write_tree(merged.tree)?))
                };
                Ok(Outcome {
                    entry,
                    conflicts: merged.conflicts,
                    displaced: None,
                })
            }
            Step::Content { base, ours, theirs } => self.merge_file(here, base, ours, theirs),
            Step::ModifyDelete {
                base,
                survivor,
                deleted_by,
            } => {
                let kept = Some(Content::Entry(survivor));
                let (ours, theirs) = match deleted_by {
                    Side::Ours => (None, kept),
                    Side::Theirs => (kept, None),
                };
                Ok(Outcome {
                    entry: None,
                    conflicts: vec![Conflict {
                        path: here,
                        kind: ConflictKind::ModifyDelete { deleted_by },
                        region: Region::WholeFile,
                        base: Some(Content::Entry(base)),
                        ours,
                        theirs,
                        alternate_path: None,
                    }],
                    displaced: Some((deleted_by.other(), survivor)),
                })
            }
            Step::FileDirectory { base, ours, theirs } => {
                let (directory_on, dir, file) = if ours.is_directory() {
                    (Side::Ours, ours, theirs)
                } else {
                    (Side::Theirs, theirs, ours)
                };
                Ok(Outcome {
                    entry: Some(dir),
                    conflicts: vec![Conflict {
                        path: here,
                        kind: ConflictKind::FileDirectory { directory_on },
                        region: Region::WholeFile,
                        base: base.map(Content::Entry),
                        ours: Some(Content::Entry(ours)),
                        theirs: Some(Content::Entry(theirs)),
                        alternate_path: None,
                    }],
                    displaced: Some((directory_on.other(), file)),
                })
            }
        }
    }

    fn merge_file(
        &self,
        path: RepoPath,
        base: Option<TreeEntry>,
        ours: TreeEntry,
        theirs: TreeEntry,
    ) -> Result<Outcome, MergeError> {
        let kind = if base.is_some() {
            ConflictKind::Content
        } else {
            ConflictKind::AddAdd
        };
        let base_bytes = match base {
            Some(entry) => self.store.read_blob(entry.id)?,
            None => Vec::new(),
        };
        let ours_bytes = self.store.read_blob(ours.id)?;
        let theirs_bytes = self.store.read_blob(theirs.id)?;

        if is_binary(&base_bytes) || is_binary(&ours_bytes) || is_binary(&theirs_bytes) {
            debug!(%path, "binary content changed on both sides");
            return Ok(Outcome {
                entry: Some(ours),
                conflicts: vec![Conflict {
                    path,
                    kind,
                    region: Region::WholeFile,
                    base: base.map(Content::Entry),
                    ours: Some(Content::Entry(ours)),
                    theirs: Some(Content::Entry(theirs)),
                    alternate_path: None,
                }],
                displaced: None,
            });
        }

        let merged = merge_text(&base_bytes, &ours_bytes, &theirs_bytes, &self.options.markers);
        let id = self.store.write_blob(merged.merged)?;
        let conflicts = merged
            .conflicts
            .into_iter()
            .map(|hunk| Conflict {
                path: path.clone(),
                kind,
                region: Region::Lines {
                    start: hunk.base_lines.start,
                    end: hunk.base_lines.end,
                },
                base: (kind == ConflictKind::Content).then(|| Content::Hunk(hunk.base)),
                ours: Some(Content::Hunk(hunk.ours)),
                theirs: Some(Content::Hunk(hunk.theirs)),
                alternate_path: None,
            })
            .collect::<Vec<_>>();
        if !conflicts.is_empty() {
            debug!(%path, hunks = conflicts.len(), "content conflict");
        }
        Ok(Outcome {
            entry: Some(TreeEntry::file(id)),
            conflicts,
            displaced: None,
        })
    }

    /// `name{suffix}{label}`, numbered if that name is already used.
    fn alternate_name(
        &self,
        name: &str,
        side: Side,
        names: &BTreeSet<&str>,
        tree: &Tree,
    ) -> String {
        let labels = &self.options.markers.labels;
        let label = match side {
            Side::Ours => &labels.ours,
            Side::Theirs => &labels.theirs,
        };
        let suffix = &self.options.alternate_suffix;
        let candidate = format!("{name}{suffix}{label}");
        let taken = |n: &str| names.contains(n) || tree.contains(n);
        if !taken(candidate.as_str()) {
            return candidate;
        }
        let mut n = 1u32;
        loop {
            let numbered = format!("{candidate}{suffix}{n}");
            if !taken(numbered.as_str()) {
                return numbered;
            }
            n += 1;
        }
    }
}

/// Classify one name from its three entries (after the favor policy).
fn plan(b: Option<TreeEntry>, o: Option<TreeEntry>, t: Option<TreeEntry>) -> Step {
    if o == t {
        return Step::Resolved(o);
    }
    if o == b {
        return Step::Resolved(t);
    }
    if t == b {
        return Step::Resolved(o);
    }
    let dir_base = b.filter(TreeEntry::is_directory).map(|e| e.id);
    match (o, t) {
        (Some(ours), Some(theirs)) => match (ours.is_directory(), theirs.is_directory()) {
            (true, true) => Step::Subtree {
                base: dir_base,
                ours: Some(ours.id),
                theirs: Some(theirs.id),
            },
            (false, false) => Step::Content {
                base: b.filter(|e| !e.is_directory()),
                ours,
                theirs,
            },
            _ => Step::FileDirectory {
                base: b,
                ours,
                theirs,
            },
        },
        (Some(survivor), None) | (None, Some(survivor)) => {
            let deleted_by = if o.is_none() { Side::Ours } else { Side::Theirs };
            match b {
                Some(base) if base.is_directory() && survivor.is_directory() => Step::Subtree {
                    base: Some(base.id),
                    ours: o.map(|e| e.id),
                    theirs: t.map(|e| e.id),
                },
                Some(base) => Step::ModifyDelete {
                    base,
                    survivor,
                    deleted_by,
                },
                None => Step::Resolved(Some(survivor)),
            }
        }
        (None, None) => Step::Resolved(None),
    }
}
