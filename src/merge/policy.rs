//! Whole-file favor policy (`favor = "ours"` / `"theirs"`).
//!
//! Applied to each path before the per-path merge rules run. When both
//! sides changed a path in different ways, the unfavored side is replaced by
//! the favored one, so the per-path rules see an identical change and
//! resolve it without conflict. Directories changed on both sides are left
//! alone; the policy applies again to each entry inside them.

use braid_store::TreeEntry;

use crate::config::Favor;

/// Rewrite `(ours, theirs)` for one path according to `favor`.
#[must_use]
pub fn apply_favor(
    favor: Favor,
    base: Option<TreeEntry>,
    ours: Option<TreeEntry>,
    theirs: Option<TreeEntry>,
) -> (Option<TreeEntry>, Option<TreeEntry>) {
    let both_changed = ours != theirs && ours != base && theirs != base;
    let both_dirs =
        matches!((ours, theirs), (Some(o), Some(t)) if o.is_directory() && t.is_directory());
    if !both_changed || both_dirs {
        return (ours, theirs);
    }
    match favor {
        Favor::None => (ours, theirs),
        Favor::Ours => (ours, ours),
        Favor::Theirs => (theirs, theirs),
    }
}
