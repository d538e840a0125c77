//! Tree diffing and the optional rename pass.

pub mod rename;
pub mod tree;

pub use rename::{Rename, RenameReport, detect_renames, similarity};
pub use tree::{Change, DeltaEntry, FileChange, TreeDelta, diff_trees};
