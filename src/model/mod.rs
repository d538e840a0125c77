//! Data model shared by the differ, merger, and replayer.

pub mod conflict;
pub mod path;

pub use conflict::{Conflict, ConflictKind, Content, MergeResult, Region, Side};
pub use path::RepoPath;
