//! Repository-relative paths as component sequences.

use std::fmt;

use serde::{Serialize, Serializer};

/// A path from the repository root, stored as its components.
///
/// Ordering is component-wise, which matches the order in which the tree
/// walkers visit entries (each directory's entries in name order, depth
/// first). Displays with `/` separators.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoPath(Vec<String>);

impl RepoPath {
    /// The repository root (no components).
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// A new path with `name` appended.
    #[must_use]
    pub fn join(&self, name: &str) -> Self {
        let mut components = self.0.clone();
        components.push(name.to_owned());
        Self(components)
    }

    /// The same directory with the final component replaced.
    #[must_use]
    pub fn with_file_name(&self, name: &str) -> Self {
        let mut components = self.0.clone();
        components.pop();
        components.push(name.to_owned());
        Self(components)
    }

    #[must_use]
    pub fn components(&self) -> &[String] {
        &self.0
    }

    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl From<&str> for RepoPath {
    /// Split on `/`, ignoring empty components.
    fn from(s: &str) -> Self {
        Self(
            s.split('/')
                .filter(|c| !c.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }
}

impl Serialize for RepoPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
