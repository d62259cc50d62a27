// src/types.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Instant used for every staleness comparison.
///
/// Comparisons against `since` are always strict: `mtime > since`.
pub type Timestamp = SystemTime;

/// A file path relative to some root directory, with forward slashes.
///
/// Every path that flows between the enumerator, the trigger resolver, the
/// staleness filter and the tree builder uses this form; the root is owned by
/// whichever component performs the filesystem access.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelPath(String);

impl RelPath {
    /// Normalize backslashes to `/` and strip any leading `./` or `/`.
    ///
    /// `"."` on its own is the root itself and becomes the empty path.
    pub fn new(path: impl AsRef<str>) -> Self {
        let mut s = path.as_ref().replace('\\', "/");
        while let Some(rest) = s.strip_prefix("./") {
            s = rest.to_string();
        }
        let trimmed = s.trim_start_matches('/');
        if trimmed == "." {
            return RelPath(String::new());
        }
        RelPath(trimmed.to_string())
    }

    /// Build a relative path from `path` by stripping `root`.
    ///
    /// Returns `None` when `path` does not live under `root`.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        path.strip_prefix(root)
            .ok()
            .map(|rel| RelPath::new(rel.to_string_lossy()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against `root` to a concrete filesystem path.
    pub fn to_path(&self, root: &Path) -> PathBuf {
        if self.0.is_empty() {
            return root.to_path_buf();
        }
        self.0.split('/').fold(root.to_path_buf(), |acc, seg| acc.join(seg))
    }

    /// Join a child name onto this path.
    pub fn join(&self, name: &str) -> Self {
        if self.0.is_empty() {
            RelPath::new(name)
        } else {
            RelPath(format!("{}/{}", self.0, name))
        }
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RelPath {
    fn from(s: &str) -> Self {
        RelPath::new(s)
    }
}

impl From<String> for RelPath {
    fn from(s: String) -> Self {
        RelPath::new(s)
    }
}

impl PartialEq<str> for RelPath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RelPath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
