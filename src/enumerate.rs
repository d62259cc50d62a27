// src/enumerate.rs

//! Candidate enumeration: walk a root directory and yield file paths.
//!
//! The walk is lazy and depth-first. Inside each directory, files are
//! yielded first (sorted by name), then each subdirectory is descended into
//! in name order. Memory is bounded by the directories still waiting to be
//! read, not by the size of the tree.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, Stream};
use tracing::trace;

use crate::errors::{Result, StaleError};
use crate::fs::FileSystem;
use crate::pattern::PatternSet;
use crate::types::RelPath;

/// Predicate applied to every matched path.
pub type PathFilter = Arc<dyn Fn(&RelPath) -> bool + Send + Sync>;

/// Options for [`find_by_glob`].
#[derive(Clone)]
pub struct FindOptions {
    /// Include patterns; a file is yielded if it matches any of them.
    pub pattern: Vec<String>,
    /// Exclude patterns; applied after `pattern`.
    pub ignore: Vec<String>,
    pub filter: Option<PathFilter>,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            pattern: vec!["**".to_string()],
            ignore: Vec::new(),
            filter: None,
        }
    }
}

impl fmt::Debug for FindOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindOptions")
            .field("pattern", &self.pattern)
            .field("ignore", &self.ignore)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl FindOptions {
    pub fn pattern<S: Into<String>>(pattern: S) -> Self {
        Self {
            pattern: vec![pattern.into()],
            ..Self::default()
        }
    }

    pub fn ignore<S: Into<String>>(mut self, pattern: S) -> Self {
        self.ignore.push(pattern.into());
        self
    }

    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&RelPath) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(f));
        self
    }
}

/// Lazily walk every file under `root`, in enumeration order.
///
/// The first error is yielded once and then the iterator is exhausted.
pub struct TreeWalk {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    pending_dirs: Vec<RelPath>,
    ready: VecDeque<RelPath>,
    done: bool,
}

impl fmt::Debug for TreeWalk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeWalk")
            .field("root", &self.root)
            .field("pending_dirs", &self.pending_dirs.len())
            .finish_non_exhaustive()
    }
}

impl TreeWalk {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            pending_dirs: vec![RelPath::new("")],
            ready: VecDeque::new(),
            done: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_next_dir(&mut self, dir: RelPath) -> Result<()> {
        let abs = dir.to_path(&self.root);
        let entries = self
            .fs
            .read_dir(&abs)
            .map_err(|e| StaleError::fs(&abs, e))?;

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in entries {
            let Some(name) = entry.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let rel = dir.join(name);
            if self.fs.is_dir(&entry) {
                dirs.push(rel);
            } else {
                files.push(rel);
            }
        }
        files.sort();
        dirs.sort();

        trace!(dir = %dir, files = files.len(), dirs = dirs.len(), "read directory");
        self.ready.extend(files);
        // Reverse so the stack pops subdirectories in name order.
        self.pending_dirs.extend(dirs.into_iter().rev());
        Ok(())
    }
}

impl Iterator for TreeWalk {
    type Item = Result<RelPath>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if let Some(path) = self.ready.pop_front() {
                return Some(Ok(path));
            }
            let dir = match self.pending_dirs.pop() {
                Some(dir) => dir,
                None => {
                    self.done = true;
                    return None;
                }
            };
            if let Err(err) = self.read_next_dir(dir) {
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}

/// Files under a root matching include/ignore patterns and an optional filter.
pub struct FindByGlob {
    walk: TreeWalk,
    include: PatternSet,
    ignore: PatternSet,
    filter: Option<PathFilter>,
}

impl fmt::Debug for FindByGlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindByGlob")
            .field("walk", &self.walk)
            .field("include", &self.include)
            .field("ignore", &self.ignore)
            .finish_non_exhaustive()
    }
}

impl Iterator for FindByGlob {
    type Item = Result<RelPath>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = match self.walk.next()? {
                Ok(path) => path,
                Err(err) => return Some(Err(err)),
            };
            if !self.include.is_match(path.as_str()) || self.ignore.is_match(path.as_str()) {
                continue;
            }
            if let Some(filter) = &self.filter {
                if !filter(&path) {
                    continue;
                }
            }
            return Some(Ok(path));
        }
    }
}

/// Find files under `root` by glob pattern.
///
/// Patterns are compiled up front, so a bad pattern fails here before any
/// directory is read. Yields paths relative to `root`.
pub fn find_by_glob(
    fs: Arc<dyn FileSystem>,
    root: impl Into<PathBuf>,
    options: FindOptions,
) -> Result<FindByGlob> {
    let include = PatternSet::new(&options.pattern)?;
    let ignore = PatternSet::new(&options.ignore)?;
    Ok(FindByGlob {
        walk: TreeWalk::new(fs, root),
        include,
        ignore,
        filter: options.filter,
    })
}

/// Find every file under `root`, optionally filtered.
pub fn find_all(
    fs: Arc<dyn FileSystem>,
    root: impl Into<PathBuf>,
    filter: Option<PathFilter>,
) -> Result<FindByGlob> {
    find_by_glob(
        fs,
        root,
        FindOptions {
            filter,
            ..FindOptions::default()
        },
    )
}

/// Adapt a synchronous enumerator into an async stream.
pub fn into_stream<I>(iter: I) -> impl Stream<Item = I::Item>
where
    I: IntoIterator,
{
    stream::iter(iter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn sample_fs() -> Arc<dyn FileSystem> {
        let fs = MockFileSystem::new();
        fs.add_file("skip.txt", "");
        fs.add_file("folder/file3.txt", "");
        fs.add_file("file2.txt", "");
        fs.add_file("file1.txt", "");
        fs.add_file("folder/nested/deep.md", "");
        Arc::new(fs)
    }

    fn collect(iter: impl Iterator<Item = Result<RelPath>>) -> Vec<String> {
        iter.map(|r| r.unwrap().to_string()).collect()
    }

    #[test]
    fn walk_yields_files_before_descending() {
        let out = collect(TreeWalk::new(sample_fs(), "."));
        assert_eq!(
            out,
            vec![
                "file1.txt",
                "file2.txt",
                "skip.txt",
                "folder/file3.txt",
                "folder/nested/deep.md",
            ]
        );
    }

    #[test]
    fn find_by_glob_applies_pattern_ignore_and_filter() {
        let opts = FindOptions::pattern("*.txt")
            .ignore("skip.txt")
            .filter(|p| !p.as_str().ends_with("2.txt"));
        let out = collect(find_by_glob(sample_fs(), ".", opts).unwrap());
        assert_eq!(out, vec!["file1.txt"]);
    }

    #[test]
    fn find_all_reads_everything_and_can_filter() {
        let filter: PathFilter = Arc::new(|p: &RelPath| !p.as_str().contains("skip.txt"));
        let out = collect(find_all(sample_fs(), ".", Some(filter)).unwrap());
        assert_eq!(
            out,
            vec!["file1.txt", "file2.txt", "folder/file3.txt", "folder/nested/deep.md"]
        );
    }

    #[test]
    fn hidden_entries_need_an_explicit_pattern() {
        let fs = MockFileSystem::new();
        fs.add_file(".hidden", "");
        fs.add_file("a.md", "");
        fs.add_file(".git/HEAD", "");
        let fs: Arc<dyn FileSystem> = Arc::new(fs);

        let all = collect(find_by_glob(Arc::clone(&fs), ".", FindOptions::default()).unwrap());
        assert_eq!(all, vec!["a.md"]);

        let git = collect(find_by_glob(fs, ".", FindOptions::pattern(".git/*")).unwrap());
        assert_eq!(git, vec![".git/HEAD"]);
    }

    #[test]
    fn read_errors_are_yielded_once() {
        let fs = MockFileSystem::new();
        fs.add_file("a.txt", "");
        fs.add_broken("locked");
        let mut walk = TreeWalk::new(Arc::new(fs), ".");
        assert_eq!(walk.next().unwrap().unwrap(), "a.txt");
        assert!(matches!(
            walk.next(),
            Some(Err(StaleError::FilesystemError { .. }))
        ));
        assert!(walk.next().is_none());
    }

    #[tokio::test]
    async fn into_stream_preserves_walk_order() {
        use futures::StreamExt;

        let iter = find_by_glob(sample_fs(), ".", FindOptions::pattern("**/*.txt")).unwrap();
        let out: Vec<String> = into_stream(iter)
            .map(|r| r.unwrap().to_string())
            .collect()
            .await;
        assert_eq!(
            out,
            vec!["file1.txt", "file2.txt", "skip.txt", "folder/file3.txt"]
        );
    }

    #[test]
    fn invalid_pattern_fails_before_walking() {
        let fs = MockFileSystem::new();
        fs.add_broken("locked");
        let err = find_by_glob(Arc::new(fs), ".", FindOptions::pattern("")).unwrap_err();
        assert!(matches!(err, StaleError::ConfigError(_)));
    }
}
