// src/tree.rs

//! Stale-set computation over a whole directory tree.
//!
//! Unlike [`crate::select::IncrementalSelector`], which filters a stream of
//! candidates, the tree builder enumerates everything under a base directory
//! itself. Subdirectories are walked concurrently (one future per
//! directory, blocking probes on the tokio blocking pool) and joined before
//! any staleness decision is made. Any probe or callback failure aborts the
//! whole call and drops in-flight siblings; no partial tree is returned.

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::enumerate::PathFilter;
use crate::errors::{Result, StaleError};
use crate::filter::is_newer;
use crate::fs::{FileSystem, blocking};
use crate::pattern::PatternSet;
use crate::trigger::DependencyMap;
use crate::types::{RelPath, Timestamp};

/// Maximum number of concurrent mtime probes.
const STAT_CONCURRENCY: usize = 64;

/// Builds the list of files under a directory that need reprocessing.
#[derive(Clone)]
pub struct DependencyTreeBuilder {
    fs: Arc<dyn FileSystem>,
    cwd: PathBuf,
    since: Option<Timestamp>,
    dependencies: Option<DependencyMap>,
    filter: Option<PathFilter>,
}

impl fmt::Debug for DependencyTreeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyTreeBuilder")
            .field("cwd", &self.cwd)
            .field("since", &self.since)
            .field("dependencies", &self.dependencies)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl DependencyTreeBuilder {
    pub fn new(fs: Arc<dyn FileSystem>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            cwd: cwd.into(),
            since: None,
            dependencies: None,
            filter: None,
        }
    }

    pub fn since(mut self, since: Option<Timestamp>) -> Self {
        self.since = since;
        self
    }

    pub fn dependencies(mut self, dependencies: DependencyMap) -> Self {
        self.dependencies = Some(dependencies);
        self
    }

    /// Drop files (relative to `cwd`) for which `f` returns false.
    ///
    /// Filtered files are neither listed nor considered as changed
    /// dependencies.
    pub fn filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&RelPath) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(f));
        self
    }

    async fn walk(&self, dir: PathBuf) -> Result<Vec<PathBuf>> {
        let mut files = walk_dir(Arc::clone(&self.fs), dir).await?;
        if let Some(filter) = &self.filter {
            files.retain(|f| RelPath::from_path(&self.cwd, f).is_some_and(|rel| filter(&rel)));
        }
        Ok(files)
    }

    /// List files under `cwd/dirname`, relative to that directory.
    ///
    /// - no `since`: every file;
    /// - `since` only: files modified after `since`;
    /// - both: additionally, every file matched by the targets of a
    ///   dependency rule whose dependency pattern matches a changed file.
    ///
    /// Dependency and target patterns are matched against the whole tree
    /// under `cwd`, not just `dirname`. Result order is unspecified.
    pub async fn tree(&self, dirname: &str) -> Result<Vec<RelPath>> {
        if let Some(deps) = &self.dependencies {
            deps.validate()?;
        }

        let basedir = base_dir(&self.cwd, dirname);
        let files = self.walk(basedir.clone()).await?;
        debug!(basedir = ?basedir, files = files.len(), "walked tree");

        let relative = |file: &Path| RelPath::from_path(&basedir, file);

        let Some(since) = self.since else {
            return Ok(files.iter().filter_map(|f| relative(f.as_path())).collect());
        };

        let deps = match &self.dependencies {
            Some(deps) if !deps.is_empty() => deps,
            _ => {
                let with_mtimes = stat_all(&self.fs, files).await?;
                return Ok(with_mtimes
                    .iter()
                    .filter(|(_, mtime)| is_newer(*mtime, since))
                    .filter_map(|(f, _)| relative(f.as_path()))
                    .collect());
            }
        };

        // Reuse the walk when the base dir is cwd itself.
        let tree_files = if basedir == self.cwd {
            files.clone()
        } else {
            self.walk(self.cwd.clone()).await?
        };
        let filter_by_deps = self
            .affected_by_dependencies(deps, since, &tree_files)
            .await?;
        drop(tree_files);

        let with_mtimes = stat_all(&self.fs, files).await?;

        let stale: Vec<RelPath> = with_mtimes
            .iter()
            .filter(|(f, mtime)| {
                is_newer(*mtime, since)
                    || RelPath::from_path(&self.cwd, f)
                        .is_some_and(|rel| filter_by_deps.contains(&rel))
            })
            .filter_map(|(f, _)| relative(f.as_path()))
            .collect();

        info!(
            stale = stale.len(),
            total = with_mtimes.len(),
            by_dependency = filter_by_deps.len(),
            "dependency tree computed"
        );
        Ok(stale)
    }

    /// Paths (relative to `cwd`) made stale by a changed dependency.
    ///
    /// `tree_files` is every file under `cwd`; both sides of a rule are
    /// matched against it.
    async fn affected_by_dependencies(
        &self,
        deps: &DependencyMap,
        since: Timestamp,
        tree_files: &[PathBuf],
    ) -> Result<HashSet<RelPath>> {
        let mut all: Vec<RelPath> = tree_files
            .iter()
            .filter_map(|f| RelPath::from_path(&self.cwd, f))
            .collect();
        all.sort();

        let mut affected = HashSet::new();
        for (dep, target) in deps.iter() {
            let dep_set = PatternSet::new([dep])?;
            let matched: Vec<RelPath> = all
                .iter()
                .filter(|p| dep_set.is_match(p.as_str()))
                .cloned()
                .collect();
            if matched.is_empty() {
                continue;
            }

            let abs: Vec<PathBuf> = matched.iter().map(|p| p.to_path(&self.cwd)).collect();
            let mtimes = stat_all(&self.fs, abs).await?;
            let changed: Vec<RelPath> = matched
                .into_iter()
                .zip(mtimes)
                .filter(|(_, (_, mtime))| is_newer(*mtime, since))
                .map(|(rel, _)| rel)
                .collect();
            if changed.is_empty() {
                continue;
            }

            let patterns = target.resolve(dep, &changed)?;
            let target_set = PatternSet::new(&patterns)?;
            let before = affected.len();
            affected.extend(
                all.iter()
                    .filter(|p| target_set.is_match(p.as_str()))
                    .cloned(),
            );
            debug!(
                dependency = %dep,
                changed = changed.len(),
                ?patterns,
                added = affected.len() - before,
                "dependency rule fired"
            );
        }
        Ok(affected)
    }
}

fn base_dir(cwd: &Path, dirname: &str) -> PathBuf {
    let rel = RelPath::new(dirname.trim());
    match rel.as_str() {
        "" | "." => cwd.to_path_buf(),
        _ => rel.to_path(cwd),
    }
}

async fn probe<T, F>(fs: &Arc<dyn FileSystem>, path: PathBuf, op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&dyn FileSystem, &Path) -> io::Result<T> + Send + 'static,
{
    let fs = Arc::clone(fs);
    blocking(move || op(fs.as_ref(), &path).map_err(|e| StaleError::fs(&path, e))).await
}

/// Recursively collect every file under `dir`, one future per subdirectory.
fn walk_dir(fs: Arc<dyn FileSystem>, dir: PathBuf) -> BoxFuture<'static, Result<Vec<PathBuf>>> {
    async move {
        let (mut files, dirs) = probe(&fs, dir, |fs, dir| {
            let mut files = Vec::new();
            let mut dirs = Vec::new();
            for entry in fs.read_dir(dir)? {
                if fs.is_dir(&entry) {
                    dirs.push(entry);
                } else {
                    files.push(entry);
                }
            }
            Ok((files, dirs))
        })
        .await?;

        let nested = try_join_all(dirs.into_iter().map(|d| walk_dir(Arc::clone(&fs), d))).await?;
        for sub in nested {
            files.extend(sub);
        }
        Ok(files)
    }
    .boxed()
}

/// Stat every file concurrently, preserving input order.
async fn stat_all(
    fs: &Arc<dyn FileSystem>,
    files: Vec<PathBuf>,
) -> Result<Vec<(PathBuf, Timestamp)>> {
    stream::iter(files)
        .map(|file| {
            let fs = Arc::clone(fs);
            async move {
                let mtime = probe(&fs, file.clone(), |fs, p| fs.modified(p)).await?;
                Ok::<_, StaleError>((file, mtime))
            }
        })
        .buffered(STAT_CONCURRENCY)
        .try_collect()
        .await
}
