// src/select.rs

//! Incremental selection of stale candidates.
//!
//! A run has two phases that never interleave:
//!
//! 1. An eager global phase: read `since` from the store and, if present,
//!    resolve every trigger rule into an activated pattern set.
//! 2. A lazy streaming phase: each candidate is tested as it arrives and
//!    emitted if stale. Candidates are never buffered.
//!
//! Both phases stat files on the tokio blocking pool, so the stream must be
//! polled inside a tokio runtime.
//!
//! The timestamp captured when [`IncrementalSelector::select`] is called is
//! committed to the store once the candidate stream is exhausted. If the
//! stream fails or is dropped early, nothing is committed.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_stream::try_stream;
use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, info};

use crate::errors::Result;
use crate::filter::StalenessFilter;
use crate::enumerate::PathFilter;
use crate::fs::{FileSystem, blocking};
use crate::store::TimestampStore;
use crate::trigger::{TriggerMap, TriggerResolver};
use crate::types::RelPath;

/// Anything a candidate source can yield.
pub trait IntoCandidate {
    fn into_candidate(self) -> Result<RelPath>;
}

impl IntoCandidate for RelPath {
    fn into_candidate(self) -> Result<RelPath> {
        Ok(self)
    }
}

impl IntoCandidate for Result<RelPath> {
    fn into_candidate(self) -> Result<RelPath> {
        self
    }
}

impl IntoCandidate for &str {
    fn into_candidate(self) -> Result<RelPath> {
        Ok(RelPath::new(self))
    }
}

impl IntoCandidate for String {
    fn into_candidate(self) -> Result<RelPath> {
        Ok(RelPath::new(self))
    }
}

/// Combines trigger resolution with plain mtime filtering.
#[derive(Clone)]
pub struct IncrementalSelector {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    triggers: TriggerMap,
    source_filter: Option<PathFilter>,
}

impl fmt::Debug for IncrementalSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalSelector")
            .field("root", &self.root)
            .field("triggers", &self.triggers)
            .field("source_filter", &self.source_filter.is_some())
            .finish_non_exhaustive()
    }
}

impl IncrementalSelector {
    /// Selector over candidates relative to `root`, with no trigger rules.
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
            triggers: TriggerMap::new(),
            source_filter: None,
        }
    }

    pub fn with_triggers(mut self, triggers: TriggerMap) -> Self {
        self.triggers = triggers;
        self
    }

    /// Restrict which files may fire a trigger rule.
    ///
    /// Files the caller itself writes during a run (e.g. the timestamp
    /// file) must be excluded here, or they fire on every following run.
    pub fn with_source_filter<F>(mut self, f: F) -> Self
    where
        F: Fn(&RelPath) -> bool + Send + Sync + 'static,
    {
        self.source_filter = Some(Arc::new(f));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn triggers(&self) -> &TriggerMap {
        &self.triggers
    }

    /// Stream the stale subset of `candidates`.
    ///
    /// Trigger configuration is validated here, before the store or the
    /// filesystem is touched. The run timestamp is captured at call time.
    pub fn select<'a, S>(
        &self,
        candidates: S,
        store: &'a mut dyn TimestampStore,
    ) -> Result<impl Stream<Item = Result<RelPath>> + use<'a, S>>
    where
        S: Stream + 'a,
        S::Item: IntoCandidate,
    {
        let now = SystemTime::now();
        let resolver = TriggerResolver::new(Arc::clone(&self.fs), self.root.clone(), &self.triggers)?
            .with_filter(self.source_filter.clone());
        let fs = Arc::clone(&self.fs);
        let root = self.root.clone();

        Ok(try_stream! {
            let since = store.get().await?;
            let mut seen = 0usize;
            let mut selected = 0usize;

            match since {
                None => {
                    debug!("no previous run recorded; every candidate is stale");
                    for await item in candidates {
                        let path = item.into_candidate()?;
                        seen += 1;
                        selected += 1;
                        yield path;
                    }
                }
                Some(since) => {
                    let activated = blocking(move || resolver.resolve(since)).await?;
                    debug!(patterns = ?activated.patterns(), "activated trigger patterns");
                    let filter = Arc::new(StalenessFilter::new(fs, root, since, activated));

                    for await item in candidates {
                        let path = item.into_candidate()?;
                        seen += 1;
                        let filter = Arc::clone(&filter);
                        let (path, stale) = blocking(move || {
                            let stale = filter.is_stale(&path)?;
                            Ok((path, stale))
                        })
                        .await?;
                        if stale {
                            selected += 1;
                            yield path;
                        }
                    }
                }
            }

            store.set(now)?;
            info!(seen, selected, "incremental selection complete");
        })
    }

    /// Same as [`select`](Self::select) for a synchronous candidate source.
    pub fn select_iter<'a, I>(
        &self,
        candidates: I,
        store: &'a mut dyn TimestampStore,
    ) -> Result<impl Stream<Item = Result<RelPath>> + use<'a, I>>
    where
        I: IntoIterator + 'a,
        I::Item: IntoCandidate,
    {
        self.select(stream::iter(candidates), store)
    }

    /// Run a selection to completion and collect the stale paths.
    pub async fn select_all<I>(
        &self,
        candidates: I,
        store: &mut dyn TimestampStore,
    ) -> Result<Vec<RelPath>>
    where
        I: IntoIterator,
        I::Item: IntoCandidate,
    {
        self.select_iter(candidates, store)?.try_collect().await
    }
}
