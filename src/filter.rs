// src/filter.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::trace;

use crate::errors::{Result, StaleError};
use crate::fs::FileSystem;
use crate::trigger::ActivatedPatterns;
use crate::types::{RelPath, Timestamp};

/// `since` is an exclusive lower bound: a file modified exactly at `since`
/// is not newer.
pub fn is_newer(mtime: Timestamp, since: Timestamp) -> bool {
    mtime > since
}

/// Per-candidate staleness decision for one run.
pub struct StalenessFilter {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    since: Timestamp,
    activated: ActivatedPatterns,
}

impl fmt::Debug for StalenessFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StalenessFilter")
            .field("root", &self.root)
            .field("since", &self.since)
            .field("activated", &self.activated.patterns())
            .finish_non_exhaustive()
    }
}

impl StalenessFilter {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        since: Timestamp,
        activated: ActivatedPatterns,
    ) -> Self {
        Self {
            fs,
            root: root.into(),
            since,
            activated,
        }
    }

    pub fn since(&self) -> Timestamp {
        self.since
    }

    pub fn activated(&self) -> &ActivatedPatterns {
        &self.activated
    }

    /// True if `path` was modified after `since` or matches an activated
    /// pattern. Triggered paths are decided without a stat.
    pub fn is_stale(&self, path: &RelPath) -> Result<bool> {
        if self.activated.is_match(path.as_str()) {
            trace!(path = %path, "stale: triggered");
            return Ok(true);
        }
        let abs = path.to_path(&self.root);
        let mtime = self
            .fs
            .modified(&abs)
            .map_err(|e| StaleError::fs(&abs, e))?;
        let stale = is_newer(mtime, self.since);
        trace!(path = %path, stale, "mtime check");
        Ok(stale)
    }
}
