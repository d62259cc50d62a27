// src/store.rs

//! Persistence for the timestamp of the last successful run.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use tracing::{debug, info};

use crate::errors::{Result, StaleError};
use crate::fs::FileSystem;
use crate::types::Timestamp;

/// Relative path (from the content root) to the timestamp file.
///
/// The effective path on disk is `<root>/.staleset/last-run`.
pub const TIMESTAMP_FILE_PATH: &str = ".staleset/last-run";

/// Future returned by [`TimestampStore::get`].
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Abstract storage for the last run's timestamp.
///
/// `get` may be asynchronous; synchronous stores return a ready future.
pub trait TimestampStore: Send {
    fn get(&self) -> StoreFuture<'_, Option<Timestamp>>;
    fn set(&mut self, at: Timestamp) -> Result<()>;
}

/// Keeps the timestamp in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemoryTimestampStore {
    last: Option<Timestamp>,
    writes: usize,
}

impl MemoryTimestampStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already remembers a previous run at `at`.
    pub fn with_last(at: Timestamp) -> Self {
        Self {
            last: Some(at),
            writes: 0,
        }
    }

    pub fn last(&self) -> Option<Timestamp> {
        self.last
    }

    /// Number of `set` calls so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl TimestampStore for MemoryTimestampStore {
    fn get(&self) -> StoreFuture<'_, Option<Timestamp>> {
        let last = self.last;
        Box::pin(async move { Ok(last) })
    }

    fn set(&mut self, at: Timestamp) -> Result<()> {
        self.last = Some(at);
        self.writes += 1;
        debug!(?at, "stored run timestamp (memory)");
        Ok(())
    }
}

/// Stores the timestamp as nanoseconds since the Unix epoch in a text file.
#[derive(Debug, Clone)]
pub struct FileTimestampStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileTimestampStore {
    /// Store under `<root>/.staleset/last-run`.
    pub fn new(fs: Arc<dyn FileSystem>, root: &Path) -> Self {
        Self::at(fs, root.join(TIMESTAMP_FILE_PATH))
    }

    /// Store at an explicit file path.
    pub fn at(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Synchronous read, shared by `get` and callers outside an async context.
    pub fn load(&self) -> Result<Option<Timestamp>> {
        let contents = match self.fs.read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StaleError::fs(&self.path, e)),
        };
        parse_timestamp(&contents)
            .map(Some)
            .map_err(|msg| StaleError::StoreError(format!("{:?}: {msg}", self.path)))
    }
}

impl TimestampStore for FileTimestampStore {
    fn get(&self) -> StoreFuture<'_, Option<Timestamp>> {
        Box::pin(async move { self.load() })
    }

    fn set(&mut self, at: Timestamp) -> Result<()> {
        let nanos = at
            .duration_since(UNIX_EPOCH)
            .map_err(|e| StaleError::StoreError(format!("timestamp before Unix epoch: {e}")))?
            .as_nanos();
        self.fs
            .write(&self.path, format!("{nanos}\n").as_bytes())
            .map_err(|e| StaleError::fs(&self.path, e))?;
        info!(path = ?self.path, "stored run timestamp (file)");
        Ok(())
    }
}

fn parse_timestamp(contents: &str) -> std::result::Result<Timestamp, String> {
    let trimmed = contents.trim();
    let nanos: u128 = trimmed
        .parse()
        .map_err(|e| format!("invalid timestamp {trimmed:?}: {e}"))?;
    let secs = u64::try_from(nanos / 1_000_000_000)
        .map_err(|_| format!("timestamp out of range: {trimmed}"))?;
    let sub = (nanos % 1_000_000_000) as u32;
    Ok(UNIX_EPOCH + Duration::new(secs, sub))
}
