// src/trigger.rs

//! One-hop trigger rules and their resolution.
//!
//! A trigger rule says "if any file matching `source` changed since the last
//! run, treat every file matching these destination patterns as stale".
//! Resolution happens once per run, before any candidate is filtered, and
//! never cascades: destinations elected here do not fire further rules.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::enumerate::{PathFilter, TreeWalk};
use crate::errors::{Result, StaleError};
use crate::fs::FileSystem;
use crate::pattern::{compile_glob, PatternSet};
use crate::types::{RelPath, Timestamp};

/// Callback form of a destination: receives the changed source paths (in
/// enumeration order) and returns the patterns to activate.
pub type TargetFn = Arc<dyn Fn(&[RelPath]) -> anyhow::Result<Targets> + Send + Sync>;

/// Patterns returned by a [`TargetFn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    One(String),
    Many(Vec<String>),
}

impl Targets {
    pub fn into_patterns(self) -> Vec<String> {
        match self {
            Targets::One(p) => vec![p],
            Targets::Many(ps) => ps,
        }
    }
}

impl From<&str> for Targets {
    fn from(p: &str) -> Self {
        Targets::One(p.to_string())
    }
}

impl From<String> for Targets {
    fn from(p: String) -> Self {
        Targets::One(p)
    }
}

impl From<Vec<String>> for Targets {
    fn from(ps: Vec<String>) -> Self {
        Targets::Many(ps)
    }
}

impl From<Vec<&str>> for Targets {
    fn from(ps: Vec<&str>) -> Self {
        Targets::Many(ps.into_iter().map(str::to_string).collect())
    }
}

/// Right-hand side of a trigger or dependency rule.
#[derive(Clone)]
pub enum DestinationSpec {
    Pattern(String),
    Patterns(Vec<String>),
    Callback(TargetFn),
}

impl fmt::Debug for DestinationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationSpec::Pattern(p) => f.debug_tuple("Pattern").field(p).finish(),
            DestinationSpec::Patterns(ps) => f.debug_tuple("Patterns").field(ps).finish(),
            DestinationSpec::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl DestinationSpec {
    pub fn callback<F, T>(f: F) -> Self
    where
        F: Fn(&[RelPath]) -> anyhow::Result<T> + Send + Sync + 'static,
        T: Into<Targets>,
    {
        DestinationSpec::Callback(Arc::new(
            move |changed: &[RelPath]| -> anyhow::Result<Targets> { f(changed).map(Into::into) },
        ))
    }

    /// Collapse this spec into a flat list of patterns.
    ///
    /// `changed` is handed to a callback verbatim; static shapes ignore it.
    pub fn resolve(&self, source: &str, changed: &[RelPath]) -> Result<Vec<String>> {
        match self {
            DestinationSpec::Pattern(p) => Ok(vec![p.clone()]),
            DestinationSpec::Patterns(ps) => Ok(ps.clone()),
            DestinationSpec::Callback(f) => f(changed)
                .map(Targets::into_patterns)
                .map_err(|source_err| StaleError::CallbackError {
                    pattern: source.to_string(),
                    source: source_err,
                }),
        }
    }

    fn validate(&self, source: &str) -> Result<()> {
        let patterns: &[String] = match self {
            DestinationSpec::Pattern(p) => std::slice::from_ref(p),
            DestinationSpec::Patterns(ps) => ps,
            DestinationSpec::Callback(_) => return Ok(()),
        };
        if patterns.is_empty() {
            return Err(StaleError::ConfigError(format!(
                "trigger '{source}' has an empty destination list"
            )));
        }
        for p in patterns {
            compile_glob(p)?;
        }
        Ok(())
    }
}

impl From<&str> for DestinationSpec {
    fn from(p: &str) -> Self {
        DestinationSpec::Pattern(p.to_string())
    }
}

impl From<String> for DestinationSpec {
    fn from(p: String) -> Self {
        DestinationSpec::Pattern(p)
    }
}

impl From<Vec<&str>> for DestinationSpec {
    fn from(ps: Vec<&str>) -> Self {
        DestinationSpec::Patterns(ps.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for DestinationSpec {
    fn from(ps: Vec<String>) -> Self {
        DestinationSpec::Patterns(ps)
    }
}

/// Mapping from source glob pattern to destination spec.
///
/// The same shape serves as the dependency map of the tree builder.
#[derive(Debug, Clone, Default)]
pub struct TriggerMap {
    rules: BTreeMap<String, DestinationSpec>,
}

/// Dependency rules for [`crate::tree::DependencyTreeBuilder`].
pub type DependencyMap = TriggerMap;

impl TriggerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, source: impl Into<String>, dest: impl Into<DestinationSpec>) -> Self {
        self.insert(source, dest);
        self
    }

    pub fn insert(&mut self, source: impl Into<String>, dest: impl Into<DestinationSpec>) {
        self.rules.insert(source.into(), dest.into());
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DestinationSpec)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check every source pattern and every static destination.
    pub fn validate(&self) -> Result<()> {
        for (source, dest) in self.rules.iter() {
            compile_glob(source)?;
            dest.validate(source)?;
        }
        Ok(())
    }
}

/// Destination patterns elected for one run.
#[derive(Debug, Clone)]
pub struct ActivatedPatterns {
    set: PatternSet,
}

impl ActivatedPatterns {
    pub fn none() -> Self {
        Self {
            set: PatternSet::empty(),
        }
    }

    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let unique: BTreeSet<String> = patterns.into_iter().map(Into::into).collect();
        Ok(Self {
            set: PatternSet::new(&unique)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    pub fn len(&self) -> usize {
        self.set.patterns().len()
    }

    /// The distinct pattern strings, exactly as elected.
    pub fn patterns(&self) -> &[String] {
        self.set.patterns()
    }

    pub fn is_match(&self, rel_path: &str) -> bool {
        self.set.is_match(rel_path)
    }
}

/// Computes the activated pattern set for a run.
pub struct TriggerResolver {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    rules: Vec<(String, DestinationSpec)>,
    sources: PatternSet,
    filter: Option<PathFilter>,
}

impl fmt::Debug for TriggerResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerResolver")
            .field("root", &self.root)
            .field("rules", &self.rules)
            .field("filter", &self.filter.is_some())
            .finish_non_exhaustive()
    }
}

impl TriggerResolver {
    /// Validate `triggers` and prepare a resolver rooted at `root`.
    ///
    /// Configuration errors surface here, before any filesystem access.
    pub fn new(
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        triggers: &TriggerMap,
    ) -> Result<Self> {
        triggers.validate()?;

        let rules: Vec<(String, DestinationSpec)> = triggers
            .iter()
            .map(|(source, dest)| (source.to_string(), dest.clone()))
            .collect();
        let sources = PatternSet::new(rules.iter().map(|(source, _)| source))?;

        Ok(Self {
            fs,
            root: root.into(),
            rules,
            sources,
            filter: None,
        })
    }

    /// Skip walked paths for which `filter` returns false; they can never
    /// fire a rule.
    pub fn with_filter(mut self, filter: Option<PathFilter>) -> Self {
        self.filter = filter;
        self
    }

    /// Resolve every rule against the files changed after `since`.
    ///
    /// The tree is walked once for all rules; each matched file is stat'ed
    /// at most once. Any filesystem or callback error aborts resolution.
    pub fn resolve(&self, since: Timestamp) -> Result<ActivatedPatterns> {
        if self.rules.is_empty() {
            return Ok(ActivatedPatterns::none());
        }

        let mut changed_by_rule: Vec<Vec<RelPath>> = vec![Vec::new(); self.rules.len()];
        for entry in TreeWalk::new(Arc::clone(&self.fs), self.root.clone()) {
            let path = entry?;
            let hits = self.sources.matches(path.as_str());
            if hits.is_empty() || self.filter.as_ref().is_some_and(|keep| !keep(&path)) {
                continue;
            }
            let abs = path.to_path(&self.root);
            let mtime = self
                .fs
                .modified(&abs)
                .map_err(|e| StaleError::fs(&abs, e))?;
            if mtime <= since {
                continue;
            }
            trace!(path = %path, rules = hits.len(), "changed file matches trigger source");
            for idx in hits {
                changed_by_rule[idx].push(path.clone());
            }
        }

        let mut activated = BTreeSet::new();
        for ((source, dest), changed) in self.rules.iter().zip(changed_by_rule.iter()) {
            if changed.is_empty() {
                continue;
            }
            let patterns = dest.resolve(source, changed)?;
            debug!(
                source = %source,
                changed = changed.len(),
                ?patterns,
                "trigger fired"
            );
            activated.extend(patterns);
        }

        ActivatedPatterns::from_patterns(activated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};

    use crate::fs::mock::MockFileSystem;

    fn t(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    const OLD: u64 = 100;
    const SINCE: u64 = 200;
    const NEW: u64 = 300;

    fn fixture() -> Arc<dyn FileSystem> {
        let fs = MockFileSystem::new();
        fs.add_file_with_mtime("file1.txt", "", t(OLD));
        fs.add_file_with_mtime("file2.txt", "", t(OLD));
        fs.add_file_with_mtime("skip.txt", "", t(NEW));
        fs.add_file_with_mtime("folder/file3.txt", "", t(NEW));
        Arc::new(fs)
    }

    fn resolve(triggers: TriggerMap) -> Result<ActivatedPatterns> {
        TriggerResolver::new(fixture(), ".", &triggers)?.resolve(t(SINCE))
    }

    #[test]
    fn changed_source_activates_single_pattern() {
        let activated = resolve(TriggerMap::new().with("folder/*", "file2.*")).unwrap();
        assert_eq!(activated.patterns(), ["file2.*".to_string()]);
        assert!(activated.is_match("file2.txt"));
    }

    #[test]
    fn old_source_does_not_fire() {
        let activated = resolve(TriggerMap::new().with("file1.txt", "file2.txt")).unwrap();
        assert!(activated.is_empty());
    }

    #[test]
    fn duplicate_patterns_collapse_and_keep_case() {
        let triggers = TriggerMap::new()
            .with("folder/*", vec!["File2.*", "file1.*"])
            .with("skip.txt", "File2.*");
        let activated = resolve(triggers).unwrap();
        assert_eq!(activated.len(), 2);
        assert!(activated.patterns().contains(&"File2.*".to_string()));
    }

    #[test]
    fn callback_sees_only_its_own_changed_matches() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let triggers = TriggerMap::new()
            .with(
                "**/*.txt",
                DestinationSpec::callback(move |changed: &[RelPath]| {
                    seen_cb.lock().unwrap().extend(changed.iter().cloned());
                    Ok("file1.*")
                }),
            )
            .with("folder/*", "file2.*");

        let activated = resolve(triggers).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![RelPath::new("skip.txt"), RelPath::new("folder/file3.txt")]);
        assert_eq!(activated.len(), 2);
    }

    #[test]
    fn callback_error_aborts_resolution() {
        let triggers = TriggerMap::new().with(
            "folder/*",
            DestinationSpec::callback(|_: &[RelPath]| -> anyhow::Result<Targets> {
                Err(anyhow::anyhow!("boom"))
            }),
        );
        match resolve(triggers) {
            Err(StaleError::CallbackError { pattern, .. }) => assert_eq!(pattern, "folder/*"),
            other => panic!("expected CallbackError, got {other:?}"),
        }
    }

    #[test]
    fn bad_destination_is_rejected_before_touching_the_filesystem() {
        let fs = MockFileSystem::new();
        fs.add_broken("locked");
        let triggers = TriggerMap::new().with("*.md", Vec::<String>::new());
        let err = TriggerResolver::new(Arc::new(fs), ".", &triggers).unwrap_err();
        assert!(matches!(err, StaleError::ConfigError(_)));
    }

    #[test]
    fn filtered_paths_never_fire() {
        let fs = MockFileSystem::new();
        fs.add_file_with_mtime("state/last-run", "", t(NEW));
        fs.add_file_with_mtime("notes.md", "", t(OLD));
        let triggers = TriggerMap::new().with("**", "pages/**");

        let resolver = TriggerResolver::new(Arc::new(fs), ".", &triggers)
            .unwrap()
            .with_filter(Some(Arc::new(|p: &RelPath| p.as_str() != "state/last-run")));
        assert!(resolver.resolve(t(SINCE)).unwrap().is_empty());
    }

    #[test]
    fn hidden_files_only_fire_explicit_dot_sources() {
        let fs: Arc<dyn FileSystem> = {
            let fs = MockFileSystem::new();
            fs.add_file_with_mtime(".git/HEAD", "", t(NEW));
            fs.add_file_with_mtime("notes.md", "", t(OLD));
            Arc::new(fs)
        };

        let wildcard = TriggerMap::new().with("**", "pages/**");
        let resolver = TriggerResolver::new(Arc::clone(&fs), ".", &wildcard).unwrap();
        assert!(resolver.resolve(t(SINCE)).unwrap().is_empty());

        let explicit = TriggerMap::new().with(".git/*", "pages/**");
        let resolver = TriggerResolver::new(fs, ".", &explicit).unwrap();
        assert_eq!(resolver.resolve(t(SINCE)).unwrap().patterns(), ["pages/**".to_string()]);
    }

    #[test]
    fn stat_failure_is_fail_fast() {
        let fs = MockFileSystem::new();
        fs.add_file_with_mtime("a.txt", "", t(NEW));
        fs.add_broken("locked");
        let triggers = TriggerMap::new().with("a.txt", "b.txt");
        let resolver = TriggerResolver::new(Arc::new(fs), ".", &triggers).unwrap();
        assert!(matches!(
            resolver.resolve(t(SINCE)),
            Err(StaleError::FilesystemError { .. })
        ));
    }

    #[test]
    fn empty_map_is_a_no_op() {
        let activated = resolve(TriggerMap::new()).unwrap();
        assert!(activated.is_empty());
    }
}
