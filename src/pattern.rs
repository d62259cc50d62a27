// src/pattern.rs

//! Case-insensitive glob matching over forward-slash relative paths.
//!
//! Patterns follow the usual glob rules: `*` and `?` stay within one path
//! segment, `**` crosses segments, `[...]` and `{a,b}` work as expected.
//!
//! Hidden paths (any segment starting with `.`) only match patterns that
//! spell out a dot-prefixed segment themselves, so `**` never reaches
//! `.git/HEAD` while `.staleset/*` still does.

use std::fmt;

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::errors::{Result, StaleError};

/// A compiled set of glob patterns.
///
/// The original pattern strings are kept verbatim (including case) so they
/// can be logged or reported back; matching ignores case.
#[derive(Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    /// Per pattern: may it match hidden paths?
    dot: Vec<bool>,
    set: GlobSet,
}

impl fmt::Debug for PatternSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl PatternSet {
    /// Compile `patterns` into a single matcher.
    ///
    /// An empty or syntactically invalid pattern is a configuration error.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::new();
        let mut dot = Vec::new();
        for pat in patterns {
            let pat = pat.as_ref();
            builder.add(compile_glob(pat)?);
            kept.push(pat.to_string());
            dot.push(is_hidden(&normalize_pattern(pat)));
        }
        let set = builder
            .build()
            .map_err(|e| StaleError::ConfigError(format!("building glob set: {e}")))?;
        Ok(Self {
            patterns: kept,
            dot,
            set,
        })
    }

    /// A set that matches nothing.
    pub fn empty() -> Self {
        Self {
            patterns: Vec::new(),
            dot: Vec::new(),
            set: GlobSet::empty(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns true if `rel_path` (relative, forward slashes) matches any
    /// pattern in the set.
    pub fn is_match(&self, rel_path: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        if !is_hidden(rel_path) {
            return self.set.is_match(rel_path);
        }
        !self.matches(rel_path).is_empty()
    }

    /// Indices (in insertion order) of every pattern matching `rel_path`.
    pub fn matches(&self, rel_path: &str) -> Vec<usize> {
        let mut hits = self.set.matches(rel_path);
        if is_hidden(rel_path) {
            hits.retain(|&idx| self.dot[idx]);
        }
        hits
    }
}

/// True if any `/`-separated segment starts with a dot.
fn is_hidden(path: &str) -> bool {
    path.split('/').any(|seg| seg.starts_with('.'))
}

/// Validate and compile a single pattern.
pub fn compile_glob(pattern: &str) -> Result<Glob> {
    let normalized = normalize_pattern(pattern);
    if normalized.trim().is_empty() {
        return Err(StaleError::ConfigError(format!(
            "empty glob pattern: {pattern:?}"
        )));
    }
    GlobBuilder::new(&normalized)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map_err(|e| StaleError::ConfigError(format!("invalid glob pattern {pattern:?}: {e}")))
}

fn normalize_pattern(pattern: &str) -> String {
    let mut p = pattern;
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_stays_within_segment() {
        let set = PatternSet::new(["folder/*"]).unwrap();
        assert!(set.is_match("folder/file3.txt"));
        assert!(!set.is_match("folder/deeper/file.txt"));
        assert!(!set.is_match("file1.txt"));
    }

    #[test]
    fn double_star_crosses_segments() {
        let set = PatternSet::new(["pages/**"]).unwrap();
        assert!(set.is_match("pages/a.md"));
        assert!(set.is_match("pages/blog/2024/post.md"));
        assert!(!set.is_match("layout/base.html"));

        let all = PatternSet::new(["**/*.txt"]).unwrap();
        assert!(all.is_match("file1.txt"));
        assert!(all.is_match("folder/file3.txt"));
    }

    #[test]
    fn matching_ignores_case_but_keeps_pattern_text() {
        let set = PatternSet::new(["FILE2.*"]).unwrap();
        assert!(set.is_match("file2.txt"));
        assert_eq!(set.patterns(), ["FILE2.*".to_string()]);
    }

    #[test]
    fn alternation_is_supported() {
        let set = PatternSet::new(["{file1,file2}.txt"]).unwrap();
        assert!(set.is_match("file1.txt"));
        assert!(set.is_match("file2.txt"));
        assert!(!set.is_match("skip.txt"));
    }

    #[test]
    fn leading_dot_slash_is_ignored() {
        let set = PatternSet::new(["./folder/*"]).unwrap();
        assert!(set.is_match("folder/file3.txt"));
    }

    #[test]
    fn wildcards_skip_hidden_segments() {
        let set = PatternSet::new(["**"]).unwrap();
        assert!(set.is_match("a.md"));
        assert!(set.is_match("pages/a.md"));
        assert!(!set.is_match(".hidden"));
        assert!(!set.is_match(".git/HEAD"));
        assert!(!set.is_match("pages/.draft.md"));
    }

    #[test]
    fn explicit_dot_segment_matches_hidden_paths() {
        let set = PatternSet::new(["**/*.md", ".staleset/*"]).unwrap();
        assert_eq!(set.matches(".staleset/last-run"), vec![1]);
        assert_eq!(set.matches("notes.md"), vec![0]);
        assert!(set.is_match(".staleset/last-run"));
    }

    #[test]
    fn empty_and_invalid_patterns_are_config_errors() {
        assert!(matches!(
            PatternSet::new([""]),
            Err(StaleError::ConfigError(_))
        ));
        assert!(matches!(
            PatternSet::new(["a/[b"]),
            Err(StaleError::ConfigError(_))
        ));
    }

    #[test]
    fn empty_set_matches_nothing() {
        let set = PatternSet::empty();
        assert!(set.is_empty());
        assert!(!set.is_match("anything"));
    }
}
