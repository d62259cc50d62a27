use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use filetime::FileTime;
use staleset::config::{ConfigFile, RawConfigFile, RawDestination};
use tempfile::TempDir;

/// A content tree on disk with controlled modification times.
///
/// The directory is removed when the fixture is dropped.
pub struct ContentTree {
    dir: TempDir,
}

impl ContentTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Create `rel` (and its parents) with `mtime`.
    pub fn file(self, rel: &str, mtime: SystemTime) -> Self {
        self.write(rel, mtime);
        self
    }

    /// Create an empty directory.
    pub fn dir(self, rel: &str) -> Self {
        fs::create_dir_all(self.path(rel)).expect("create dir");
        self
    }

    pub fn write(&self, rel: &str, mtime: SystemTime) {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, rel.as_bytes()).expect("write fixture file");
        self.touch(rel, mtime);
    }

    /// Set the mtime of an existing file.
    pub fn touch(&self, rel: &str, mtime: SystemTime) {
        filetime::set_file_mtime(self.path(rel), FileTime::from_system_time(mtime))
            .expect("set mtime");
    }
}

impl Default for ContentTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile::default(),
        }
    }

    pub fn root(mut self, root: &str) -> Self {
        self.config.config.root = root.to_string();
        self
    }

    pub fn state_file(mut self, path: &str) -> Self {
        self.config.config.state_file = path.to_string();
        self
    }

    pub fn pattern(mut self, patterns: &[&str]) -> Self {
        self.config.select.pattern = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn ignore(mut self, pattern: &str) -> Self {
        self.config.select.ignore.push(pattern.to_string());
        self
    }

    pub fn trigger(mut self, source: &str, dest: &str) -> Self {
        self.config
            .triggers
            .insert(source.to_string(), RawDestination::One(dest.to_string()));
        self
    }

    pub fn trigger_many(mut self, source: &str, dests: &[&str]) -> Self {
        self.config.triggers.insert(
            source.to_string(),
            RawDestination::Many(dests.iter().map(|d| d.to_string()).collect()),
        );
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Render the config as TOML, for tests that go through the loader.
    pub fn to_toml(&self) -> String {
        let cfg = &self.config;
        let mut out = String::new();
        out.push_str("[config]\n");
        out.push_str(&format!("root = {:?}\n", cfg.config.root));
        out.push_str(&format!("state_file = {:?}\n\n", cfg.config.state_file));
        out.push_str("[select]\n");
        out.push_str(&format!("pattern = {:?}\n", cfg.select.pattern));
        out.push_str(&format!("ignore = {:?}\n\n", cfg.select.ignore));
        out.push_str("[triggers]\n");
        let triggers: &BTreeMap<String, RawDestination> = &cfg.triggers;
        for (source, dest) in triggers {
            match dest {
                RawDestination::One(p) => out.push_str(&format!("{source:?} = {p:?}\n")),
                RawDestination::Many(ps) => out.push_str(&format!("{source:?} = {ps:?}\n")),
            }
        }
        out
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
