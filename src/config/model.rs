// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::enumerate::FindOptions;
use crate::store::TIMESTAMP_FILE_PATH;
use crate::trigger::{DestinationSpec, TriggerMap};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// root = "content"
/// state_file = ".staleset/last-run"
///
/// [select]
/// pattern = ["**/*.md"]
/// ignore = ["drafts/**"]
///
/// [triggers]
/// "layout/*" = "pages/**"
/// "partials/*" = ["pages/**", "index.md"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub select: SelectSection,

    /// Source pattern -> destination pattern(s).
    #[serde(default)]
    pub triggers: BTreeMap<String, RawDestination>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Content root, relative to the config file's directory.
    #[serde(default = "default_root")]
    pub root: String,

    /// Where the last-run timestamp lives, relative to `root`.
    #[serde(default = "default_state_file")]
    pub state_file: String,
}

fn default_root() -> String {
    ".".to_string()
}

fn default_state_file() -> String {
    TIMESTAMP_FILE_PATH.to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            state_file: default_state_file(),
        }
    }
}

/// `[select]` section: which files under `root` are candidates.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectSection {
    #[serde(default = "default_pattern")]
    pub pattern: Vec<String>,

    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_pattern() -> Vec<String> {
    vec!["**".to_string()]
}

impl Default for SelectSection {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            ignore: Vec::new(),
        }
    }
}

/// A trigger destination as written in TOML: one pattern or a list.
///
/// Callback destinations only exist in code.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawDestination {
    One(String),
    Many(Vec<String>),
}

impl From<RawDestination> for DestinationSpec {
    fn from(raw: RawDestination) -> Self {
        match raw {
            RawDestination::One(p) => DestinationSpec::Pattern(p),
            RawDestination::Many(ps) => DestinationSpec::Patterns(ps),
        }
    }
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    root: PathBuf,
    state_file: PathBuf,
    select: SelectSection,
    triggers: TriggerMap,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        let mut triggers = TriggerMap::new();
        for (source, dest) in raw.triggers {
            triggers.insert(source, DestinationSpec::from(dest));
        }
        Self {
            root: PathBuf::from(raw.config.root),
            state_file: PathBuf::from(raw.config.state_file),
            select: raw.select,
            triggers,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn state_file(&self) -> &PathBuf {
        &self.state_file
    }

    pub fn select_section(&self) -> &SelectSection {
        &self.select
    }

    pub fn triggers(&self) -> &TriggerMap {
        &self.triggers
    }

    /// Enumeration options for the candidate walk.
    pub fn find_options(&self) -> FindOptions {
        FindOptions {
            pattern: self.select.pattern.clone(),
            ignore: self.select.ignore.clone(),
            filter: None,
        }
    }
}
