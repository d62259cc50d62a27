// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, StaleError};
use crate::pattern::PatternSet;
use crate::trigger::{DestinationSpec, TriggerMap};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::StaleError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_select(cfg)?;
    validate_triggers(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.root.trim().is_empty() {
        return Err(StaleError::ConfigError(
            "[config].root must not be empty".to_string(),
        ));
    }
    if cfg.config.state_file.trim().is_empty() {
        return Err(StaleError::ConfigError(
            "[config].state_file must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_select(cfg: &RawConfigFile) -> Result<()> {
    if cfg.select.pattern.is_empty() {
        return Err(StaleError::ConfigError(
            "[select].pattern must contain at least one glob".to_string(),
        ));
    }
    PatternSet::new(&cfg.select.pattern)?;
    PatternSet::new(&cfg.select.ignore)?;
    Ok(())
}

fn validate_triggers(cfg: &RawConfigFile) -> Result<()> {
    for (source, dest) in cfg.triggers.iter() {
        TriggerMap::new()
            .with(source.clone(), DestinationSpec::from(dest.clone()))
            .validate()
            .map_err(|e| StaleError::ConfigError(format!("[triggers] '{source}': {e}")))?;
    }
    Ok(())
}
