// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `staleset`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "staleset",
    version,
    about = "List the files that changed, or were triggered, since the last run.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Staleset.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Do not advance the stored timestamp after listing.
    #[arg(long)]
    pub no_commit: bool,

    /// Walk this directory (relative to the content root) as a whole tree,
    /// treating `[triggers]` as dependency rules.
    #[arg(long, value_name = "DIR")]
    pub tree: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STALESET_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the resolved config, but don't touch the
    /// content tree or the stored timestamp.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
