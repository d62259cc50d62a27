// src/lib.rs

pub mod cli;
pub mod config;
pub mod enumerate;
pub mod errors;
pub mod filter;
pub mod fs;
pub mod logging;
pub mod pattern;
pub mod select;
pub mod store;
pub mod tree;
pub mod trigger;
pub mod types;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Result;
use futures::StreamExt;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::enumerate::find_by_glob;
use crate::fs::{FileSystem, RealFileSystem};
use crate::store::{FileTimestampStore, MemoryTimestampStore, TimestampStore};
use crate::types::RelPath;

pub use crate::errors::StaleError;
pub use crate::select::IncrementalSelector;
pub use crate::tree::DependencyTreeBuilder;
pub use crate::trigger::{
    ActivatedPatterns, DependencyMap, DestinationSpec, Targets, TriggerMap, TriggerResolver,
};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - candidate enumeration under the content root
/// - the timestamp store
/// - either the incremental selector or the tree builder (`--tree`)
///
/// Stale paths are written to stdout, one per line.
pub async fn run(args: CliArgs) -> Result<()> {
    run_with_output(args, &mut std::io::stdout()).await
}

/// Same as [`run`], writing the stale paths to `out`.
pub async fn run_with_output<W: Write + Send>(args: CliArgs, out: &mut W) -> Result<()> {
    let config_path = args.config.clone();
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let root = config_root_dir(&config_path).join(cfg.root());
    let state_file = root.join(cfg.state_file());
    let state_rel = RelPath::from_path(&root, &state_file);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    let file_store = FileTimestampStore::at(Arc::clone(&fs), state_file);
    let mut store: Box<dyn TimestampStore> = if args.no_commit {
        // Seed from disk but never write back.
        Box::new(match file_store.load()? {
            Some(last) => MemoryTimestampStore::with_last(last),
            None => MemoryTimestampStore::new(),
        })
    } else {
        Box::new(file_store)
    };

    // The state file is rewritten on every run; it must never be a
    // candidate nor fire a trigger.
    let not_state_file = move |p: &RelPath| state_rel.as_ref() != Some(p);

    if let Some(dir) = args.tree.as_deref() {
        let now = SystemTime::now();
        let since = store.get().await?;
        let mut stale = DependencyTreeBuilder::new(Arc::clone(&fs), &root)
            .since(since)
            .dependencies(cfg.triggers().clone())
            .filter(not_state_file)
            .tree(dir)
            .await?;
        stale.sort();

        for path in &stale {
            writeln!(out, "{path}")?;
        }
        store.set(now)?;
        info!(count = stale.len(), dir, "tree listing complete");
        return Ok(());
    }

    let options = cfg.find_options().filter(not_state_file.clone());
    let candidates = find_by_glob(Arc::clone(&fs), &root, options)?;

    let selector = IncrementalSelector::new(fs, &root)
        .with_triggers(cfg.triggers().clone())
        .with_source_filter(not_state_file);
    let mut stale = pin!(selector.select_iter(candidates, store.as_mut())?);
    while let Some(path) = stale.next().await {
        writeln!(out, "{}", path?)?;
    }

    debug!(root = ?root, "selection finished");
    Ok(())
}

/// Figure out the directory relative paths in the config resolve against.
///
/// - If the config path has a non-empty parent (e.g. "site/Staleset.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Staleset.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Simple dry-run output: print the resolved selection and trigger rules.
fn print_dry_run(cfg: &ConfigFile) {
    println!("staleset dry-run");
    println!("  config.root = {:?}", cfg.root());
    println!("  config.state_file = {:?}", cfg.state_file());
    println!("  select.pattern = {:?}", cfg.select_section().pattern);
    if !cfg.select_section().ignore.is_empty() {
        println!("  select.ignore = {:?}", cfg.select_section().ignore);
    }
    println!();

    println!("triggers ({}):", cfg.triggers().len());
    for (source, dest) in cfg.triggers().iter() {
        println!("  - {source} -> {dest:?}");
    }

    debug!("dry-run complete (nothing scanned)");
}
