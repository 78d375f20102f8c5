//! `enable` and `disable`: turn recording on or off for a repository.
//!
//! Enabling lays out the store and drops a default config template next
//! to it. Disabling only writes a marker; recorded history stays intact
//! and queryable.

use anyhow::{Context, Result};

use crate::cli::{AppContext, DisableArgs, EnableArgs};
use crate::core::errors::WhenceError;
use crate::infra::config;
use crate::infra::git;
use crate::infra::store::RecordStore;

pub fn enable_run(args: EnableArgs, ctx: &AppContext) -> Result<()> {
    let start = args
        .path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", args.path.display()))?;
    let meta =
        git::detect_repo(&start).map_err(|_| WhenceError::VcsUnavailable(start.display().to_string()))?;

    let cfg = config::load_config(&meta.top_level)?;
    let store = RecordStore::init(&meta.top_level, &cfg.store_dir)?;
    config::write_default(&meta.top_level, &cfg.store_dir)?;

    if !ctx.quiet {
        println!(
            "recording enabled; store at {}",
            store.root().display()
        );
    }
    Ok(())
}

pub fn disable_run(args: DisableArgs, ctx: &AppContext) -> Result<()> {
    let start = args
        .path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", args.path.display()))?;
    let meta =
        git::detect_repo(&start).map_err(|_| WhenceError::VcsUnavailable(start.display().to_string()))?;

    let cfg = config::load_config(&meta.top_level)?;
    let store = RecordStore::open(&meta.top_level, &cfg.store_dir)?;
    store.disable()?;

    if !ctx.quiet {
        println!("recording disabled; history kept and still queryable");
    }
    Ok(())
}
