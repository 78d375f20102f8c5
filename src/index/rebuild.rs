//! Staleness detection and deterministic index rebuild.
//!
//! The index is stale iff git HEAD, the store tip, or the pending count
//! moved since the last rebuild. Rebuilds iterate manifests in id order,
//! then pending records in (ts, file) order, numbering rows from 1, so
//! two rebuilds of the same state are byte-identical. There is no lock:
//! a racing rebuild from another process just causes the loser to rebuild
//! again, to the same bytes.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::index::{IndexRow, QueryIndex};
use crate::infra::store::RecordStore;

const META_VERSION: u32 = 1;

/// The three inputs whose movement invalidates the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub head_sha: String,
    pub store_tip: String,
    pub pending_count: usize,
}

impl IndexMeta {
    pub fn is_stale(&self, head_sha: &str, store_tip: &str, pending_count: usize) -> bool {
        self.version != META_VERSION
            || self.head_sha != head_sha
            || self.store_tip != store_tip
            || self.pending_count != pending_count
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RebuildOptions {
    /// Backfill empty `reason` columns from the prompt's first line.
    pub fill_reasons: bool,
    /// Show a progress bar while iterating manifests.
    pub progress: bool,
}

pub fn index_dir(store: &RecordStore) -> PathBuf {
    store.root().join("index")
}

fn rows_path(dir: &Path) -> PathBuf {
    dir.join("rows.jsonl")
}

fn meta_path(dir: &Path) -> PathBuf {
    dir.join("meta.json")
}

pub fn read_meta(dir: &Path) -> Result<IndexMeta> {
    let content = std::fs::read_to_string(meta_path(dir)).context("Failed to read index meta")?;
    serde_json::from_str(&content).context("Failed to parse index meta")
}

/// Load a fresh index, rebuilding when forced, stale, or unreadable.
pub fn ensure_fresh(
    store: &RecordStore,
    head_sha: &str,
    force: bool,
    opts: RebuildOptions,
) -> Result<QueryIndex> {
    let dir = index_dir(store);
    let store_tip = store.branch_tip_sha()?;
    let pending_count = store.pending_count()?;

    if !force {
        match read_meta(&dir) {
            Ok(meta) if !meta.is_stale(head_sha, &store_tip, pending_count) => {
                match QueryIndex::load(&rows_path(&dir)) {
                    Ok(index) => return Ok(index),
                    Err(err) => warn!("index unreadable, rebuilding: {err:#}"),
                }
            }
            Ok(_) => debug!("index stale, rebuilding"),
            Err(err) => debug!("no usable index meta ({err:#}), rebuilding"),
        }
    }

    rebuild(store, head_sha, &store_tip, pending_count, opts)
}

/// Rebuild from the record store and persist atomically.
fn rebuild(
    store: &RecordStore,
    head_sha: &str,
    store_tip: &str,
    pending_count: usize,
    opts: RebuildOptions,
) -> Result<QueryIndex> {
    let manifest_ids = store.list_manifests()?;

    let bar = if opts.progress {
        let bar = ProgressBar::new(manifest_ids.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message("rebuilding index");
        Some(bar)
    } else {
        None
    };

    let mut rows: Vec<IndexRow> = Vec::new();
    let mut next_id = 1u64;

    for id in &manifest_ids {
        let manifest = match store.read_manifest(id) {
            Ok(m) => m,
            Err(err) => {
                // A single bad manifest degrades coverage, not the query.
                warn!("dropping unreadable manifest {id}: {err:#}");
                continue;
            }
        };
        for record in &manifest.records {
            rows.push(IndexRow::from_record(next_id, record));
            next_id += 1;
        }
        if let Some(bar) = &bar {
            bar.inc(1);
        }
    }

    for pending in store.read_all_pending()? {
        rows.push(IndexRow::from_record(next_id, &pending.record));
        next_id += 1;
    }

    if opts.fill_reasons {
        for row in &mut rows {
            if row.reason.is_empty()
                && let Some(first) = row.prompt.lines().next()
            {
                row.reason = first.to_string();
            }
        }
    }

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let dir = index_dir(store);
    std::fs::create_dir_all(&dir).context("Failed to create index directory")?;
    write_rows(&dir, &rows)?;
    write_meta(
        &dir,
        &IndexMeta {
            version: META_VERSION,
            head_sha: head_sha.to_string(),
            store_tip: store_tip.to_string(),
            pending_count,
        },
    )?;

    Ok(QueryIndex::from_rows(rows))
}

// Write-temp-then-rename keeps racing readers on a complete file.
fn write_rows(dir: &Path, rows: &[IndexRow]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir).context("Failed to create temp index")?;
    for row in rows {
        let line = serde_json::to_string(row).context("Failed to serialize index row")?;
        writeln!(tmp, "{line}").context("Failed to write index row")?;
    }
    tmp.flush().context("Failed to flush index rows")?;
    tmp.persist(rows_path(dir))
        .context("Failed to persist index rows")?;
    Ok(())
}

fn write_meta(dir: &Path, meta: &IndexMeta) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir).context("Failed to create temp meta")?;
    let content = serde_json::to_string_pretty(meta).context("Failed to serialize index meta")?;
    tmp.write_all(content.as_bytes())
        .context("Failed to write index meta")?;
    tmp.persist(meta_path(dir))
        .context("Failed to persist index meta")?;
    Ok(())
}
