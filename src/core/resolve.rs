//! Top-level attribution: combine simulation, checkpoint replay, blame
//! reconciliation, and hash verification into one adjustment per record.
//!
//! Adjustments are pure functions of (records, current file bytes, blame);
//! nothing here is durable and resolving twice yields equal maps.

use std::path::Path;

use camino::Utf8Path;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::core::checkpoint::{self, ChainEntry};
use crate::core::lineset::LineSet;
use crate::core::record::{EditRecord, Tool};
use crate::core::simulate::simulate;
use crate::core::verify::{MAX_SEARCH, VerifyOutcome, verify};
use crate::infra::git;
use crate::infra::io::FileText;
use crate::infra::store::RecordStore;

/// How confidently the reported lines were tied to the recorded content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// The content hash was confirmed at the reported position.
    Exact,
    /// The record survives but hash verification was bypassed
    /// (Write records, blame-only survivals).
    Changed,
    /// Hash-less legacy record; nothing to confirm against.
    Unknown,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Changed => "changed",
            MatchKind::Unknown => "unknown",
        }
    }
}

/// Where a record's content sits in the current file, if anywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineAdjustment {
    pub current_lines: LineSet,
    pub superseded: bool,
    pub match_kind: MatchKind,
}

impl LineAdjustment {
    fn superseded(match_kind: MatchKind) -> Self {
        Self {
            current_lines: LineSet::default(),
            superseded: true,
            match_kind,
        }
    }
}

/// A record together with the snapshot hashes the store holds for it
/// (pending records only).
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub record: EditRecord,
    pub pre_hash: Option<String>,
    pub post_hash: Option<String>,
}

impl FileRecord {
    pub fn committed(record: EditRecord) -> Self {
        Self {
            record,
            pre_hash: None,
            post_hash: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Outward hash-search bound, in lines.
    pub search_radius: u32,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            search_radius: MAX_SEARCH,
        }
    }
}

pub struct Resolver<'a> {
    repo_root: &'a Path,
    store: &'a RecordStore,
    opts: ResolveOptions,
}

impl<'a> Resolver<'a> {
    pub fn new(repo_root: &'a Path, store: &'a RecordStore, opts: ResolveOptions) -> Self {
        Self {
            repo_root,
            store,
            opts,
        }
    }

    /// Resolve every record of one file against the current working tree.
    ///
    /// The result maps `EditRecord::key()` to an adjustment, in ascending
    /// timestamp order. Per-file degradations (no blame, unreadable file)
    /// are logged and absorbed; this never fails a query.
    pub fn resolve_file(
        &self,
        file: &Utf8Path,
        records: &[FileRecord],
    ) -> IndexMap<String, LineAdjustment> {
        // Ascending (ts, manifest, seq): the order simulation requires.
        let mut sorted: Vec<&FileRecord> = records.iter().collect();
        sorted.sort_by(|a, b| a.record.order_key().cmp(&b.record.order_key()));
        let sorted_records: Vec<EditRecord> = sorted.iter().map(|fr| fr.record.clone()).collect();

        let sim = simulate(&sorted_records);

        let abs = self.repo_root.join(file.as_std_path());
        let content = match FileText::load(&abs) {
            Ok(text) => Some(text),
            Err(err) => {
                warn!(file = %file, "current file unreadable: {err:#}");
                None
            }
        };

        // Unreadable file: the content is gone, and so is every edit.
        let Some(content) = content else {
            return sorted_records
                .iter()
                .map(|r| (r.key(), LineAdjustment::superseded(MatchKind::Unknown)))
                .collect();
        };

        let blame = match git::blame_file(self.repo_root, file) {
            Ok(map) => Some(map),
            Err(err) => {
                debug!(file = %file, "blame unavailable: {err:#}");
                None
            }
        };

        let checkpointed = self.replay_pending(file, &sorted, &content);

        // A later Write supersedes everything before it, unconditionally.
        let last_write = sorted_records.iter().rposition(|r| r.tool == Tool::Write);

        let mut adjustments: Vec<LineAdjustment> = Vec::with_capacity(sorted.len());
        for (i, record) in sorted_records.iter().enumerate() {
            if let Some(w) = last_write
                && i < w
            {
                adjustments.push(LineAdjustment::superseded(MatchKind::Unknown));
                continue;
            }

            // Checkpoint replay, when it produced a result, wins outright.
            if let Some(outcome) = checkpointed.get(&i) {
                let match_kind = if record.content_hash.is_empty() {
                    MatchKind::Unknown
                } else {
                    MatchKind::Exact
                };
                adjustments.push(LineAdjustment {
                    current_lines: outcome.lines.clone(),
                    superseded: outcome.superseded,
                    match_kind,
                });
                continue;
            }

            let candidate = if record.is_pending() {
                sim[i].lines.clone()
            } else {
                crate::core::reconcile::reconcile(record, &sim[i].lines, blame.as_ref())
            };

            let adjustment =
                match verify(record, &candidate, Some(&content), self.opts.search_radius) {
                    VerifyOutcome::Verified(lines) => LineAdjustment {
                        current_lines: lines,
                        superseded: false,
                        match_kind: MatchKind::Exact,
                    },
                    VerifyOutcome::Bypassed(lines) => {
                        let superseded = lines.is_empty();
                        LineAdjustment {
                            current_lines: lines,
                            superseded,
                            match_kind: if record.content_hash.is_empty() {
                                MatchKind::Unknown
                            } else {
                                MatchKind::Changed
                            },
                        }
                    }
                    VerifyOutcome::Superseded => LineAdjustment::superseded(MatchKind::Unknown),
                };
            adjustments.push(adjustment);
        }

        enforce_mutual_exclusion(&mut adjustments);

        sorted_records
            .iter()
            .zip(adjustments)
            .map(|(r, adj)| (r.key(), adj))
            .collect()
    }

    // Build and replay the pending checkpoint chain. Indices in the result
    // refer to positions in `sorted`.
    fn replay_pending(
        &self,
        file: &Utf8Path,
        sorted: &[&FileRecord],
        content: &FileText,
    ) -> IndexMap<usize, checkpoint::ChainOutcome> {
        let pending: Vec<usize> = sorted
            .iter()
            .enumerate()
            .filter(|(_, fr)| fr.record.is_pending())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return IndexMap::new();
        }

        let chain: Vec<ChainEntry<'_>> = pending
            .iter()
            .map(|&i| ChainEntry {
                record: &sorted[i].record,
                pre: self.read_snapshot(sorted[i].pre_hash.as_deref()),
                post: self.read_snapshot(sorted[i].post_hash.as_deref()),
            })
            .collect();
        if chain.iter().all(|e| e.post.is_none()) {
            return IndexMap::new();
        }

        let base = git::show_file(self.repo_root, "HEAD", file).ok();
        checkpoint::replay(base.as_deref(), content.as_str(), &chain)
            .into_iter()
            .map(|(chain_idx, outcome)| (pending[chain_idx], outcome))
            .collect()
    }

    fn read_snapshot(&self, hash: Option<&str>) -> Option<String> {
        let hash = hash?;
        match self.store.read_blob(hash) {
            Ok(blob) => blob,
            Err(err) => {
                warn!("snapshot blob {hash} unreadable: {err:#}");
                None
            }
        }
    }
}

/// No two surviving records may claim the same current line: the newer
/// record wins the overlap, and a record that loses every line becomes
/// superseded. `adjustments` is in ascending timestamp order.
fn enforce_mutual_exclusion(adjustments: &mut [LineAdjustment]) {
    let mut claimed = LineSet::default();
    for adj in adjustments.iter_mut().rev() {
        if adj.superseded {
            continue;
        }
        let kept = adj.current_lines.difference(&claimed);
        if kept.is_empty() && !adj.current_lines.is_empty() {
            adj.current_lines = LineSet::default();
            adj.superseded = true;
            continue;
        }
        claimed = claimed.union(&kept);
        adj.current_lines = kept;
    }
}
