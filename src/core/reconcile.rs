//! Reconciling simulator predictions with git per-line blame.
//!
//! A commit that carried an AI edit may also carry unrelated manual
//! changes; blame alone would credit them all to the edit. Intersecting
//! the simulator's prediction with the commit's blamed lines separates
//! the two. When the simulator and blame disagree entirely, blame wins:
//! it is ground truth for at least some written line, and the simulator
//! most likely missed an unrecorded shift.

use crate::core::lineset::LineSet;
use crate::core::record::EditRecord;
use crate::infra::git::{BlameMap, is_uncommitted};

/// Narrow `sim` using the blame attribution of `record.commit_sha`.
///
/// Pending records and files without blame pass through unchanged; the
/// hash verifier applies the final correction for those.
pub fn reconcile(record: &EditRecord, sim: &LineSet, blame: Option<&BlameMap>) -> LineSet {
    let Some(blame) = blame else {
        return sim.clone();
    };
    if record.is_pending() {
        return sim.clone();
    }

    let blamed = commit_lines(blame, &record.commit_sha);
    let overlap = sim.intersect(&blamed);
    if overlap.is_empty() { blamed } else { overlap }
}

/// Current lines whose blame SHA equals `sha`. Uncommitted lines belong
/// to no commit and never match.
fn commit_lines(blame: &BlameMap, sha: &str) -> LineSet {
    LineSet::new(
        blame
            .iter()
            .filter(|(_, entry)| !is_uncommitted(entry) && entry.sha == sha)
            .map(|(&line, _)| line),
    )
}
