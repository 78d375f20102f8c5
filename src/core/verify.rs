//! Hash verification of predicted line positions.
//!
//! The simulator only sees recorded hunks; humans shift files without
//! leaving any. Verification re-anchors a record by hashing the block at
//! the predicted position and, on mismatch, searching outward for the
//! block before declaring the content gone.

use crate::core::lineset::LineSet;
use crate::core::record::{EditRecord, Tool, matches_hash};
use crate::infra::io::FileText;

/// Bound on the outward search. Cost is O(search x block size), small
/// even on large files.
pub const MAX_SEARCH: u32 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// The block hash matched at these positions.
    Verified(LineSet),
    /// Verification does not apply to this record; candidate unchanged.
    Bypassed(LineSet),
    /// The recorded content is nowhere near its predicted position.
    Superseded,
}

impl VerifyOutcome {
    pub fn lines(&self) -> LineSet {
        match self {
            VerifyOutcome::Verified(l) | VerifyOutcome::Bypassed(l) => l.clone(),
            VerifyOutcome::Superseded => LineSet::default(),
        }
    }
}

/// Confirm that `candidate` still carries `record`'s content, searching up
/// to `search_radius` lines in both directions when it does not.
///
/// Records with an empty hash, `Write` records, and degenerate hunks
/// bypass verification entirely. `content` is `None` when the current
/// file is unreadable, which counts as "content gone".
pub fn verify(
    record: &EditRecord,
    candidate: &LineSet,
    content: Option<&FileText>,
    search_radius: u32,
) -> VerifyOutcome {
    if record.content_hash.is_empty() || record.tool == Tool::Write {
        return VerifyOutcome::Bypassed(candidate.clone());
    }
    let block_len = match record.hunk {
        Some(h) if h.new_lines > 0 => h.new_lines,
        _ => return VerifyOutcome::Bypassed(candidate.clone()),
    };

    let center = match candidate.min() {
        Some(l) => l,
        None => record.hunk.map(|h| h.new_start).unwrap_or(0),
    };
    if center == 0 {
        return VerifyOutcome::Bypassed(candidate.clone());
    }

    let Some(text) = content else {
        return VerifyOutcome::Superseded;
    };

    // Exact position first.
    if block_matches(text, center, block_len, &record.content_hash) {
        return VerifyOutcome::Verified(LineSet::from_range(center, center + block_len - 1));
    }

    // Search outward, below before above.
    let total = u32::try_from(text.line_count()).unwrap_or(u32::MAX);
    for offset in 1..=search_radius {
        for cand in [center.checked_add(offset), center.checked_sub(offset)] {
            let Some(cand) = cand else { continue };
            if cand >= 1
                && cand + block_len - 1 <= total
                && block_matches(text, cand, block_len, &record.content_hash)
            {
                return VerifyOutcome::Verified(LineSet::from_range(cand, cand + block_len - 1));
            }
        }
    }

    VerifyOutcome::Superseded
}

fn block_matches(text: &FileText, start: u32, len: u32, recorded: &str) -> bool {
    let end = start + len - 1;
    match text.join_lines(start as usize, end as usize) {
        Some(block) => matches_hash(&block, recorded),
        None => false,
    }
}
