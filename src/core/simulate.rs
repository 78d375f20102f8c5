//! Forward simulation: where an edit's originally-written lines currently
//! reside, given only the later recorded edits' hunks.
//!
//! Manual edits invisible to the record stream are not modelled here; the
//! hash verifier and blame reconciler correct for those downstream.

use crate::core::lineset::LineSet;
use crate::core::record::{EditRecord, Hunk, Tool};

/// Simulator output for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimOutcome {
    /// Predicted current positions of the record's lines.
    pub lines: LineSet,
    /// True once a later edit overwrote or dominated the record entirely.
    pub superseded: bool,
}

impl SimOutcome {
    fn superseded() -> Self {
        Self {
            lines: LineSet::default(),
            superseded: true,
        }
    }
}

/// Propagate each record's line set through every later record's hunk.
///
/// `records` must be sorted ascending by `EditRecord::order_key`. The
/// result is index-aligned with the input.
pub fn simulate(records: &[EditRecord]) -> Vec<SimOutcome> {
    debug_assert!(
        records.windows(2).all(|w| w[0].order_key() <= w[1].order_key()),
        "simulate requires records sorted by (ts, manifest, seq)"
    );

    (0..records.len())
        .map(|i| simulate_one(&records[i], &records[i + 1..]))
        .collect()
}

fn simulate_one(record: &EditRecord, later: &[EditRecord]) -> SimOutcome {
    let mut cur = record.lines.clone();
    if cur.is_empty() {
        return SimOutcome::superseded();
    }

    for next in later {
        if next.tool == Tool::Write {
            return SimOutcome::superseded();
        }
        // Legacy records without hunk data contribute no shift.
        let Some(hunk) = next.hunk else { continue };

        cur = apply_hunk(&cur, &hunk);
        if cur.is_empty() {
            return SimOutcome::superseded();
        }
    }

    SimOutcome {
        lines: cur,
        superseded: false,
    }
}

/// Transform a line set through one later hunk: lines above the hunk stay,
/// lines inside are overwritten (dropped), lines below shift by the net
/// delta. A zero-`old_lines` hunk is a pure insertion and drops nothing.
fn apply_hunk(cur: &LineSet, hunk: &Hunk) -> LineSet {
    let start = hunk.old_start;

    if hunk.old_lines == 0 {
        let shift = hunk.new_lines;
        return LineSet::new(cur.iter().map(|l| if l >= start { l + shift } else { l }));
    }

    let end = start + hunk.old_lines - 1;
    let delta = hunk.delta();
    LineSet::new(cur.iter().filter_map(|l| {
        if l < start {
            Some(l)
        } else if l <= end {
            None
        } else {
            u32::try_from(i64::from(l) + delta).ok().filter(|&n| n > 0)
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn edit(ts_sec: u32, lines: LineSet, hunk: Option<Hunk>, tool: Tool) -> EditRecord {
        EditRecord {
            file: Utf8PathBuf::from("f.rs"),
            lines,
            hunk,
            content_hash: String::new(),
            tool,
            ts: format!("2026-01-01T00:00:{ts_sec:02}Z").parse().unwrap(),
            commit_sha: String::new(),
            manifest_id: format!("m{ts_sec}"),
            seq: 0,
            author: String::new(),
            session: String::new(),
            prompt: String::new(),
            reason: String::new(),
            change: String::new(),
            trace: String::new(),
        }
    }

    fn hunk(old_start: u32, old_lines: u32, new_start: u32, new_lines: u32) -> Hunk {
        Hunk {
            old_start,
            old_lines,
            new_start,
            new_lines,
        }
    }

    #[test]
    fn pure_insertion_shifts_lines_at_or_below() {
        // Insert 3 lines at line 1; an earlier edit at 3-5 lands at 6-8.
        let records = vec![
            edit(0, LineSet::from_range(3, 5), Some(hunk(3, 3, 3, 3)), Tool::Edit),
            edit(1, LineSet::from_range(1, 3), Some(hunk(1, 0, 1, 3)), Tool::Edit),
        ];
        let out = simulate(&records);
        assert_eq!(out[0].lines.to_string(), "6-8");
        assert!(!out[0].superseded);
        assert_eq!(out[1].lines.to_string(), "1-3");
    }

    #[test]
    fn overlap_drops_covered_lines() {
        // Later edit replaces line 4 only; 3 and 5 survive with no shift.
        let records = vec![
            edit(0, LineSet::from_range(3, 5), Some(hunk(3, 3, 3, 3)), Tool::Edit),
            edit(1, LineSet::new([4]), Some(hunk(4, 1, 4, 1)), Tool::Edit),
        ];
        let out = simulate(&records);
        assert_eq!(out[0].lines.to_string(), "3,5");
    }

    #[test]
    fn full_overwrite_supersedes() {
        let records = vec![
            edit(0, LineSet::from_range(3, 5), Some(hunk(3, 3, 3, 3)), Tool::Edit),
            edit(1, LineSet::from_range(2, 8), Some(hunk(2, 7, 2, 4)), Tool::Edit),
        ];
        let out = simulate(&records);
        assert!(out[0].superseded);
        assert!(out[0].lines.is_empty());
    }

    #[test]
    fn shrink_below_shifts_up() {
        // Replace lines 1-4 by a single line: delta -3, edit at 6-7 -> 3-4.
        let records = vec![
            edit(0, LineSet::from_range(6, 7), Some(hunk(6, 2, 6, 2)), Tool::Edit),
            edit(1, LineSet::new([1]), Some(hunk(1, 4, 1, 1)), Tool::Edit),
        ];
        let out = simulate(&records);
        assert_eq!(out[0].lines.to_string(), "3-4");
    }

    #[test]
    fn write_dominates_everything_earlier() {
        let records = vec![
            edit(0, LineSet::from_range(1, 2), Some(hunk(1, 2, 1, 2)), Tool::Edit),
            edit(1, LineSet::from_range(5, 6), Some(hunk(5, 2, 5, 2)), Tool::Edit),
            edit(2, LineSet::from_range(1, 9), None, Tool::Write),
        ];
        let out = simulate(&records);
        assert!(out[0].superseded);
        assert!(out[1].superseded);
        assert!(!out[2].superseded);
        assert_eq!(out[2].lines.to_string(), "1-9");
    }

    #[test]
    fn hunkless_records_contribute_no_shift() {
        let records = vec![
            edit(0, LineSet::from_range(3, 5), Some(hunk(3, 3, 3, 3)), Tool::Edit),
            edit(1, LineSet::from_range(1, 2), None, Tool::Edit),
        ];
        let out = simulate(&records);
        assert_eq!(out[0].lines.to_string(), "3-5");
    }
}
