//! Checkpoint replay for pending (uncommitted) edits.
//!
//! Commit-SHA reconciliation needs a commit; pending edits have none.
//! What they do have is a stored pre/post snapshot of the file around
//! each edit. Replaying those snapshots in timestamp order over the HEAD
//! base, then diffing onto the working tree, tells us exactly which
//! pending edit last wrote each current line, no prediction involved.

use indexmap::IndexMap;
use similar::{DiffTag, TextDiff};

use crate::core::lineset::LineSet;
use crate::core::record::{EditRecord, matches_hash};

/// One pending edit plus whatever snapshots the store still holds for it.
#[derive(Debug)]
pub struct ChainEntry<'a> {
    pub record: &'a EditRecord,
    /// File content before the edit; used as the replay base when the
    /// file does not exist at HEAD.
    pub pre: Option<String>,
    /// File content after the edit; an entry without one cannot be
    /// replayed and gets no checkpoint result.
    pub post: Option<String>,
}

/// Replay outcome for one chain entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    pub lines: LineSet,
    pub superseded: bool,
}

/// Attribute each line of `current` to the pending edit that last wrote
/// it, then hash-check the attribution per record.
///
/// `chain` must be in timestamp order. The result maps chain positions to
/// outcomes; entries without a post snapshot are absent, and the caller
/// falls back to simulate + verify for those.
pub fn replay(
    base: Option<&str>,
    current: &str,
    chain: &[ChainEntry<'_>],
) -> IndexMap<usize, ChainOutcome> {
    let mut results = IndexMap::new();
    if chain.is_empty() {
        return results;
    }

    // The replay base: HEAD content, else the first stored pre-image.
    let fallback_base;
    let mut state: &str = match base {
        Some(b) => b,
        None => {
            fallback_base = chain
                .iter()
                .find_map(|e| e.pre.clone())
                .unwrap_or_default();
            &fallback_base
        }
    };

    let mut owners: Vec<Option<usize>> = vec![None; line_slots(state)];
    let mut replayed = Vec::new();

    for (k, entry) in chain.iter().enumerate() {
        let Some(post) = entry.post.as_deref() else {
            continue;
        };
        owners = carry_owners(state, post, &owners, Some(k));
        state = post;
        replayed.push(k);
    }

    // Land on the working tree; lines it introduced belong to nobody.
    let owners = carry_owners(state, current, &owners, None);

    for k in replayed {
        let lines = LineSet::new(
            owners
                .iter()
                .enumerate()
                .filter(|&(_, owner)| *owner == Some(k))
                .map(|(i, _)| (i + 1) as u32),
        );
        results.insert(k, check_attribution(chain[k].record, lines, current));
    }
    results
}

// Attribution is only trusted when the attributed bytes still hash to the
// record's content hash. Hash-less records skip the check.
fn check_attribution(record: &EditRecord, lines: LineSet, current: &str) -> ChainOutcome {
    if lines.is_empty() {
        return ChainOutcome {
            lines,
            superseded: true,
        };
    }
    if !record.content_hash.is_empty() {
        let current_lines: Vec<&str> = current.lines().collect();
        let text = lines
            .iter()
            .filter_map(|l| current_lines.get(l as usize - 1).copied())
            .collect::<Vec<_>>()
            .join("\n");
        if !matches_hash(&text, &record.content_hash) {
            return ChainOutcome {
                lines: LineSet::default(),
                superseded: true,
            };
        }
    }
    ChainOutcome {
        lines,
        superseded: false,
    }
}

/// Map per-line ownership from `old` onto `new`: equal lines keep their
/// owner, inserted lines get `insert_owner`, deleted lines vanish.
fn carry_owners(
    old: &str,
    new: &str,
    old_owners: &[Option<usize>],
    insert_owner: Option<usize>,
) -> Vec<Option<usize>> {
    let diff = TextDiff::from_lines(old, new);
    let mut new_owners = vec![None; line_slots(new)];

    for op in diff.ops() {
        match op.tag() {
            DiffTag::Equal => {
                for i in 0..op.old_range().len() {
                    if let (Some(&owner), Some(slot)) = (
                        old_owners.get(op.old_range().start + i),
                        new_owners.get_mut(op.new_range().start + i),
                    ) {
                        *slot = owner;
                    }
                }
            }
            DiffTag::Insert | DiffTag::Replace => {
                for slot in &mut new_owners[op.new_range()] {
                    *slot = insert_owner;
                }
            }
            DiffTag::Delete => {}
        }
    }
    new_owners
}

fn line_slots(text: &str) -> usize {
    text.lines().count()
}
