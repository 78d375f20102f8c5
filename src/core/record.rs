//! Edit records and content hashing.
//!
//! A record is one observed editing event: which tool touched which file at
//! which lines, with a hash of the exact bytes it wrote. Records are
//! immutable once written; everything derived from them is recomputed on
//! demand.

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::lineset::LineSet;

/// Prefix tagging legacy normalized content ids (xxh64 over collapsed
/// whitespace). Untagged hashes are raw blake3 over the exact bytes.
pub const LEGACY_HASH_PREFIX: &str = "xxh64:";

/// Which tool produced an edit. `Write` replaces the file wholesale and
/// dominates every earlier record for that file; `Edit` is a local hunk
/// and participates in forward simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Write,
    Edit,
}

impl Tool {
    pub fn as_str(self) -> &'static str {
        match self {
            Tool::Write => "write",
            Tool::Edit => "edit",
        }
    }
}

/// Classic unified-diff hunk anchors: how the file was locally transformed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub old_start: u32, // 1-based line number in the pre-edit file
    pub old_lines: u32, // lines replaced (0 = pure insertion)
    pub new_start: u32, // 1-based line number in the post-edit file
    pub new_lines: u32, // lines written
}

impl Hunk {
    /// Net line-count shift this hunk imposes on everything below it.
    pub fn delta(&self) -> i64 {
        i64::from(self.new_lines) - i64::from(self.old_lines)
    }
}

/// One observed editing event with enough data to verify and locate its
/// content later. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditRecord {
    /// Repository-relative path, forward-slash form.
    pub file: Utf8PathBuf,

    /// Lines occupied at the time the edit was applied (not necessarily
    /// contiguous).
    pub lines: LineSet,

    /// Hunk anchors; absent on legacy records, which then contribute no
    /// shift during simulation.
    #[serde(default)]
    pub hunk: Option<Hunk>,

    /// Hash of the exact post-edit content at
    /// `new_start .. new_start + new_lines - 1`, newline-joined, no
    /// trailing newline. Empty means "never verify".
    #[serde(default)]
    pub content_hash: String,

    pub tool: Tool,

    pub ts: DateTime<Utc>,

    /// Commit that first contained this edit; empty while pending.
    #[serde(default)]
    pub commit_sha: String,

    /// Groups edits recorded into one VCS commit.
    #[serde(default)]
    pub manifest_id: String,

    /// Position within the manifest; secondary ordering key for
    /// equal-timestamp tie-breaking.
    #[serde(default)]
    pub seq: u32,

    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub session: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub change: String,
    #[serde(default)]
    pub trace: String,
}

impl EditRecord {
    /// A pending record lives only in the working tree and the local store.
    pub fn is_pending(&self) -> bool {
        self.commit_sha.is_empty()
    }

    /// Stable identity usable as a map key across rebuilds.
    pub fn key(&self) -> String {
        format!("{}/{}", self.manifest_id, self.seq)
    }

    /// Total ordering for simulation: timestamp, then insertion order.
    pub fn order_key(&self) -> (DateTime<Utc>, &str, u32) {
        (self.ts, self.manifest_id.as_str(), self.seq)
    }
}

/// Raw content hash used by the core: blake3 over the exact bytes of the
/// newline-joined lines, no trailing newline.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Legacy format-layer normalizer: runs of whitespace collapse to single
/// spaces. Only `legacy_hash` consumes this; the core never does.
pub fn normalize_legacy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_ws = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            in_ws = true;
        } else {
            if in_ws && !out.is_empty() {
                out.push(' ');
            }
            in_ws = false;
            out.push(ch);
        }
    }
    out
}

/// Legacy normalized content id, tagged with its scheme.
pub fn legacy_hash(text: &str) -> String {
    let h = xxhash_rust::xxh64::xxh64(normalize_legacy(text).as_bytes(), 0);
    format!("{LEGACY_HASH_PREFIX}{h:016x}")
}

/// Compare `text` against a recorded content hash, dispatching on the
/// hash scheme. The two schemes are not interchangeable.
pub fn matches_hash(text: &str, recorded: &str) -> bool {
    if recorded.is_empty() {
        return false;
    }
    if recorded.starts_with(LEGACY_HASH_PREFIX) {
        legacy_hash(text) == recorded
    } else {
        content_hash(text) == recorded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: &str, manifest: &str, seq: u32) -> EditRecord {
        EditRecord {
            file: Utf8PathBuf::from("src/lib.rs"),
            lines: LineSet::from_range(1, 2),
            hunk: Some(Hunk {
                old_start: 1,
                old_lines: 2,
                new_start: 1,
                new_lines: 2,
            }),
            content_hash: content_hash("a\nb"),
            tool: Tool::Edit,
            ts: ts.parse().unwrap(),
            commit_sha: String::new(),
            manifest_id: manifest.to_string(),
            seq,
            author: "alice".into(),
            session: String::new(),
            prompt: String::new(),
            reason: String::new(),
            change: String::new(),
            trace: String::new(),
        }
    }

    #[test]
    fn raw_hash_is_byte_exact() {
        assert_eq!(content_hash("a\nb"), content_hash("a\nb"));
        assert_ne!(content_hash("a\nb"), content_hash("a\n b"));
        assert_ne!(content_hash("a\nb"), content_hash("a\nb\n"));
    }

    #[test]
    fn legacy_hash_collapses_whitespace() {
        assert_eq!(legacy_hash("fn  main( )"), legacy_hash("fn main(\t)"));
        assert_ne!(legacy_hash("fn main"), legacy_hash("fnmain"));
        assert!(legacy_hash("x").starts_with(LEGACY_HASH_PREFIX));
    }

    #[test]
    fn matches_hash_dispatches_on_scheme() {
        assert!(matches_hash("a\nb", &content_hash("a\nb")));
        assert!(matches_hash("a \tb", &legacy_hash("a b")));
        assert!(!matches_hash("a\nb", &legacy_hash("a b")));
        assert!(!matches_hash("anything", ""));
    }

    #[test]
    fn order_key_breaks_timestamp_ties_by_insertion() {
        let a = record("2026-01-01T00:00:00Z", "m1", 0);
        let b = record("2026-01-01T00:00:00Z", "m1", 1);
        let c = record("2026-01-01T00:00:01Z", "m0", 0);
        assert!(a.order_key() < b.order_key());
        assert!(b.order_key() < c.order_key());
    }

    #[test]
    fn record_round_trips_through_json() {
        let r = record("2026-03-04T05:06:07Z", "m2", 3);
        let json = serde_json::to_string(&r).unwrap();
        let back: EditRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
        assert!(back.is_pending());
    }

    #[test]
    fn legacy_record_without_hunk_parses() {
        let json = r#"{
            "file": "src/old.rs",
            "lines": [3, 5],
            "tool": "edit",
            "ts": "2024-01-01T00:00:00Z"
        }"#;
        let r: EditRecord = serde_json::from_str(json).unwrap();
        assert!(r.hunk.is_none());
        assert!(r.content_hash.is_empty());
        assert_eq!(r.lines.to_string(), "3-5");
        assert!(r.is_pending());
    }
}
