//! Flat query index: one JSONL row per edit record, rebuilt from scratch.
//!
//! The index exists only to narrow candidates by file, author, date, or
//! free text. All line-level semantics live in the resolver; nothing here
//! ever answers "which edit owns line L".

pub mod rebuild;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::Result;
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::WhenceError;
use crate::core::lineset::LineSet;
use crate::core::record::{EditRecord, Hunk, Tool};

/// One row, mirroring the edit record plus denormalised line bounds.
/// `line_start`/`line_end` are 0 for records with an empty line set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRow {
    pub id: u64,
    pub file: Utf8PathBuf,
    pub line_start: u32,
    pub line_end: u32,
    pub changed_lines: String,
    pub content_hash: String,
    pub ts: DateTime<Utc>,
    pub prompt: String,
    pub reason: String,
    pub change: String,
    pub tool: Tool,
    pub author: String,
    pub session: String,
    pub trace: String,
    pub manifest_id: String,
    pub seq: u32,
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    /// Distinguishes a genuine all-zero hunk from a legacy record
    /// carrying none.
    pub has_hunk: bool,
    pub commit_sha: String,
}

impl IndexRow {
    pub fn from_record(id: u64, record: &EditRecord) -> Self {
        let hunk = record.hunk.unwrap_or_default();
        Self {
            id,
            file: record.file.clone(),
            line_start: record.lines.min().unwrap_or(0),
            line_end: record.lines.max().unwrap_or(0),
            changed_lines: record.lines.to_string(),
            content_hash: record.content_hash.clone(),
            ts: record.ts,
            prompt: record.prompt.clone(),
            reason: record.reason.clone(),
            change: record.change.clone(),
            tool: record.tool,
            author: record.author.clone(),
            session: record.session.clone(),
            trace: record.trace.clone(),
            manifest_id: record.manifest_id.clone(),
            seq: record.seq,
            old_start: hunk.old_start,
            old_lines: hunk.old_lines,
            new_start: hunk.new_start,
            new_lines: hunk.new_lines,
            has_hunk: record.hunk.is_some(),
            commit_sha: record.commit_sha.clone(),
        }
    }

    pub fn to_record(&self) -> Result<EditRecord> {
        let lines: LineSet = self
            .changed_lines
            .parse()
            .map_err(|e| WhenceError::IndexCorrupt(format!("row {}: {e}", self.id)))?;
        Ok(EditRecord {
            file: self.file.clone(),
            lines,
            hunk: self.has_hunk.then_some(Hunk {
                old_start: self.old_start,
                old_lines: self.old_lines,
                new_start: self.new_start,
                new_lines: self.new_lines,
            }),
            content_hash: self.content_hash.clone(),
            tool: self.tool,
            ts: self.ts,
            commit_sha: self.commit_sha.clone(),
            manifest_id: self.manifest_id.clone(),
            seq: self.seq,
            author: self.author.clone(),
            session: self.session.clone(),
            prompt: self.prompt.clone(),
            reason: self.reason.clone(),
            change: self.change.clone(),
            trace: self.trace.clone(),
        })
    }
}

/// Attribute filters the index supports. All present filters must match.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    /// Exact repo-relative path.
    pub file: Option<Utf8PathBuf>,
    pub author: Option<String>,
    pub since: Option<DateTime<Utc>>,
    /// Case-insensitive substring over prompt, change, and reason.
    pub grep: Option<String>,
    pub trace: Option<String>,
}

impl RowFilter {
    pub fn matches(&self, row: &IndexRow) -> bool {
        if let Some(file) = &self.file
            && row.file != *file
        {
            return false;
        }
        if let Some(author) = &self.author
            && row.author != *author
        {
            return false;
        }
        if let Some(since) = self.since
            && row.ts < since
        {
            return false;
        }
        if let Some(trace) = &self.trace
            && row.trace != *trace
        {
            return false;
        }
        if let Some(needle) = &self.grep {
            let needle = needle.to_lowercase();
            let hit = [&row.prompt, &row.change, &row.reason]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }
        true
    }
}

/// In-memory index over `rows.jsonl`.
#[derive(Debug, Default)]
pub struct QueryIndex {
    rows: Vec<IndexRow>,
}

impl QueryIndex {
    /// Read every row; any malformed line means the file is corrupt and
    /// the caller rebuilds.
    pub fn load(path: &Path) -> Result<Self> {
        let f = File::open(path)
            .map_err(|e| WhenceError::IndexCorrupt(format!("{}: {e}", path.display())))?;
        let reader = BufReader::new(f);

        let mut rows = Vec::new();
        for (i, line) in reader.lines().enumerate() {
            let line =
                line.map_err(|e| WhenceError::IndexCorrupt(format!("line {}: {e}", i + 1)))?;
            if line.trim().is_empty() {
                continue;
            }
            let row: IndexRow = serde_json::from_str(&line)
                .map_err(|e| WhenceError::IndexCorrupt(format!("line {}: {e}", i + 1)))?;
            rows.push(row);
        }
        Ok(Self { rows })
    }

    pub fn from_rows(rows: Vec<IndexRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[IndexRow] {
        &self.rows
    }

    pub fn filter(&self, filter: &RowFilter) -> Vec<&IndexRow> {
        self.rows.iter().filter(|row| filter.matches(row)).collect()
    }
}
