//! Shared test utilities for integration tests
//!
//! Provides git repository fixtures and edit-record builders used across
//! multiple test files.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use camino::Utf8PathBuf;
use whence::core::lineset::LineSet;
use whence::core::record::{EditRecord, Hunk, Tool, content_hash};

/// True when a usable `git` binary is on PATH; tests degrade to a skip
/// message otherwise.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// A throwaway git repository with identity configured for committing.
pub struct TestRepo {
    pub tmp: assert_fs::TempDir,
    pub root: PathBuf,
}

impl TestRepo {
    pub fn init() -> Self {
        let tmp = assert_fs::TempDir::new().expect("tempdir");
        // Canonicalize so paths compare cleanly against git's output.
        let root = tmp.path().canonicalize().expect("canonicalize tempdir");

        git(&root, &["init", "-q", "-b", "main"]);
        git(&root, &["config", "user.email", "dev@example.com"]);
        git(&root, &["config", "user.name", "Dev"]);
        git(&root, &["config", "commit.gpgsign", "false"]);

        Self { tmp, root }
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(path, content).expect("write fixture file");
    }

    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root.join(rel)).expect("read fixture file")
    }

    /// Stage everything and commit; returns the new HEAD SHA.
    pub fn commit_all(&self, msg: &str) -> String {
        git(&self.root, &["add", "-A"]);
        git(&self.root, &["commit", "-qm", msg]);
        self.head()
    }

    pub fn head(&self) -> String {
        let out = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(&self.root)
            .output()
            .expect("git rev-parse");
        assert!(out.status.success(), "git rev-parse failed");
        String::from_utf8_lossy(&out.stdout).trim().to_string()
    }
}

fn git(root: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .expect("spawn git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

/// Numbered fixture lines `l1..lN`, newline-terminated.
pub fn numbered_lines(n: u32) -> String {
    (1..=n).map(|i| format!("l{i}\n")).collect()
}

/// An `Edit` record whose hunk replaces `old_lines` at `start` with the
/// given content block (hashed raw, the way recorders write it).
pub fn edit_record(
    file: &str,
    start: u32,
    old_lines: u32,
    content: &str,
    ts: &str,
    manifest: &str,
) -> EditRecord {
    let new_lines = content.lines().count() as u32;
    EditRecord {
        file: Utf8PathBuf::from(file),
        lines: LineSet::from_range(start, start + new_lines.saturating_sub(1)),
        hunk: Some(Hunk {
            old_start: start,
            old_lines,
            new_start: start,
            new_lines,
        }),
        content_hash: content_hash(content),
        tool: Tool::Edit,
        ts: ts.parse().expect("timestamp"),
        commit_sha: String::new(),
        manifest_id: manifest.to_string(),
        seq: 0,
        author: "ai".into(),
        session: "session-1".into(),
        prompt: "test prompt".into(),
        reason: String::new(),
        change: String::new(),
        trace: String::new(),
    }
}

/// A `Write` record covering the whole given content.
pub fn write_record(file: &str, content: &str, ts: &str, manifest: &str) -> EditRecord {
    let n = content.lines().count() as u32;
    EditRecord {
        file: Utf8PathBuf::from(file),
        lines: LineSet::from_range(1, n.max(1)),
        hunk: Some(Hunk {
            old_start: 1,
            old_lines: 0,
            new_start: 1,
            new_lines: n,
        }),
        content_hash: String::new(),
        tool: Tool::Write,
        ts: ts.parse().expect("timestamp"),
        commit_sha: String::new(),
        manifest_id: manifest.to_string(),
        seq: 0,
        author: "ai".into(),
        session: "session-1".into(),
        prompt: "rewrite file".into(),
        reason: String::new(),
        change: String::new(),
        trace: String::new(),
    }
}

/// Replace 1-based inclusive lines `[start, start+old_lines-1]` of `text`
/// with `replacement` lines, mirroring how an editor applies a hunk.
/// `old_lines == 0` inserts before line `start`.
pub fn apply_hunk_to_text(text: &str, start: u32, old_lines: u32, replacement: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let s = (start as usize).saturating_sub(1).min(lines.len());
    let e = (s + old_lines as usize).min(lines.len());

    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    out.extend(&lines[..s]);
    out.extend(replacement.lines());
    out.extend(&lines[e..]);

    let mut joined = out.join("\n");
    joined.push('\n');
    joined
}
