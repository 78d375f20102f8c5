//! Read-only git facade: repository detection, HEAD, file contents at a
//! ref, and per-line blame.
//!
//! Everything shells out to the `git` executable; no call here mutates the
//! working tree. Blame output is consumed in porcelain form.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use camino::Utf8Path;
use regex::Regex;

/// 40 zeros: the SHA git blame reports for uncommitted lines.
pub const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

/// Lightweight repo metadata for boundary checks and UX
#[derive(Debug, Clone)]
pub struct RepoMeta {
    pub top_level: PathBuf,
    pub is_worktree: bool,
}

/// Per-line blame attribution: owning commit and the line's position in
/// that commit's version of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlameEntry {
    pub sha: String,
    pub orig_line: u32,
}

/// Current line number (1-based) -> blame attribution.
pub type BlameMap = BTreeMap<u32, BlameEntry>;

pub fn is_uncommitted(entry: &BlameEntry) -> bool {
    entry.sha == ZERO_SHA
}

/// Locate the repository containing `start`.
///
/// Git itself is the authority on what counts as a repository (linked
/// worktrees, `GIT_DIR` overrides, bare-adjacent layouts), so a single
/// `rev-parse --show-toplevel` answers both "are we in one" and "where is
/// its root". Only when the git binary cannot be spawned at all do we scan
/// ancestors for a `.git` entry ourselves.
pub fn detect_repo(start: &Path) -> Result<RepoMeta> {
    let top_level = match git_toplevel(start) {
        Ok(Some(top)) => top,
        Ok(None) => bail!("{} is not inside a git repository", start.display()),
        Err(spawn_err) => ascend_to_dot_git(start).ok_or_else(|| {
            spawn_err.context(format!(
                "{} is not inside a git repository",
                start.display()
            ))
        })?,
    };

    // Linked worktrees keep a `.git` pointer file at the top instead of a
    // real directory.
    let is_worktree = top_level.join(".git").is_file();
    Ok(RepoMeta {
        top_level,
        is_worktree,
    })
}

// Ok(None) means git ran and answered "no repository here"; Err means the
// binary itself was unusable.
fn git_toplevel(start: &Path) -> Result<Option<PathBuf>> {
    let out = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(start)
        .output()
        .context("Failed to spawn git")?;
    if !out.status.success() {
        return Ok(None);
    }
    let top = String::from_utf8_lossy(&out.stdout);
    let top = top.trim();
    Ok((!top.is_empty()).then(|| PathBuf::from(top)))
}

fn ascend_to_dot_git(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}

/// Commit SHA of HEAD.
pub fn head_sha(root: &Path) -> Result<String> {
    let out = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(root)
        .output()
        .context("Failed to run git rev-parse HEAD")?;
    if !out.status.success() {
        bail!(
            "git rev-parse HEAD failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// File contents at `refspec` (e.g. `HEAD`), as UTF-8 text.
pub fn show_file(root: &Path, refspec: &str, path: &Utf8Path) -> Result<String> {
    let out = Command::new("git")
        .args(["show", &format!("{refspec}:{path}")])
        .current_dir(root)
        .output()
        .with_context(|| format!("Failed to run git show for {path}"))?;
    if !out.status.success() {
        bail!(
            "git show {refspec}:{path} failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    String::from_utf8(out.stdout).with_context(|| format!("{path} at {refspec} is not UTF-8"))
}

/// Per-line blame for `path` in the working tree.
///
/// Fails for deleted, binary, or untracked files; callers degrade to the
/// simulator + verifier path in that case.
pub fn blame_file(root: &Path, path: &Utf8Path) -> Result<BlameMap> {
    let out = Command::new("git")
        .args(["blame", "--porcelain", "--", path.as_str()])
        .current_dir(root)
        .output()
        .with_context(|| format!("Failed to run git blame for {path}"))?;
    if !out.status.success() {
        bail!(
            "git blame {path} failed: {}",
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    let stdout = String::from_utf8_lossy(&out.stdout);
    parse_porcelain(&stdout)
}

// Porcelain framing: every blamed line opens with `<sha> <orig> <final>`
// (plus a group count on the first line of a group); commit metadata and
// tab-prefixed content lines follow and are skipped here.
fn parse_porcelain(porcelain: &str) -> Result<BlameMap> {
    let header =
        Regex::new(r"^([0-9a-f]{40}) (\d+) (\d+)(?: \d+)?$").context("blame header regex")?;

    let mut map = BlameMap::new();
    for line in porcelain.lines() {
        if let Some(cap) = header.captures(line) {
            let sha = cap[1].to_string();
            let orig_line: u32 = cap[2].parse().context("bad origin line in blame")?;
            let final_line: u32 = cap[3].parse().context("bad final line in blame")?;
            map.insert(final_line, BlameEntry { sha, orig_line });
        }
    }
    Ok(map)
}
