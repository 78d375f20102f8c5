//! Query frontend: freshness check, candidate filtering, per-file
//! resolution, and human/JSON presentation.
//!
//! A query is one synchronous pass: open the store, make sure the index
//! matches (HEAD, store tip, pending count), narrow rows with the cheap
//! attribute filters, then hand each file's records to the resolver.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, NaiveDate, Utc};
use itertools::Itertools;
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};
use tracing::debug;

use crate::cli::{AppContext, QueryArgs};
use crate::core::errors::WhenceError;
use crate::core::record::EditRecord;
use crate::core::resolve::{FileRecord, LineAdjustment, ResolveOptions, Resolver};
use crate::index::rebuild::{self, RebuildOptions};
use crate::index::{QueryIndex, RowFilter};
use crate::infra::config;
use crate::infra::git;
use crate::infra::store::RecordStore;

/// One resolved record ready for presentation.
struct QueryRow {
    record: EditRecord,
    adjustment: LineAdjustment,
}

/// JSON shape per row. Line arrays are empty, never absent.
#[derive(Serialize)]
struct JsonRow<'a> {
    file: &'a Utf8Path,
    lines: Vec<u32>,
    current_lines: Vec<u32>,
    superseded: bool,
    r#match: &'static str,
    ts: String,
    prompt: &'a str,
    reason: &'a str,
    change: &'a str,
    tool: &'a str,
    author: &'a str,
    session: &'a str,
    trace: &'a str,
    content_hash: &'a str,
    commit_sha: &'a str,
}

pub fn run(args: QueryArgs, ctx: &AppContext) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let meta = git::detect_repo(&cwd)
        .map_err(|_| WhenceError::VcsUnavailable(cwd.display().to_string()))?;
    let root = meta.top_level;

    let cfg = config::load_config(&root)?;
    let store = RecordStore::open(&root, &cfg.store_dir)?;

    // An unborn branch has no HEAD yet; staleness still works with a
    // placeholder and blame simply reports nothing committed.
    let head = git::head_sha(&root).unwrap_or_else(|e| {
        debug!("no HEAD yet: {e:#}");
        String::new()
    });

    let force = args.rebuild || args.fill_reasons;
    let rebuild_opts = RebuildOptions {
        fill_reasons: args.fill_reasons,
        progress: !ctx.quiet && !args.json,
    };
    let index = rebuild::ensure_fresh(&store, &head, force, rebuild_opts)?;

    if args.stats {
        return print_stats(&index, &store, ctx);
    }

    let line_filter = args
        .line
        .as_deref()
        .map(parse_line_filter)
        .transpose()?;

    let filter = RowFilter {
        file: args
            .path
            .as_deref()
            .map(|p| repo_relative(&root, &cwd, p))
            .transpose()?,
        author: args.author.clone(),
        since: args.since.as_deref().map(parse_since).transpose()?,
        grep: args.grep.clone(),
        trace: args.trace.clone(),
    };

    if filter.file.is_none()
        && filter.author.is_none()
        && filter.since.is_none()
        && filter.grep.is_none()
        && filter.trace.is_none()
    {
        anyhow::bail!("nothing to query: pass a file path or a filter (see --help)");
    }

    let by_file = records_by_file(&store, &index, &filter, &head)?;

    // Pending snapshot hashes live in the store, not the index.
    let mut snapshots: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();
    for pending in store.read_all_pending()? {
        snapshots.insert(
            pending.record.key(),
            (pending.pre_hash.clone(), pending.post_hash.clone()),
        );
    }

    let resolver = Resolver::new(
        &root,
        &store,
        ResolveOptions {
            search_radius: cfg.query.search_radius,
        },
    );

    let mut rows: Vec<QueryRow> = Vec::new();
    for (file, records) in by_file {
        let file_records: Vec<FileRecord> = records
            .into_iter()
            .map(|record| {
                let (pre_hash, post_hash) = snapshots
                    .get(&record.key())
                    .cloned()
                    .unwrap_or((None, None));
                FileRecord {
                    record,
                    pre_hash,
                    post_hash,
                }
            })
            .collect();

        let adjustments = resolver.resolve_file(&file, &file_records);
        for fr in file_records {
            let Some(adjustment) = adjustments.get(&fr.record.key()).cloned() else {
                continue;
            };
            rows.push(QueryRow {
                record: fr.record,
                adjustment,
            });
        }
    }

    // Line queries return only surviving overlaps; file-wide queries keep
    // superseded records behind --include-history.
    rows.retain(|row| match line_filter {
        Some((start, end)) => {
            !row.adjustment.superseded && row.adjustment.current_lines.overlaps(start, end)
        }
        None => args.include_history || !row.adjustment.superseded,
    });

    // Newest first for presentation.
    rows.sort_by(|a, b| b.record.order_key().cmp(&a.record.order_key()));
    if cfg.query.limit > 0 {
        rows.truncate(cfg.query.limit);
    }

    if args.json {
        print_json(&rows)?;
    } else {
        print_human(&rows, args.explain, ctx, cfg.query.color);
    }
    Ok(())
}

/// Convert filtered index rows back into records, grouped per file. A row
/// that stopped parsing means someone touched the index behind our back;
/// one forced rebuild cures it, a second failure is a real error.
fn records_by_file(
    store: &RecordStore,
    index: &QueryIndex,
    filter: &RowFilter,
    head: &str,
) -> Result<BTreeMap<Utf8PathBuf, Vec<EditRecord>>> {
    match rows_to_records(index, filter) {
        Ok(map) => Ok(map),
        Err(err) if err.downcast_ref::<WhenceError>().is_some_and(|e| {
            matches!(e, WhenceError::IndexCorrupt(_))
        }) =>
        {
            debug!("index rows corrupt at query time, rebuilding once: {err:#}");
            let index = rebuild::ensure_fresh(store, head, true, RebuildOptions::default())?;
            rows_to_records(&index, filter)
        }
        Err(err) => Err(err),
    }
}

fn rows_to_records(
    index: &QueryIndex,
    filter: &RowFilter,
) -> Result<BTreeMap<Utf8PathBuf, Vec<EditRecord>>> {
    let mut map: BTreeMap<Utf8PathBuf, Vec<EditRecord>> = BTreeMap::new();
    for row in index.filter(filter) {
        let record = row.to_record()?;
        map.entry(record.file.clone()).or_default().push(record);
    }
    Ok(map)
}

/// `-L` accepts `n`, `a:b`, or `a,b`.
pub fn parse_line_filter(spec: &str) -> Result<(u32, u32), WhenceError> {
    let invalid = |detail: &str| WhenceError::InvalidLineSpec {
        spec: spec.to_string(),
        detail: detail.to_string(),
    };

    let parts: Vec<&str> = if spec.contains(':') {
        spec.splitn(2, ':').collect()
    } else if spec.contains(',') {
        spec.splitn(2, ',').collect()
    } else {
        vec![spec]
    };

    let parse = |s: &str| -> Result<u32, WhenceError> {
        let n: u32 = s
            .trim()
            .parse()
            .map_err(|_| invalid(&format!("not a line number: `{}`", s.trim())))?;
        if n == 0 {
            return Err(invalid("line numbers are 1-based"));
        }
        Ok(n)
    };

    match parts.as_slice() {
        [single] => {
            let n = parse(single)?;
            Ok((n, n))
        }
        [a, b] => {
            let (start, end) = (parse(a)?, parse(b)?);
            if start > end {
                return Err(invalid(&format!("descending range {start}:{end}")));
            }
            Ok((start, end))
        }
        _ => Err(invalid("expected n, a:b, or a,b")),
    }
}

/// `--since` accepts an RFC 3339 datetime or a bare date.
fn parse_since(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = s.parse::<DateTime<Utc>>() {
        return Ok(dt);
    }
    let date: NaiveDate = s
        .parse()
        .with_context(|| format!("unparseable --since value `{s}`"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .context("invalid --since date")?;
    Ok(DateTime::from_naive_utc_and_offset(midnight, Utc))
}

/// Normalize a user-supplied path to the repo-relative forward-slash form
/// records use.
fn repo_relative(root: &Path, cwd: &Path, path: &Utf8Path) -> Result<Utf8PathBuf> {
    let joined = if path.as_std_path().is_absolute() {
        path.as_std_path().to_path_buf()
    } else {
        cwd.join(path.as_std_path())
    };
    // Canonicalize where possible so `../` and symlinks behave; deleted
    // files fall back to the lexical join.
    let abs = joined.canonicalize().unwrap_or(joined);
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let rel = abs.strip_prefix(&root).unwrap_or(abs.as_path());
    let rel = Utf8PathBuf::from_path_buf(rel.to_path_buf())
        .map_err(|p| anyhow::anyhow!("non-UTF-8 path: {}", p.display()))?;
    Ok(Utf8PathBuf::from(rel.as_str().replace('\\', "/")))
}

fn print_json(rows: &[QueryRow]) -> Result<()> {
    let out: Vec<JsonRow<'_>> = rows
        .iter()
        .map(|row| JsonRow {
            file: &row.record.file,
            lines: row.record.lines.iter().collect(),
            current_lines: row.adjustment.current_lines.iter().collect(),
            superseded: row.adjustment.superseded,
            r#match: row.adjustment.match_kind.as_str(),
            ts: row.record.ts.to_rfc3339(),
            prompt: &row.record.prompt,
            reason: &row.record.reason,
            change: &row.record.change,
            tool: row.record.tool.as_str(),
            author: &row.record.author,
            session: &row.record.session,
            trace: &row.record.trace,
            content_hash: &row.record.content_hash,
            commit_sha: &row.record.commit_sha,
        })
        .collect();
    println!("{}", serde_json::to_string(&out)?);
    Ok(())
}

fn print_human(rows: &[QueryRow], explain: bool, ctx: &AppContext, cfg_color: bool) {
    let color = cfg_color && !ctx.no_color;

    if rows.is_empty() {
        if !ctx.quiet {
            println!("no matching edits");
        }
        return;
    }

    for row in rows {
        let location = location_label(row);
        let when = row.record.ts.format("%Y-%m-%d %H:%M");
        let summary = summary_line(&row.record);
        let tag = status_tag(row);

        if color {
            println!(
                "{}  {}  {}  {}  {}{}",
                location.cyan(),
                row.record.tool.as_str().yellow(),
                when,
                row.record.author.green(),
                summary,
                tag.map(|t| format!("  {}", t.red())).unwrap_or_default(),
            );
        } else {
            println!(
                "{}  {}  {}  {}  {}{}",
                location,
                row.record.tool.as_str(),
                when,
                row.record.author,
                summary,
                tag.map(|t| format!("  {t}")).unwrap_or_default(),
            );
        }

        if explain {
            for (label, value) in [
                ("prompt", &row.record.prompt),
                ("reason", &row.record.reason),
                ("change", &row.record.change),
            ] {
                if !value.is_empty() {
                    println!("    {label}: {}", value.lines().join(" "));
                }
            }
            let commit = if row.record.commit_sha.is_empty() {
                "pending".to_string()
            } else {
                row.record.commit_sha.chars().take(12).collect()
            };
            println!(
                "    session: {}  trace: {}  commit: {commit}",
                or_dash(&row.record.session),
                or_dash(&row.record.trace),
            );
        }
    }
}

fn location_label(row: &QueryRow) -> String {
    if row.adjustment.current_lines.is_empty() {
        row.record.file.to_string()
    } else {
        format!("{}:{}", row.record.file, row.adjustment.current_lines)
    }
}

fn summary_line(record: &EditRecord) -> String {
    let source = if !record.change.is_empty() {
        &record.change
    } else if !record.reason.is_empty() {
        &record.reason
    } else {
        &record.prompt
    };
    source.lines().next().unwrap_or("").to_string()
}

fn status_tag(row: &QueryRow) -> Option<&'static str> {
    row.adjustment.superseded.then_some("[superseded]")
}

fn or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}

#[derive(Tabled)]
struct StatRow {
    metric: &'static str,
    value: String,
}

fn print_stats(index: &QueryIndex, store: &RecordStore, _ctx: &AppContext) -> Result<()> {
    let rows = index.rows();
    let files = rows.iter().map(|r| &r.file).unique().count();
    let authors = rows
        .iter()
        .map(|r| &r.author)
        .filter(|a| !a.is_empty())
        .unique()
        .count();
    let pending = rows.iter().filter(|r| r.commit_sha.is_empty()).count();
    let manifests = store.list_manifests()?.len();

    let stats = vec![
        StatRow {
            metric: "records",
            value: rows.len().to_string(),
        },
        StatRow {
            metric: "files",
            value: files.to_string(),
        },
        StatRow {
            metric: "authors",
            value: authors.to_string(),
        },
        StatRow {
            metric: "manifests",
            value: manifests.to_string(),
        },
        StatRow {
            metric: "pending edits",
            value: pending.to_string(),
        },
    ];

    let mut table = Table::new(stats);
    table.with(Style::sharp());
    println!("{table}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_filter_accepts_all_three_forms() {
        assert_eq!(parse_line_filter("7").unwrap(), (7, 7));
        assert_eq!(parse_line_filter("3:9").unwrap(), (3, 9));
        assert_eq!(parse_line_filter("3,9").unwrap(), (3, 9));
        assert_eq!(parse_line_filter(" 4 : 5 ").unwrap(), (4, 5));
    }

    #[test]
    fn line_filter_rejects_garbage() {
        for bad in ["", "x", "0", "5:2", "1:2:3", "1,x"] {
            assert!(parse_line_filter(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn since_accepts_date_and_datetime() {
        assert_eq!(
            parse_since("2026-02-01").unwrap(),
            "2026-02-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert!(parse_since("2026-02-01T10:30:00Z").is_ok());
        assert!(parse_since("not a date").is_err());
    }

    #[test]
    fn repo_relative_strips_root_and_cwd() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("src")).unwrap();

        let rel =
            repo_relative(&root, &root.join("src"), Utf8Path::new("main.rs")).unwrap();
        assert_eq!(rel, "src/main.rs");

        let rel = repo_relative(&root, &root, Utf8Path::new("src/main.rs")).unwrap();
        assert_eq!(rel, "src/main.rs");
    }
}
