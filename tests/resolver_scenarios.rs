//! End-to-end attribution scenarios against real git repositories.
//!
//! Each test builds a small repo, applies recorded and unrecorded edits
//! the way they would happen in practice, and checks what the resolver
//! reports for the current working tree.

mod util;

use camino::Utf8Path;
use util::{
    TestRepo, apply_hunk_to_text, edit_record, git_available, numbered_lines, write_record,
};
use whence::core::resolve::{FileRecord, ResolveOptions, Resolver};
use whence::infra::store::{PendingRecord, RecordStore};

const AI_BLOCK: &str = "X3\nX4\nX5";

fn store_for(repo: &TestRepo) -> RecordStore {
    RecordStore::init(&repo.root, ".whence").expect("init store")
}

#[test]
fn simple_shift_follows_human_insertion() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let repo = TestRepo::init();
    repo.write("f.txt", &numbered_lines(10));
    repo.commit_all("base");

    let after_ai = apply_hunk_to_text(&numbered_lines(10), 3, 3, AI_BLOCK);
    repo.write("f.txt", &after_ai);
    let ai_sha = repo.commit_all("ai edit");

    // A human inserts three lines at the top, unrecorded.
    let after_human = apply_hunk_to_text(&after_ai, 1, 0, "h1\nh2\nh3");
    repo.write("f.txt", &after_human);
    repo.commit_all("manual insertion");

    let store = store_for(&repo);
    let mut rec = edit_record("f.txt", 3, 3, AI_BLOCK, "2026-01-01T00:00:00Z", "m1");
    rec.commit_sha = ai_sha;

    let resolver = Resolver::new(&repo.root, &store, ResolveOptions::default());
    let adjustments =
        resolver.resolve_file(Utf8Path::new("f.txt"), &[FileRecord::committed(rec.clone())]);
    let adj = &adjustments[&rec.key()];

    insta::assert_snapshot!(
        serde_json::to_string_pretty(adj).unwrap(),
        @r###"
    {
      "current_lines": "6-8",
      "superseded": false,
      "match_kind": "exact"
    }
    "###
    );
}

#[test]
fn partial_overwrite_supersedes() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let repo = TestRepo::init();
    repo.write("f.txt", &numbered_lines(10));
    repo.commit_all("base");

    let after_ai = apply_hunk_to_text(&numbered_lines(10), 3, 3, AI_BLOCK);
    repo.write("f.txt", &after_ai);
    let ai_sha = repo.commit_all("ai edit");

    // Line 4 of the block gets rewritten by hand.
    let after_human = apply_hunk_to_text(&after_ai, 4, 1, "HUMAN");
    repo.write("f.txt", &after_human);
    repo.commit_all("manual overwrite");

    let store = store_for(&repo);
    let mut rec = edit_record("f.txt", 3, 3, AI_BLOCK, "2026-01-01T00:00:00Z", "m1");
    rec.commit_sha = ai_sha;

    let resolver = Resolver::new(&repo.root, &store, ResolveOptions::default());
    let adjustments =
        resolver.resolve_file(Utf8Path::new("f.txt"), &[FileRecord::committed(rec.clone())]);
    let adj = &adjustments[&rec.key()];

    assert!(adj.superseded);
    assert!(adj.current_lines.is_empty());
}

#[test]
fn split_block_supersedes() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let repo = TestRepo::init();
    repo.write("f.txt", &numbered_lines(10));
    repo.commit_all("base");

    let after_ai = apply_hunk_to_text(&numbered_lines(10), 3, 3, AI_BLOCK);
    repo.write("f.txt", &after_ai);
    let ai_sha = repo.commit_all("ai edit");

    // One line wedged into the middle of the block: content survives but
    // the contiguous block hash is broken.
    let after_human = apply_hunk_to_text(&after_ai, 4, 0, "wedge");
    repo.write("f.txt", &after_human);
    repo.commit_all("manual split");

    let store = store_for(&repo);
    let mut rec = edit_record("f.txt", 3, 3, AI_BLOCK, "2026-01-01T00:00:00Z", "m1");
    rec.commit_sha = ai_sha;

    let resolver = Resolver::new(&repo.root, &store, ResolveOptions::default());
    let adjustments =
        resolver.resolve_file(Utf8Path::new("f.txt"), &[FileRecord::committed(rec.clone())]);

    assert!(adjustments[&rec.key()].superseded);
}

#[test]
fn manual_lines_in_shared_commit_stay_unattributed() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let repo = TestRepo::init();
    repo.write("f.txt", &numbered_lines(20));
    repo.commit_all("base");

    // One commit carries the recorded edit at 3-5 and a manual rewrite of
    // 6-16.
    let with_ai = apply_hunk_to_text(&numbered_lines(20), 3, 3, AI_BLOCK);
    let manual: String = (6..=16)
        .map(|i| format!("m{i}"))
        .collect::<Vec<_>>()
        .join("\n");
    let with_manual = apply_hunk_to_text(&with_ai, 6, 11, &manual);
    repo.write("f.txt", &with_manual);
    let shared_sha = repo.commit_all("ai + manual");

    let store = store_for(&repo);
    let mut rec = edit_record("f.txt", 3, 3, AI_BLOCK, "2026-01-01T00:00:00Z", "m1");
    rec.commit_sha = shared_sha;

    let resolver = Resolver::new(&repo.root, &store, ResolveOptions::default());
    let adjustments =
        resolver.resolve_file(Utf8Path::new("f.txt"), &[FileRecord::committed(rec.clone())]);
    let adj = &adjustments[&rec.key()];

    assert!(!adj.superseded);
    assert_eq!(adj.current_lines.to_string(), "3-5");
    // The blame-shared manual line is not attributed to the edit.
    assert!(!adj.current_lines.overlaps(10, 10));
    assert!(adj.current_lines.overlaps(4, 4));
}

#[test]
fn pending_edit_is_visible_next_to_committed_one() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let repo = TestRepo::init();
    repo.write("f.txt", &numbered_lines(10));
    repo.commit_all("base");

    let committed_block = "A1\nA2";
    let after_ai = apply_hunk_to_text(&numbered_lines(10), 1, 2, committed_block);
    repo.write("f.txt", &after_ai);
    let ai_sha = repo.commit_all("ai edit");

    // A second AI edit at 3-5 only exists in the working tree.
    let pending_block = "P3\nP4\nP5";
    let working = apply_hunk_to_text(&after_ai, 3, 3, pending_block);
    repo.write("f.txt", &working);

    let store = store_for(&repo);
    let pre_hash = store.put_blob(&after_ai).unwrap();
    let post_hash = store.put_blob(&working).unwrap();

    let mut committed = edit_record("f.txt", 1, 2, committed_block, "2026-01-01T00:00:00Z", "m1");
    committed.commit_sha = ai_sha;
    let pending = edit_record("f.txt", 3, 3, pending_block, "2026-01-02T00:00:00Z", "p1");
    store
        .append_pending(&PendingRecord {
            record: pending.clone(),
            pre_hash: Some(pre_hash.clone()),
            post_hash: Some(post_hash.clone()),
        })
        .unwrap();

    let records = vec![
        FileRecord::committed(committed.clone()),
        FileRecord {
            record: pending.clone(),
            pre_hash: Some(pre_hash),
            post_hash: Some(post_hash),
        },
    ];

    let resolver = Resolver::new(&repo.root, &store, ResolveOptions::default());
    let adjustments = resolver.resolve_file(Utf8Path::new("f.txt"), &records);

    let committed_adj = &adjustments[&committed.key()];
    let pending_adj = &adjustments[&pending.key()];
    assert!(!committed_adj.superseded);
    assert_eq!(committed_adj.current_lines.to_string(), "1-2");
    assert!(!pending_adj.superseded);
    assert_eq!(pending_adj.current_lines.to_string(), "3-5");

    // A single-line query at 3 finds only the pending edit.
    assert!(!committed_adj.current_lines.overlaps(3, 3));
    assert!(pending_adj.current_lines.overlaps(3, 3));
}

#[test]
fn write_supersedes_every_earlier_edit() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let repo = TestRepo::init();
    let final_content = "W1\nW2\n";
    repo.write("f.txt", final_content);

    let store = store_for(&repo);
    let mut e1 = edit_record("f.txt", 1, 1, "old-a", "2026-01-01T00:00:00Z", "m1");
    e1.commit_sha = "a".repeat(40);
    let mut e2 = edit_record("f.txt", 2, 1, "old-b", "2026-01-02T00:00:00Z", "m2");
    e2.commit_sha = "b".repeat(40);
    let wr = write_record("f.txt", final_content, "2026-01-03T00:00:00Z", "m3");

    let records = vec![
        FileRecord::committed(e1.clone()),
        FileRecord::committed(e2.clone()),
        FileRecord::committed(wr.clone()),
    ];

    let resolver = Resolver::new(&repo.root, &store, ResolveOptions::default());
    let adjustments = resolver.resolve_file(Utf8Path::new("f.txt"), &records);

    assert!(adjustments[&e1.key()].superseded);
    assert!(adjustments[&e2.key()].superseded);
    let write_adj = &adjustments[&wr.key()];
    assert!(!write_adj.superseded);
    assert_eq!(write_adj.current_lines.to_string(), "1-2");
}
