//! Retention over a directory of real snapshot files

use chrono::Duration;
use fleetvault::{apply_retention, list_snapshots, RetentionPolicy};
use fleetvault_durability::apply_retention_at;

use crate::common::*;

/// Ten snapshots one day apart, oldest first
fn ten_snapshots(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let source = MemoryStore::new("hr-main");
    seed_hr(&source, 1, 1);
    let writer = SnapshotWriter::new(dir).unwrap();
    (0..10)
        .map(|day| {
            let doc = SnapshotSerializer::new(&source)
                .serialize_at(&[], at(2026, 1, 1 + day, 2))
                .unwrap();
            writer.write(&doc).unwrap().path
        })
        .collect()
}

#[test]
fn max_count_three_keeps_the_three_most_recent() {
    let dir = tempfile::tempdir().unwrap();
    let written = ten_snapshots(dir.path());

    let report = apply_retention(dir.path(), &RetentionPolicy::keep_last(3)).unwrap();

    assert_eq!(report.deleted.len(), 7);
    assert!(report.failures.is_empty());
    let remaining: Vec<_> = list_snapshots(dir.path())
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .collect();
    let newest_three: Vec<_> = written.iter().rev().take(3).cloned().collect();
    assert_eq!(remaining, newest_three);
}

#[test]
fn max_age_never_removes_the_last_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let written = ten_snapshots(dir.path());

    let policy = RetentionPolicy::keep_for(Duration::days(1));
    let report = apply_retention_at(dir.path(), &policy, at(2026, 12, 31, 0)).unwrap();

    assert_eq!(report.deleted.len(), 9);
    assert_eq!(report.kept, vec![written[9].clone()]);
    assert!(written[9].exists());
}

#[test]
fn age_and_count_combine() {
    let dir = tempfile::tempdir().unwrap();
    ten_snapshots(dir.path());

    // Age alone would keep 5 (Jan 6..10); count trims that to 4
    let policy = RetentionPolicy::from_limits(Some(4), Some(5)).unwrap();
    let report = apply_retention_at(dir.path(), &policy, at(2026, 1, 10, 12)).unwrap();
    assert_eq!(report.kept.len(), 4);
    assert_eq!(report.deleted.len(), 6);
}

#[test]
fn keep_all_deletes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    ten_snapshots(dir.path());
    let report = apply_retention(dir.path(), &RetentionPolicy::keep_all()).unwrap();
    assert!(report.deleted.is_empty());
    assert_eq!(report.kept.len(), 10);
}
