//! Snapshot then restore into an empty store reproduces the data

use fleetvault::{read_snapshot, EntityKind};

use crate::common::*;

fn assert_same_contents(a: &dyn Store, b: &dyn Store) {
    for entity in restore_order().unwrap().iter().copied() {
        assert_eq!(
            portable_rows(a, entity),
            portable_rows(b, entity),
            "rows of {} differ",
            entity.name
        );
    }
}

#[test]
fn memory_to_memory_with_overwrite() {
    let source = MemoryStore::new("source");
    seed_full(&source);
    let doc = SnapshotSerializer::new(&source).serialize(&[]).unwrap();

    let target = MemoryStore::new("target");
    let summary = restore(&target, &doc, ConflictPolicy::Overwrite);

    assert!(summary.is_complete(), "{}", summary.render_table());
    assert_eq!(summary.totals().inserted as usize, doc.total_records());
    assert_same_contents(&source, &target);
}

#[test]
fn memory_to_sqlite_through_a_snapshot_file() {
    let source = MemoryStore::new("source");
    seed_full(&source);

    let dir = tempfile::tempdir().unwrap();
    let writer = SnapshotWriter::new(dir.path()).unwrap();
    let info = SnapshotSerializer::new(&source)
        .write_snapshot(&[], &writer)
        .unwrap();

    let (_db_dir, target) = sqlite_store("target");
    let summary = RestoreEngine::new(&target, RestoreOptions::with_policy(ConflictPolicy::Overwrite))
        .restore_file(&info.path)
        .unwrap();

    assert!(summary.is_complete(), "{}", summary.render_table());
    assert_same_contents(&source, &target);
}

#[test]
fn sqlite_to_memory() {
    let (_db_dir, source) = sqlite_store("source");
    seed_full(&source);
    let doc = SnapshotSerializer::new(&source).serialize(&[]).unwrap();
    assert!(doc.source.ends_with("source.db"));

    let target = MemoryStore::default();
    let summary = restore(&target, &doc, ConflictPolicy::Overwrite);
    assert!(summary.is_complete(), "{}", summary.render_table());
    assert_same_contents(&source, &target);
}

#[test]
fn written_file_reads_back_identically() {
    let source = MemoryStore::new("source");
    seed_full(&source);
    let doc = SnapshotSerializer::new(&source)
        .serialize_at(&[], at(2026, 3, 1, 12))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let info = SnapshotWriter::new(dir.path()).unwrap().write(&doc).unwrap();
    assert_eq!(
        info.path.file_name().unwrap().to_str().unwrap(),
        "snapshot-20260301_120000.json"
    );
    assert_eq!(read_snapshot(&info.path).unwrap(), doc);
}

#[test]
fn partial_selection_restores_only_the_selected_types() {
    let source = MemoryStore::new("source");
    seed_full(&source);
    let doc = SnapshotSerializer::new(&source)
        .serialize(&[EntityKind::Employee, EntityKind::Department])
        .unwrap();

    let target = MemoryStore::default();
    let summary = restore(&target, &doc, ConflictPolicy::Skip);
    assert!(summary.is_complete());
    assert_eq!(summary.entities.len(), 2);
    assert_eq!(
        natural_keys(&source, &fleetvault_core::schema::EMPLOYEE),
        natural_keys(&target, &fleetvault_core::schema::EMPLOYEE)
    );
    assert_eq!(count(&target, &fleetvault_core::schema::VEHICLE), 0);
}
