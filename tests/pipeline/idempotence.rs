//! Restoring the same snapshot again changes nothing

use fleetvault_core::schema::{EMPLOYEE, VEHICLE};

use crate::common::*;

fn snapshot_of_full_store() -> SnapshotDocument {
    let source = MemoryStore::new("source");
    seed_full(&source);
    SnapshotSerializer::new(&source).serialize(&[]).unwrap()
}

#[test]
fn second_skip_restore_inserts_nothing() {
    let doc = snapshot_of_full_store();
    let target = MemoryStore::default();

    let first = restore(&target, &doc, ConflictPolicy::Skip);
    let second = restore(&target, &doc, ConflictPolicy::Skip);

    assert_eq!(first.totals().inserted as usize, doc.total_records());
    assert_eq!(second.totals().inserted, 0);
    assert_eq!(second.totals().skipped as usize, doc.total_records());
    assert!(second.is_complete());
    assert_eq!(count(&target, &EMPLOYEE), 5);
}

#[test]
fn second_overwrite_restore_updates_nothing() {
    let doc = snapshot_of_full_store();
    let target = MemoryStore::default();
    restore(&target, &doc, ConflictPolicy::Overwrite);

    let second = restore(&target, &doc, ConflictPolicy::Overwrite);
    assert_eq!(second.totals().inserted, 0);
    assert_eq!(second.totals().updated, 0);
    assert_eq!(second.totals().skipped as usize, doc.total_records());
}

#[test]
fn repeated_skip_restore_into_sqlite_is_stable() {
    let doc = snapshot_of_full_store();
    let (_dir, target) = sqlite_store("target");

    restore(&target, &doc, ConflictPolicy::Skip);
    let before = portable_rows(&target, &VEHICLE);
    let second = restore(&target, &doc, ConflictPolicy::Skip);

    assert_eq!(second.totals().inserted, 0);
    assert_eq!(portable_rows(&target, &VEHICLE), before);
}

#[test]
fn dry_run_predicts_a_real_run() {
    let doc = snapshot_of_full_store();
    let target = MemoryStore::default();
    seed_hr(&target, 1, 2);

    let predicted = RestoreEngine::new(&target, RestoreOptions::default().dry_run(true))
        .restore(&doc)
        .unwrap();
    let actual = restore(&target, &doc, ConflictPolicy::Skip);

    for (p, a) in predicted.entities.iter().zip(&actual.entities) {
        assert_eq!(p.entity, a.entity);
        assert_eq!(p.counts, a.counts, "{}", p.entity);
    }
}
