//! Walkthroughs over a small HR data set

use fleetvault::{EntityKind, PhaseStatus};
use fleetvault_core::schema::{DEPARTMENT, EMPLOYEE};

use crate::common::*;

fn hr_snapshot() -> SnapshotDocument {
    let source = MemoryStore::new("hr-main");
    seed_hr(&source, 2, 5);
    SnapshotSerializer::new(&source)
        .serialize(&[EntityKind::Department, EntityKind::Employee])
        .unwrap()
}

#[test]
fn two_departments_and_five_employees_into_empty_store() {
    let doc = hr_snapshot();
    let target = MemoryStore::default();
    let summary = restore(&target, &doc, ConflictPolicy::Skip);

    let departments = summary.counts("department").unwrap();
    let employees = summary.counts("employee").unwrap();
    assert_eq!(departments.inserted, 2);
    assert_eq!(employees.inserted, 5);
    assert_eq!(summary.totals().failed, 0);
    assert!(summary.failures.is_empty());
    assert!(summary.is_complete());
}

#[test]
fn same_snapshot_again_with_abort_on_error_stops_at_first_collision() {
    let doc = hr_snapshot();
    let target = MemoryStore::default();
    restore(&target, &doc, ConflictPolicy::Skip);

    let summary = restore(&target, &doc, ConflictPolicy::AbortOnError);

    assert_eq!(summary.aborted_at, Some("department"));
    assert_eq!(summary.not_processed, vec!["employee"]);
    assert_eq!(summary.entities.len(), 1);
    assert_eq!(summary.entities[0].status, PhaseStatus::RolledBack);
    assert_eq!(summary.counts("department").unwrap().failed, 1);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].natural_key, "Dept 1");
    assert!(!summary.is_complete());
    assert!(summary.render_table().contains("aborted at department"));

    assert_eq!(count(&target, &DEPARTMENT), 2);
    assert_eq!(count(&target, &EMPLOYEE), 5);
}

#[test]
fn abort_keeps_phases_committed_before_the_collision() {
    let doc = hr_snapshot();
    let target = MemoryStore::default();
    // Only one employee exists up front, so departments restore cleanly
    {
        let mut s = target.begin().unwrap();
        s.insert(&EMPLOYEE, &employee("E-003", None)).unwrap();
        s.commit().unwrap();
    }

    let summary = restore(&target, &doc, ConflictPolicy::AbortOnError);

    assert_eq!(summary.entities[0].status, PhaseStatus::Committed);
    assert_eq!(summary.counts("department").unwrap().inserted, 2);
    assert_eq!(summary.aborted_at, Some("employee"));
    assert_eq!(summary.failures[0].natural_key, "E-003");
    // E-001 and E-002 were inserted before the collision and rolled back with it
    assert_eq!(summary.counts("employee").unwrap().inserted, 2);
    assert_eq!(summary.totals().inserted, 2);
    assert_eq!(count(&target, &DEPARTMENT), 2);
    assert_eq!(count(&target, &EMPLOYEE), 1);
}

#[test]
fn employees_without_their_departments_fail_individually() {
    let source = MemoryStore::new("hr-main");
    seed_hr(&source, 2, 5);
    {
        let mut s = source.begin().unwrap();
        s.insert(&EMPLOYEE, &employee("E-100", None)).unwrap();
        s.commit().unwrap();
    }
    let doc = SnapshotSerializer::new(&source)
        .serialize(&[EntityKind::Employee])
        .unwrap();

    let target = MemoryStore::default();
    let summary = restore(&target, &doc, ConflictPolicy::Skip);

    let employees = summary.counts("employee").unwrap();
    assert_eq!((employees.inserted, employees.failed), (1, 5));
    assert!(summary.failures.iter().all(|f| f.reason.starts_with("unresolved reference")));
    assert_eq!(natural_keys(&target, &EMPLOYEE).into_iter().collect::<Vec<_>>(), ["E-100"]);
}
