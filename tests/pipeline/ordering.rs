//! Referenced entity types are restored strictly before referencing ones

use fleetvault::EntityKind;
use fleetvault_core::restore_rank;

use crate::common::*;

#[test]
fn every_reference_points_backwards_in_restore_order() {
    let order = restore_order().unwrap();
    for (rank, entity) in order.iter().enumerate() {
        for dependency in entity.dependencies() {
            let dep_rank = restore_rank(dependency).unwrap();
            assert!(
                dep_rank < rank,
                "{} (rank {}) depends on {} (rank {})",
                entity.name,
                rank,
                dependency,
                dep_rank
            );
        }
    }
}

#[test]
fn snapshot_sections_follow_restore_order() {
    let source = MemoryStore::new("source");
    seed_full(&source);
    let doc = SnapshotSerializer::new(&source)
        .serialize(&[EntityKind::VehicleAccident, EntityKind::Vehicle, EntityKind::Employee])
        .unwrap();
    let names: Vec<&str> = doc.sections.iter().map(|s| s.entity.as_str()).collect();
    assert_eq!(names, vec!["employee", "vehicle", "vehicle_accident"]);
}

#[test]
fn restore_ignores_document_section_order() {
    let source = MemoryStore::new("source");
    seed_full(&source);
    let mut doc = SnapshotSerializer::new(&source).serialize(&[]).unwrap();
    doc.sections.reverse();

    let target = MemoryStore::default();
    let summary = restore(&target, &doc, ConflictPolicy::Skip);

    assert!(summary.is_complete(), "{}", summary.render_table());
    let processed: Vec<&str> = summary.entities.iter().map(|r| r.entity).collect();
    let expected: Vec<&str> = restore_order().unwrap().iter().map(|e| e.name).collect();
    assert_eq!(processed, expected);
}
