//! Offline snapshot verification
//!
//! Checks a snapshot document on its own, without a store: every record
//! must decode, ids and natural keys must be unique within their section,
//! and every non-null foreign key must point at a record of the referenced
//! section. A document that verifies clean restores into an empty store
//! without row failures.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use fleetvault_core::{descriptor, restore_order};
use fleetvault_durability::{decode_record, DecodedRecord, SnapshotDocument};
use serde::Serialize;
use tracing::debug;

use crate::error::EngineResult;

/// One problem found in a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyIssue {
    /// Entity type name
    pub entity: &'static str,
    /// Snapshot-local id, when readable
    pub snapshot_id: Option<i64>,
    /// What is wrong
    pub problem: String,
}

/// Record count of one known section
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionCheck {
    /// Entity type name
    pub entity: &'static str,
    /// Records in the section
    pub records: usize,
    /// Record keys the descriptor does not declare
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<String>,
}

/// Result of [`verify_snapshot`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyReport {
    /// Source recorded in the snapshot
    pub source: String,
    /// Creation time recorded in the snapshot
    pub created_at: DateTime<Utc>,
    /// Known sections, in restore order
    pub sections: Vec<SectionCheck>,
    /// Sections naming no known entity type
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unknown_sections: Vec<String>,
    /// Problems that would fail rows on restore
    pub issues: Vec<VerifyIssue>,
}

impl VerifyReport {
    /// True if no record would fail on restore into an empty store
    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// Records across known sections
    pub fn total_records(&self) -> usize {
        self.sections.iter().map(|s| s.records).sum()
    }
}

/// Verify `document`
///
/// # Errors
///
/// Only a broken restore order fails the call; everything wrong with the
/// document itself is reported as an issue.
pub fn verify_snapshot(document: &SnapshotDocument) -> EngineResult<VerifyReport> {
    let order = restore_order()?;
    let mut report = VerifyReport {
        source: document.source.clone(),
        created_at: document.created_at,
        sections: Vec::new(),
        unknown_sections: document
            .sections
            .iter()
            .filter(|s| descriptor(&s.entity).is_none())
            .map(|s| s.entity.clone())
            .collect(),
        issues: Vec::new(),
    };

    // Snapshot ids present per entity type, filled in restore order so a
    // reference can only be satisfied by an earlier section
    let mut known_ids: HashMap<&'static str, HashSet<i64>> = HashMap::new();

    for entity in order.iter().copied() {
        let Some(records) = document.records(entity.name) else {
            continue;
        };
        let mut ids = HashSet::new();
        let mut keys: HashSet<String> = HashSet::new();
        let mut unknown_fields = BTreeSet::new();

        for record in records {
            let snapshot_id = record.get("id").and_then(|v| v.as_i64());
            let mut issue = |problem: String| {
                report.issues.push(VerifyIssue {
                    entity: entity.name,
                    snapshot_id,
                    problem,
                })
            };

            let DecodedRecord {
                id,
                row,
                unknown_fields: extra,
            } = match decode_record(entity, record) {
                Ok(decoded) => decoded,
                Err(e) => {
                    issue(e.to_string());
                    continue;
                }
            };
            unknown_fields.extend(extra);

            if !ids.insert(id) {
                issue(format!("duplicate id {}", id));
            }
            if let Ok(key) = entity.natural_key_of(&row) {
                if !keys.insert(key.to_string()) {
                    issue(format!("duplicate natural key {}", key));
                }
            }
            for fk in entity.foreign_keys() {
                let Some(target_id) = row.get_or_null(fk.name).as_int() else {
                    continue;
                };
                let target = fk.references.unwrap_or_default();
                let present = known_ids
                    .get(target)
                    .map(|ids| ids.contains(&target_id))
                    .unwrap_or(false);
                if !present {
                    issue(format!(
                        "unresolved reference {} -> {} #{}",
                        fk.name, target, target_id
                    ));
                }
            }
        }

        debug!(
            target: "fleetvault::restore",
            entity = entity.name,
            records = records.len(),
            "Verified section"
        );
        report.sections.push(SectionCheck {
            entity: entity.name,
            records: records.len(),
            unknown_fields: unknown_fields.into_iter().collect(),
        });
        known_ids.insert(entity.name, ids);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetvault_durability::{EntitySection, Record};
    use serde_json::json;

    fn record(value: serde_json::Value) -> Record {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("record must be an object"),
        }
    }

    fn section(entity: &str, records: Vec<serde_json::Value>) -> EntitySection {
        EntitySection {
            entity: entity.to_string(),
            records: records.into_iter().map(record).collect(),
        }
    }

    fn document(sections: Vec<EntitySection>) -> SnapshotDocument {
        let mut doc = SnapshotDocument::new("hr-main", Utc::now());
        doc.sections = sections;
        doc
    }

    fn vehicle(id: i64, plate: &str) -> serde_json::Value {
        json!({
            "id": id, "plate_number": plate, "make": "Toyota", "model": "Hilux",
            "year": 2022, "color": "white", "status": "available", "type_of_car": "pickup"
        })
    }

    #[test]
    fn test_clean_document_verifies() {
        let doc = document(vec![
            section("vehicle", vec![vehicle(1, "ABC-1"), vehicle(2, "ABC-2")]),
            section(
                "vehicle_workshop",
                vec![json!({
                    "id": 1, "vehicle_id": 2, "entry_date": "2026-01-10",
                    "reason": "service", "description": "oil", "repair_status": "done"
                })],
            ),
        ]);
        let report = verify_snapshot(&doc).unwrap();
        assert!(report.is_ok(), "{:?}", report.issues);
        assert_eq!(report.total_records(), 3);
        assert_eq!(report.sections[0].entity, "vehicle");
    }

    #[test]
    fn test_dangling_reference_is_reported() {
        let doc = document(vec![section(
            "vehicle_accident",
            vec![json!({
                "id": 4, "vehicle_id": 9, "accident_date": "2026-01-10", "driver_name": "Sam"
            })],
        )]);
        let report = verify_snapshot(&doc).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].snapshot_id, Some(4));
        assert_eq!(
            report.issues[0].problem,
            "unresolved reference vehicle_id -> vehicle #9"
        );
    }

    #[test]
    fn test_duplicates_and_decode_failures() {
        let doc = document(vec![section(
            "vehicle",
            vec![
                vehicle(1, "ABC-1"),
                vehicle(1, "ABC-2"),
                vehicle(3, "ABC-1"),
                json!({"id": 4, "plate_number": "X"}),
            ],
        )]);
        let problems: Vec<String> = verify_snapshot(&doc)
            .unwrap()
            .issues
            .into_iter()
            .map(|i| i.problem)
            .collect();
        assert_eq!(problems.len(), 3);
        assert_eq!(problems[0], "duplicate id 1");
        assert_eq!(problems[1], "duplicate natural key ABC-1");
        assert_eq!(problems[2], "required field 'make' is missing");
    }

    #[test]
    fn test_unknown_sections_and_fields_are_warnings() {
        let mut v = vehicle(1, "ABC-1");
        v["gps_tracker"] = json!("T-1");
        let doc = document(vec![section("vehicle", vec![v]), section("audit_log", vec![])]);
        let report = verify_snapshot(&doc).unwrap();
        assert!(report.is_ok());
        assert_eq!(report.unknown_sections, vec!["audit_log".to_string()]);
        assert_eq!(report.sections[0].unknown_fields, vec!["gps_tracker".to_string()]);
    }
}
