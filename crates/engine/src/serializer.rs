//! Snapshot serializer
//!
//! Walks the selected entity types in restore order and encodes every
//! current row into one [`SnapshotDocument`]. All reads happen in a single
//! session so the document is a consistent cut of the store; the session
//! is rolled back at the end since nothing is written.

use chrono::{DateTime, Utc};
use fleetvault_core::{in_restore_order, restore_order, EntityKind};
use fleetvault_durability::{
    encode_record, EntitySection, SnapshotDocument, SnapshotInfo, SnapshotWriter,
};
use fleetvault_storage::Store;
use tracing::{debug, info, warn};

use crate::error::EngineResult;

/// Builds snapshot documents from a store
pub struct SnapshotSerializer<'a> {
    store: &'a dyn Store,
    source: String,
}

impl<'a> SnapshotSerializer<'a> {
    /// Serializer over `store`, recording the store's own identifier as
    /// the snapshot source
    pub fn new(store: &'a dyn Store) -> Self {
        SnapshotSerializer {
            source: store.source(),
            store,
        }
    }

    /// Override the source identifier recorded in documents
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Serialize `selection` (every entity type when empty) as of now
    pub fn serialize(&self, selection: &[EntityKind]) -> EngineResult<SnapshotDocument> {
        self.serialize_at(selection, Utc::now())
    }

    /// Serialize `selection` with an explicit creation time
    ///
    /// # Errors
    ///
    /// - `Schema`: the restore order failed validation
    /// - `Serialization`: a stored value has no snapshot representation
    /// - `Storage`: the store could not be read
    pub fn serialize_at(
        &self,
        selection: &[EntityKind],
        created_at: DateTime<Utc>,
    ) -> EngineResult<SnapshotDocument> {
        let order = restore_order()?;
        let kinds = if selection.is_empty() {
            EntityKind::ALL.to_vec()
        } else {
            in_restore_order(selection)
        };
        warn_missing_dependencies(&kinds);

        let mut document = SnapshotDocument::new(self.source.clone(), created_at);
        let mut session = self.store.begin()?;
        for entity in order
            .iter()
            .copied()
            .filter(|d| kinds.iter().any(|k| k.name() == d.name))
        {
            let rows = session.scan(entity)?;
            let mut records = Vec::with_capacity(rows.len());
            for stored in &rows {
                records.push(encode_record(entity, stored)?);
            }
            debug!(
                target: "fleetvault::snapshot",
                entity = entity.name,
                rows = records.len(),
                "Serialized entity type"
            );
            document.sections.push(EntitySection {
                entity: entity.name.to_string(),
                records,
            });
        }
        session.rollback()?;

        info!(
            target: "fleetvault::snapshot",
            source = %self.source,
            entities = document.sections.len(),
            records = document.total_records(),
            "Snapshot document built"
        );
        Ok(document)
    }

    /// Serialize `selection` and write it through `writer`
    pub fn write_snapshot(
        &self,
        selection: &[EntityKind],
        writer: &SnapshotWriter,
    ) -> EngineResult<SnapshotInfo> {
        let document = self.serialize(selection)?;
        Ok(writer.write(&document)?)
    }
}

/// Log every referenced entity type left out of the selection
///
/// Rows of the selected types that reference such a type will fail to
/// restore into a store that lacks the referenced rows.
fn warn_missing_dependencies(kinds: &[EntityKind]) {
    for kind in kinds {
        for dependency in kind.descriptor().dependencies() {
            if !kinds.iter().any(|k| k.name() == dependency) {
                warn!(
                    target: "fleetvault::snapshot",
                    entity = kind.name(),
                    dependency,
                    "Referenced entity type is not part of the snapshot"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fleetvault_core::schema::{DEPARTMENT, SALARY};
    use fleetvault_core::{Row, Value};
    use fleetvault_durability::SerializationError;
    use fleetvault_storage::MemoryStore;
    use serde_json::json;

    use crate::error::EngineError;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new("hr-main");
        let mut s = store.begin().unwrap();
        s.insert(&DEPARTMENT, &Row::new().with("name", "Fleet")).unwrap();
        s.insert(&DEPARTMENT, &Row::new().with("name", "HR")).unwrap();
        s.commit().unwrap();
        store
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_serialize_all_entity_types_in_order() {
        let store = seeded_store();
        let doc = SnapshotSerializer::new(&store).serialize_at(&[], at()).unwrap();

        let names: Vec<&str> = doc.sections.iter().map(|s| s.entity.as_str()).collect();
        let expected: Vec<&str> = restore_order().unwrap().iter().map(|d| d.name).collect();
        assert_eq!(names, expected);
        assert_eq!(doc.source, "hr-main");
        assert_eq!(doc.created_at, at());

        let departments = doc.records("department").unwrap();
        assert_eq!(departments.len(), 2);
        assert_eq!(departments[0]["id"], json!(1));
        assert_eq!(departments[1]["name"], json!("HR"));
    }

    #[test]
    fn test_subset_is_emitted_in_restore_order() {
        let store = seeded_store();
        let doc = SnapshotSerializer::new(&store)
            .with_source("nightly")
            .serialize_at(&[EntityKind::Salary, EntityKind::Department], at())
            .unwrap();
        let names: Vec<&str> = doc.sections.iter().map(|s| s.entity.as_str()).collect();
        assert_eq!(names, vec!["department", "salary"]);
        assert_eq!(doc.source, "nightly");
    }

    #[test]
    fn test_serializer_leaves_store_untouched() {
        let store = seeded_store();
        SnapshotSerializer::new(&store).serialize_at(&[], at()).unwrap();
        let mut s = store.begin().unwrap();
        assert_eq!(s.count(&DEPARTMENT).unwrap(), 2);
    }

    #[test]
    fn test_write_snapshot_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store();
        let writer = SnapshotWriter::new(dir.path()).unwrap();
        let info = SnapshotSerializer::new(&store)
            .write_snapshot(&[EntityKind::Department], &writer)
            .unwrap();
        assert_eq!(info.records, 2);
        assert!(info.path.starts_with(dir.path()));
    }

    #[test]
    fn test_unrepresentable_value_fails() {
        // Stores validate types on write, so reach the encoder directly
        let stored = fleetvault_core::StoredRow::new(
            fleetvault_core::RowId(1),
            Row::new()
                .with("employee_id", 1i64)
                .with("month", 1i64)
                .with("year", 2026i64)
                .with("basic_salary", f64::INFINITY)
                .with("net_salary", 1.0)
                .with("is_paid", Value::Bool(false)),
        );
        let err: EngineError = encode_record(&SALARY, &stored).unwrap_err().into();
        assert!(matches!(
            err,
            EngineError::Serialization(SerializationError::NonFinite { .. })
        ));
    }
}
