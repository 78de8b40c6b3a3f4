//! ID remap table
//!
//! Maps `(entity type, snapshot-local id)` to the primary key the row has
//! in the target store. Filled as each entity type is restored and
//! consulted when a dependent row's foreign keys are rewritten. Lives for
//! one restore run only.

use std::collections::HashMap;

use fleetvault_core::{EntityDescriptor, Row, RowId};

use crate::error::RowError;

/// Per-run mapping from snapshot ids to target ids
#[derive(Debug, Default, Clone)]
pub struct IdRemap {
    entries: HashMap<(&'static str, i64), RowId>,
}

impl IdRemap {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Record where a snapshot row ended up
    pub fn record(&mut self, entity: &'static str, snapshot_id: i64, target: RowId) {
        self.entries.insert((entity, snapshot_id), target);
    }

    /// Target id of a snapshot row
    pub fn resolve(&self, entity: &'static str, snapshot_id: i64) -> Option<RowId> {
        self.entries.get(&(entity, snapshot_id)).copied()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge entries staged during a phase
    pub fn extend(&mut self, staged: IdRemap) {
        self.entries.extend(staged.entries);
    }

    /// Rewrite every non-null foreign key of `row` from snapshot ids to
    /// target ids
    ///
    /// # Errors
    ///
    /// `UnresolvedReference` for the first foreign key with no entry.
    pub fn rewrite_references(
        &self,
        entity: &'static EntityDescriptor,
        row: &mut Row,
    ) -> Result<(), RowError> {
        for fk in entity.foreign_keys() {
            let Some(snapshot_id) = row.get_or_null(fk.name).as_int() else {
                continue;
            };
            let target = fk.references.unwrap_or_default();
            let resolved = self
                .resolve(target, snapshot_id)
                .ok_or(RowError::UnresolvedReference {
                    field: fk.name,
                    target,
                    snapshot_id,
                })?;
            row.set(fk.name, resolved.get());
        }
        Ok(())
    }
}
