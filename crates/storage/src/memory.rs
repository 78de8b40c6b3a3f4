//! In-memory store
//!
//! `MemoryStore` keeps every table in a `BTreeMap<RowId, Row>` behind a
//! single `parking_lot::Mutex`. A session takes the lock for its whole
//! lifetime and works on a staged copy of the tables; `commit` swaps the
//! copy in, `rollback` or drop throws it away.
//!
//! # Design Notes
//!
//! - Enforces the same rules the relational schema does: declared columns,
//!   value types, NOT NULL, natural-key uniqueness and foreign-key existence
//! - Primary keys are assigned from a per-table counter and never reused
//! - Each table keeps a natural-key index, so lookups and uniqueness checks
//!   do not scan the table
//! - `try_lock` instead of `lock`: a second concurrent session is an error,
//!   not a deadlock

use std::collections::{BTreeMap, HashMap};

use fleetvault_core::{EntityDescriptor, NaturalKey, Row, RowId, StoredRow};
use parking_lot::{Mutex, MutexGuard};

use crate::constraints::{check_fields, check_row};
use crate::error::{StorageError, StorageResult};
use crate::traits::{Session, Store};

#[derive(Debug, Clone, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<RowId, Row>,
    by_key: HashMap<IndexKey, RowId>,
}

/// Hashable form of a natural key
///
/// `Value` holds floats and so is neither `Eq` nor `Hash`; the debug
/// rendering keeps variant and quoting, so distinct keys never collide.
type IndexKey = String;

fn index_key(key: &NaturalKey) -> IndexKey {
    format!("{:?}", key.0)
}

type Tables = HashMap<&'static str, Table>;

/// Store holding all rows in process memory
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store identified by `name`
    pub fn new(name: impl Into<String>) -> Self {
        MemoryStore {
            name: name.into(),
            tables: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl Store for MemoryStore {
    fn begin(&self) -> StorageResult<Box<dyn Session + '_>> {
        let guard = self.tables.try_lock().ok_or(StorageError::Busy)?;
        let staged = guard.clone();
        Ok(Box::new(MemorySession { guard, staged }))
    }

    fn source(&self) -> String {
        self.name.clone()
    }
}

struct MemorySession<'a> {
    guard: MutexGuard<'a, Tables>,
    staged: Tables,
}

impl MemorySession<'_> {
    fn table(&self, entity: &EntityDescriptor) -> Option<&Table> {
        self.staged.get(entity.name)
    }

    /// Reject a row whose natural key is already taken by another row
    fn check_unique(
        &self,
        entity: &'static EntityDescriptor,
        row: &Row,
        own_id: Option<RowId>,
    ) -> StorageResult<()> {
        let key = entity.natural_key_of(row)?;
        if let Some(existing) = self.lookup(entity, &key) {
            if Some(existing.id) != own_id {
                return Err(StorageError::ConstraintViolation(format!(
                    "UNIQUE constraint failed: {} natural key {}",
                    entity.name, key
                )));
            }
        }
        Ok(())
    }

    /// Reject a row whose non-null foreign keys point at missing rows
    fn check_references(&self, entity: &EntityDescriptor, row: &Row) -> StorageResult<()> {
        for fk in entity.foreign_keys() {
            let value = row.get_or_null(fk.name);
            let Some(id) = value.as_int() else {
                continue;
            };
            let target = fk.references.unwrap_or_default();
            let exists = self
                .staged
                .get(target)
                .map(|t| t.rows.contains_key(&RowId(id)))
                .unwrap_or(false);
            if !exists {
                return Err(StorageError::ConstraintViolation(format!(
                    "FOREIGN KEY constraint failed: {}.{} = {} has no {} row",
                    entity.name, fk.name, id, target
                )));
            }
        }
        Ok(())
    }

    fn lookup(&self, entity: &EntityDescriptor, key: &NaturalKey) -> Option<StoredRow> {
        let table = self.table(entity)?;
        let id = table.by_key.get(&index_key(key))?;
        table.rows.get(id).map(|row| StoredRow::new(*id, row.clone()))
    }
}

impl Session for MemorySession<'_> {
    fn scan(&mut self, entity: &'static EntityDescriptor) -> StorageResult<Vec<StoredRow>> {
        Ok(self
            .table(entity)
            .map(|t| {
                t.rows
                    .iter()
                    .map(|(id, row)| StoredRow::new(*id, row.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn count(&mut self, entity: &'static EntityDescriptor) -> StorageResult<u64> {
        Ok(self.table(entity).map(|t| t.rows.len() as u64).unwrap_or(0))
    }

    fn find_by_natural_key(
        &mut self,
        entity: &'static EntityDescriptor,
        key: &NaturalKey,
    ) -> StorageResult<Option<StoredRow>> {
        Ok(self.lookup(entity, key))
    }

    fn insert(&mut self, entity: &'static EntityDescriptor, row: &Row) -> StorageResult<RowId> {
        check_row(entity, row)?;
        self.check_unique(entity, row, None)?;
        self.check_references(entity, row)?;
        let key = index_key(&entity.natural_key_of(row)?);

        let table = self.staged.entry(entity.name).or_default();
        table.last_id += 1;
        let id = RowId(table.last_id);
        table.rows.insert(id, row.clone());
        table.by_key.insert(key, id);
        Ok(id)
    }

    fn update(
        &mut self,
        entity: &'static EntityDescriptor,
        id: RowId,
        row: &Row,
    ) -> StorageResult<()> {
        check_fields(entity, row)?;
        let current = self
            .table(entity)
            .and_then(|t| t.rows.get(&id))
            .cloned()
            .ok_or(StorageError::RowNotFound {
                entity: entity.name,
                id,
            })?;
        let mut merged = current.clone();
        for (name, value) in row.iter() {
            merged.set(name, value.clone());
        }
        check_row(entity, &merged)?;
        self.check_unique(entity, &merged, Some(id))?;
        self.check_references(entity, &merged)?;
        let old_key = index_key(&entity.natural_key_of(&current)?);
        let new_key = index_key(&entity.natural_key_of(&merged)?);

        if let Some(table) = self.staged.get_mut(entity.name) {
            table.rows.insert(id, merged);
            if old_key != new_key {
                table.by_key.remove(&old_key);
                table.by_key.insert(new_key, id);
            }
        }
        Ok(())
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        let MemorySession { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}
