//! Store and session traits
//!
//! A [`Store`] is the data-access seam the pipeline runs against. All reads
//! and writes happen inside a [`Session`], which is one transaction:
//! nothing it writes is visible to a later session until `commit`, and
//! `rollback` (or dropping the session) discards everything.
//!
//! # Thread Safety
//!
//! Stores must be `Send + Sync`. A store admits one session at a time;
//! `begin` fails with [`StorageError::Busy`](crate::StorageError::Busy)
//! while another session is open.

use fleetvault_core::{EntityDescriptor, NaturalKey, Row, RowId, StoredRow};

use crate::error::StorageResult;

/// A transactional store of entity rows
pub trait Store: Send + Sync {
    /// Open a session (one transaction)
    fn begin(&self) -> StorageResult<Box<dyn Session + '_>>;

    /// Identifier of the store, recorded as the snapshot source
    fn source(&self) -> String;
}

/// One transaction against a [`Store`]
pub trait Session {
    /// All rows of an entity type, in primary-key order
    fn scan(&mut self, entity: &'static EntityDescriptor) -> StorageResult<Vec<StoredRow>>;

    /// Number of rows of an entity type
    fn count(&mut self, entity: &'static EntityDescriptor) -> StorageResult<u64> {
        Ok(self.scan(entity)?.len() as u64)
    }

    /// Row whose natural key equals `key`, if any
    fn find_by_natural_key(
        &mut self,
        entity: &'static EntityDescriptor,
        key: &NaturalKey,
    ) -> StorageResult<Option<StoredRow>>;

    /// Insert a row; the store assigns the primary key
    ///
    /// Fields absent from `row` are stored as null.
    fn insert(&mut self, entity: &'static EntityDescriptor, row: &Row) -> StorageResult<RowId>;

    /// Overwrite the fields present in `row` on an existing row
    fn update(
        &mut self,
        entity: &'static EntityDescriptor,
        id: RowId,
        row: &Row,
    ) -> StorageResult<()>;

    /// Make every write of this session durable
    fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discard every write of this session
    fn rollback(self: Box<Self>) -> StorageResult<()>;
}
