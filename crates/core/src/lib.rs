//! Core types for fleetvault
//!
//! This crate defines the foundational types used throughout the pipeline:
//! - Value: scalar vocabulary of persisted fields
//! - Row / RowId / NaturalKey: row-level data shared by stores and codecs
//! - FieldType / FieldDescriptor / EntityDescriptor: static schema tables
//! - EntityKind: the entity types of the HR/fleet schema
//! - order: the validated foreign-key restore order
//! - temporal: canonical text forms of dates and times
//! - SchemaError: configuration-time error type

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod order;
pub mod row;
pub mod schema;
pub mod temporal;
pub mod value;

pub use error::{SchemaError, SchemaResult};
pub use order::{in_restore_order, restore_order, restore_rank, topological_order, RESTORE_ORDER};
pub use row::{NaturalKey, Row, RowId, StoredRow};
pub use schema::{
    all_descriptors, descriptor, EntityDescriptor, EntityKind, FieldDescriptor, FieldType,
};
pub use value::Value;
