//! Row-level constraint checks shared by the stores
//!
//! The in-memory store relies on these entirely. The SQLite store runs
//! them before every write too, since SQLite column affinity would
//! otherwise accept a value of the wrong type.

use fleetvault_core::{EntityDescriptor, Row};

use crate::error::{StorageError, StorageResult};

/// Check declared fields, value types and NOT NULL rules of a complete row
///
/// A field absent from `row` counts as null.
pub fn check_row(entity: &EntityDescriptor, row: &Row) -> StorageResult<()> {
    check_fields(entity, row)?;
    for field in entity.fields {
        if !field.nullable && row.get_or_null(field.name).is_null() {
            return Err(StorageError::ConstraintViolation(format!(
                "NOT NULL constraint failed: {}.{}",
                entity.name, field.name
            )));
        }
    }
    Ok(())
}

/// Check declared fields and value types of a partial row
pub fn check_fields(entity: &EntityDescriptor, row: &Row) -> StorageResult<()> {
    for (name, value) in row.iter() {
        let field = entity.field(name).ok_or_else(|| {
            StorageError::ConstraintViolation(format!(
                "table {} has no column named {}",
                entity.name, name
            ))
        })?;
        if !value.is_null() && !field.ty.accepts(value) {
            return Err(StorageError::ConstraintViolation(format!(
                "{}.{} expects {}, got {}",
                entity.name,
                name,
                field.ty.name(),
                value.type_name()
            )));
        }
    }
    Ok(())
}
