//! Storage error types

use fleetvault_core::{RowId, SchemaError};

/// Result type alias for store operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors raised by a [`Store`](crate::Store) or its sessions
///
/// `ConstraintViolation` and `RowNotFound` concern a single row and leave
/// the session usable; everything else means the backend itself failed.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The row breaks a NOT NULL, type, uniqueness or foreign-key rule
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Update target does not exist
    #[error("Row {id} of '{entity}' not found")]
    RowNotFound {
        /// Entity type
        entity: &'static str,
        /// Missing primary key
        id: RowId,
    },

    /// Another session holds the store
    #[error("Store is busy: another session is active")]
    Busy,

    /// Schema error surfaced while reading rows
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Backend failure (I/O, corrupt data, driver error)
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// True if the error concerns one row rather than the backend
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            StorageError::ConstraintViolation(_) | StorageError::RowNotFound { .. }
        )
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                StorageError::ConstraintViolation(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => StorageError::Backend(e.to_string()),
        }
    }
}
