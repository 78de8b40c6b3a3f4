//! Error types for the pipeline engine
//!
//! Two levels:
//! - [`EngineError`]: aborts the whole operation (configuration, schema,
//!   unreadable snapshot, store unavailable)
//! - [`RowError`]: fails a single record during restore; tallied in the
//!   summary and, unless the policy is abort-on-error, processing continues

use fleetvault_core::SchemaError;
use fleetvault_durability::{DecodeError, SerializationError, SnapshotError};
use fleetvault_storage::StorageError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for engine operations
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Operation-level failure
#[derive(Debug, Error)]
pub enum EngineError {
    /// Broken descriptor table or restore order (includes `DependencyCycle`)
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Store could not be opened, read or committed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Snapshot file could not be written or read
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// A stored value has no snapshot representation
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Invalid configuration or option value
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Why one snapshot record could not be restored
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// The record does not decode against the descriptor
    #[error("{0}")]
    Decode(#[from] DecodeError),

    /// A foreign key points at a snapshot row that was not restored
    #[error("unresolved reference {field} -> {target} #{snapshot_id}")]
    UnresolvedReference {
        /// Foreign-key field
        field: &'static str,
        /// Referenced entity type
        target: &'static str,
        /// Snapshot-local id that has no remap entry
        snapshot_id: i64,
    },

    /// The store rejected the row
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A row with the same natural key exists and the policy forbids touching it
    #[error("natural key already exists")]
    Conflict,
}

impl RowError {
    /// Short machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            RowError::Decode(_) => "decode",
            RowError::UnresolvedReference { .. } => "unresolved_reference",
            RowError::ConstraintViolation(_) => "constraint_violation",
            RowError::Conflict => "conflict",
        }
    }
}
