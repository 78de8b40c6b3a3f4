//! Error types for snapshot files

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for snapshot file operations
pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;

/// A stored value that cannot be represented in a snapshot document
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializationError {
    /// Value type disagrees with the declared field type
    #[error("{entity}.{field}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Entity type
        entity: &'static str,
        /// Field name
        field: &'static str,
        /// Declared type
        expected: &'static str,
        /// Actual value type
        found: &'static str,
    },

    /// NaN or infinite decimal
    #[error("{entity}.{field}: non-finite decimal {value}")]
    NonFinite {
        /// Entity type
        entity: &'static str,
        /// Field name
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// Null in a NOT NULL field
    #[error("{entity}.{field}: null in a required field")]
    NullInRequired {
        /// Entity type
        entity: &'static str,
        /// Field name
        field: &'static str,
    },

    /// The store returned a field the descriptor does not declare
    #[error("{entity}: undeclared field '{field}'")]
    UndeclaredField {
        /// Entity type
        entity: &'static str,
        /// Field name
        field: String,
    },
}

/// A snapshot record that cannot be turned back into a row
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Record is not a JSON object
    #[error("record is not an object")]
    NotAnObject,

    /// Record has no snapshot-local `id`
    #[error("record has no 'id'")]
    MissingId,

    /// `id` is not an integer
    #[error("record id is not an integer: {0}")]
    InvalidId(String),

    /// A required field is absent or null
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    /// A field value does not match its declared type
    #[error("field '{field}' expects {expected}, found {found}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Declared type
        expected: &'static str,
        /// Offending JSON text
        found: String,
    },
}

/// Errors raised while writing, reading or validating snapshot files
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON syntax or shape error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document declares a format version this build cannot read
    #[error("Unsupported snapshot version {found} (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the document (or "missing")
        found: String,
        /// The one supported version
        supported: u32,
    },

    /// Structurally invalid document
    #[error("Malformed snapshot: {0}")]
    Malformed(String),

    /// A stored value cannot be represented
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// The writer could not find a free file name
    #[error("No free snapshot file name for {0}")]
    NameExhausted(PathBuf),
}
