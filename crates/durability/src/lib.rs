//! Durability layer for fleetvault
//!
//! This crate handles everything that touches snapshot files:
//!
//! - Snapshot document: versioned JSON container of entity sections
//! - Field codec: stored rows to snapshot records and back (base64 blobs)
//! - Crash-safe writer: write-fsync-rename with timestamp-derived names
//! - Reader: version check, directory listing newest first
//! - Retention: prune a snapshot directory by count and age

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec; // Row <-> record field codec
pub mod document; // Snapshot document model and JSON shape
pub mod error; // SnapshotError, SerializationError, DecodeError
pub mod reader; // Snapshot loading and discovery
pub mod retention; // Count/age retention of snapshot files
pub mod writer; // Crash-safe snapshot writer

// === Re-exports ===
pub use codec::{decode_record, decode_value, encode_record, encode_value, DecodedRecord, ID_FIELD};
pub use document::{EntitySection, Record, SnapshotDocument, SNAPSHOT_FORMAT_VERSION};
pub use error::{DecodeError, SerializationError, SnapshotError, SnapshotResult};
pub use reader::{
    collision_sequence, list_snapshots, parse_snapshot_timestamp, read_snapshot, SnapshotFile,
};
pub use retention::{
    apply_retention, apply_retention_at, RetentionIoError, RetentionPolicy, RetentionPolicyError,
    RetentionReport,
};
pub use writer::{SnapshotInfo, SnapshotWriter};
