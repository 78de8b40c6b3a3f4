//! Pipeline engine for fleetvault
//!
//! This crate orchestrates the lower layers:
//! - Serializer: store rows to snapshot documents
//! - Restore engine: snapshot documents back into a store, phase by phase
//! - Conflict policy and ID remap used during restore
//! - Verification of snapshot documents without a store
//! - Live table statistics
//! - Configuration file
//!
//! The engine is the only component that knows about both the store
//! traits and the snapshot format.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod policy;
pub mod remap;
pub mod restore;
pub mod serializer;
pub mod stats;
pub mod summary;
pub mod verify;

pub use config::{ConfigError, FleetvaultConfig, RestoreConfig, RetentionConfig, CONFIG_FILE_NAME};
pub use error::{EngineError, EngineResult, RowError};
pub use policy::{is_unchanged, ConflictPolicy, Decision};
pub use remap::IdRemap;
pub use restore::{RestoreEngine, RestoreOptions};
pub use serializer::SnapshotSerializer;
pub use stats::{table_stats, TableCount, TableStats};
pub use summary::{EntityCounts, EntityReport, PhaseStatus, RestoreSummary, RowFailure};
pub use verify::{verify_snapshot, SectionCheck, VerifyIssue, VerifyReport};
