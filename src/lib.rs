//! fleetvault - snapshot, restore and retention for HR and fleet data
//!
//! A snapshot is one JSON document holding every row of the selected entity
//! types, written in foreign-key order. Restoring it into another store
//! rewrites foreign keys through a per-run remap table and resolves rows
//! that already exist with a conflict policy.
//!
//! # Quick Start
//!
//! ```ignore
//! use fleetvault::{MemoryStore, RestoreEngine, RestoreOptions, SnapshotSerializer};
//!
//! let source = MemoryStore::new("hr-main");
//! let document = SnapshotSerializer::new(&source).serialize(&[])?;
//!
//! let target = MemoryStore::new("hr-copy");
//! let summary = RestoreEngine::new(&target, RestoreOptions::default()).restore(&document)?;
//! println!("{}", summary.render_table());
//! ```
//!
//! # Architecture
//!
//! - `fleetvault-core`: values, rows, schema descriptors, restore order
//! - `fleetvault-storage`: store/session traits, in-memory and SQLite stores
//! - `fleetvault-durability`: snapshot format, codec, writer, retention
//! - `fleetvault-engine`: serializer, restore engine, policy, config

pub use fleetvault_core::{
    restore_order, EntityDescriptor, EntityKind, NaturalKey, Row, RowId, SchemaError, StoredRow,
    Value,
};
pub use fleetvault_durability::{
    apply_retention, list_snapshots, read_snapshot, RetentionPolicy, RetentionReport,
    SnapshotDocument, SnapshotError, SnapshotInfo, SnapshotWriter,
};
pub use fleetvault_engine::{
    table_stats, verify_snapshot, ConflictPolicy, EngineError, EngineResult, FleetvaultConfig,
    PhaseStatus, RestoreEngine, RestoreOptions, RestoreSummary, SnapshotSerializer,
};
#[cfg(feature = "sqlite")]
pub use fleetvault_storage::SqliteStore;
pub use fleetvault_storage::{MemoryStore, Session, StorageError, Store};
