//! Storage layer for fleetvault
//!
//! This crate defines the data-access seam of the backup pipeline:
//! - Store / Session: transactional access to entity rows
//! - MemoryStore: Mutex-guarded in-process tables, used by tests and dry runs
//! - SqliteStore: the relational backend (feature `sqlite`)
//! - constraints: row-level rule checks shared by both stores
//!
//! Sessions are the unit of atomicity. The restore engine opens one session
//! per entity type and commits or rolls it back as a whole.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod constraints;
pub mod error;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use traits::{Session, Store};
