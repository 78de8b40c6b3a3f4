//! Snapshot document
//!
//! On disk a snapshot is one JSON object:
//!
//! ```text
//! {
//!   "version": 1,
//!   "created_at": "2026-02-15T20:21:13Z",
//!   "source": "/var/lib/fleet/fleet.db",
//!   "department": [ { "id": 1, "name": "Operations", ... }, ... ],
//!   "employee":   [ ... ],
//!   ...
//! }
//! ```
//!
//! Entity sections are written in restore order. Every record carries its
//! snapshot-local primary key under `id`; foreign-key fields hold
//! snapshot-local ids of the referenced rows.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::error::{SnapshotError, SnapshotResult};

/// The one snapshot format version this build reads and writes
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Reserved top-level keys
pub const RESERVED_KEYS: [&str; 3] = ["version", "created_at", "source"];

/// One encoded row: field name to JSON scalar, plus `id`
pub type Record = Map<String, JsonValue>;

/// Records of one entity type
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySection {
    /// Table name
    pub entity: String,
    /// Encoded rows, in primary-key order of the source store
    pub records: Vec<Record>,
}

/// A versioned container of entity sections
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotDocument {
    /// Format version
    pub version: u32,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Identifier of the store the snapshot was taken from
    pub source: String,
    /// Entity sections, in document order
    pub sections: Vec<EntitySection>,
}

impl SnapshotDocument {
    /// Create an empty document at the current format version
    pub fn new(source: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        SnapshotDocument {
            version: SNAPSHOT_FORMAT_VERSION,
            created_at,
            source: source.into(),
            sections: Vec::new(),
        }
    }

    /// Records of an entity type, if the document has a section for it
    pub fn records(&self, entity: &str) -> Option<&[Record]> {
        self.sections
            .iter()
            .find(|s| s.entity == entity)
            .map(|s| s.records.as_slice())
    }

    /// Total number of records across all sections
    pub fn total_records(&self) -> usize {
        self.sections.iter().map(|s| s.records.len()).sum()
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json_pretty(&self) -> SnapshotResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a document from JSON text
    ///
    /// # Errors
    ///
    /// `UnsupportedVersion` unless `version` is exactly
    /// [`SNAPSHOT_FORMAT_VERSION`]; `Malformed` if a reserved key has the
    /// wrong type or an entity section is not an array of objects.
    pub fn from_json(text: &str) -> SnapshotResult<Self> {
        let value: JsonValue = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Build a document from an already parsed JSON value
    pub fn from_value(value: JsonValue) -> SnapshotResult<Self> {
        let JsonValue::Object(mut top) = value else {
            return Err(SnapshotError::Malformed(
                "top level is not an object".to_string(),
            ));
        };

        let version = match top.remove("version") {
            Some(JsonValue::Number(n)) if n.as_u64() == Some(u64::from(SNAPSHOT_FORMAT_VERSION)) => {
                SNAPSHOT_FORMAT_VERSION
            }
            Some(other) => {
                return Err(SnapshotError::UnsupportedVersion {
                    found: other.to_string(),
                    supported: SNAPSHOT_FORMAT_VERSION,
                })
            }
            None => {
                return Err(SnapshotError::UnsupportedVersion {
                    found: "missing".to_string(),
                    supported: SNAPSHOT_FORMAT_VERSION,
                })
            }
        };

        let created_at = match top.remove("created_at") {
            Some(v) => serde_json::from_value::<DateTime<Utc>>(v).map_err(|e| {
                SnapshotError::Malformed(format!("created_at is not a timestamp: {}", e))
            })?,
            None => return Err(SnapshotError::Malformed("created_at is missing".to_string())),
        };

        let source = match top.remove("source") {
            Some(JsonValue::String(s)) => s,
            None | Some(JsonValue::Null) => String::new(),
            Some(other) => {
                return Err(SnapshotError::Malformed(format!(
                    "source is not a string: {}",
                    other
                )))
            }
        };

        let mut sections = Vec::with_capacity(top.len());
        for (entity, body) in top {
            let JsonValue::Array(items) = body else {
                return Err(SnapshotError::Malformed(format!(
                    "section '{}' is not an array",
                    entity
                )));
            };
            let mut records = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                match item {
                    JsonValue::Object(record) => records.push(record),
                    _ => {
                        return Err(SnapshotError::Malformed(format!(
                            "record {} of '{}' is not an object",
                            i, entity
                        )))
                    }
                }
            }
            sections.push(EntitySection { entity, records });
        }

        Ok(SnapshotDocument {
            version,
            created_at,
            source,
            sections,
        })
    }
}

impl Serialize for SnapshotDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.sections.len()))?;
        map.serialize_entry("version", &self.version)?;
        map.serialize_entry("created_at", &self.created_at)?;
        map.serialize_entry("source", &self.source)?;
        for section in &self.sections {
            map.serialize_entry(&section.entity, &section.records)?;
        }
        map.end()
    }
}
