//! Conflict policy
//!
//! Decides what happens to an incoming snapshot row given the row already
//! stored under the same natural key (if any). The decision is a pure
//! function of the mode and the two rows.
//!
//! | mode             | no existing row | existing, equal | existing, different |
//! |------------------|-----------------|-----------------|---------------------|
//! | `skip`           | insert          | skip            | skip                |
//! | `overwrite`      | insert          | skip            | update              |
//! | `abort-on-error` | insert          | conflict        | conflict            |

use std::fmt;
use std::str::FromStr;

use fleetvault_core::{Row, Value};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Conflict resolution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Leave existing rows alone
    #[default]
    Skip,
    /// Replace existing rows with the snapshot's values
    Overwrite,
    /// Treat any existing row, and any row failure, as fatal for the run
    AbortOnError,
}

/// Outcome of [`ConflictPolicy::decide`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Write a new row
    Insert,
    /// Overwrite the existing row
    Update,
    /// Keep the existing row as is
    Skip,
    /// Existing row collides with the incoming one
    Conflict,
}

impl ConflictPolicy {
    /// Every mode
    pub const ALL: [ConflictPolicy; 3] = [
        ConflictPolicy::Skip,
        ConflictPolicy::Overwrite,
        ConflictPolicy::AbortOnError,
    ];

    /// Policy string as accepted on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            ConflictPolicy::Skip => "skip",
            ConflictPolicy::Overwrite => "overwrite",
            ConflictPolicy::AbortOnError => "abort-on-error",
        }
    }

    /// True if the first row failure stops the run
    pub fn aborts_on_error(self) -> bool {
        self == ConflictPolicy::AbortOnError
    }

    /// Decide the fate of `incoming` given the row matched by natural key
    pub fn decide(self, existing: Option<&Row>, incoming: &Row) -> Decision {
        let Some(existing) = existing else {
            return Decision::Insert;
        };
        match self {
            ConflictPolicy::Skip => Decision::Skip,
            ConflictPolicy::Overwrite if is_unchanged(existing, incoming) => Decision::Skip,
            ConflictPolicy::Overwrite => Decision::Update,
            ConflictPolicy::AbortOnError => Decision::Conflict,
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConflictPolicy::ALL
            .into_iter()
            .find(|p| p.as_str() == s.trim())
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "unknown conflict policy '{}' (expected skip, overwrite or abort-on-error)",
                    s
                ))
            })
    }
}

/// True if every field of `incoming` already holds the same value
pub fn is_unchanged(existing: &Row, incoming: &Row) -> bool {
    incoming
        .iter()
        .all(|(name, value)| same_value(existing.get_or_null(name), value))
}

/// Value equality that treats an integer and a float of equal magnitude as
/// the same decimal
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(i), Value::Float(f)) | (Value::Float(f), Value::Int(i)) => *i as f64 == *f,
        _ => a == b,
    }
}
