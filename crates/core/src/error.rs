//! Error types for fleetvault-core
//!
//! Schema errors are configuration-time failures: they describe a broken
//! descriptor table, not bad data. We use `thiserror` for automatic
//! `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for schema operations
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;

/// Errors raised while validating or querying entity descriptors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The foreign-key graph contains a cycle; no restore order exists
    #[error("Dependency cycle between entity types: {}", .cycle.join(" -> "))]
    DependencyCycle {
        /// Entity types on the cycle, first element repeated at the end
        cycle: Vec<&'static str>,
    },

    /// A foreign key points at an entity type that has no descriptor
    #[error("Field {entity}.{field} references unknown entity type '{target}'")]
    UnknownReference {
        /// Referencing entity type
        entity: &'static str,
        /// Foreign-key field
        field: &'static str,
        /// Missing target
        target: &'static str,
    },

    /// The fixed restore order lists a type before one of its dependencies
    #[error("Restore order places '{entity}' before its dependency '{dependency}'")]
    Misordered {
        /// Entity type placed too early
        entity: &'static str,
        /// Dependency that comes later (or not at all)
        dependency: &'static str,
    },

    /// The fixed restore order and the descriptor set disagree
    #[error("Restore order does not match descriptors: {0}")]
    OrderMismatch(String),

    /// A natural-key field is not declared, or is declared nullable
    #[error("Natural-key field {entity}.{field} is not a required field")]
    InvalidNaturalKey {
        /// Entity type
        entity: &'static str,
        /// Offending field
        field: &'static str,
    },

    /// A row lacks a value for one of its natural-key fields
    #[error("Row of '{entity}' has no value for natural-key field '{field}'")]
    MissingNaturalKey {
        /// Entity type
        entity: &'static str,
        /// Missing field
        field: &'static str,
    },

    /// No descriptor exists for the given entity type name
    #[error("Unknown entity type: {0}")]
    UnknownEntity(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_cycle() {
        let err = SchemaError::DependencyCycle {
            cycle: vec!["department", "employee", "department"],
        };
        let msg = err.to_string();
        assert!(msg.contains("Dependency cycle"));
        assert!(msg.contains("department -> employee -> department"));
    }

    #[test]
    fn test_error_display_unknown_reference() {
        let err = SchemaError::UnknownReference {
            entity: "employee",
            field: "team_id",
            target: "team",
        };
        assert_eq!(
            err.to_string(),
            "Field employee.team_id references unknown entity type 'team'"
        );
    }

    #[test]
    fn test_error_display_missing_natural_key() {
        let err = SchemaError::MissingNaturalKey {
            entity: "vehicle",
            field: "plate_number",
        };
        assert!(err.to_string().contains("plate_number"));
    }
}
