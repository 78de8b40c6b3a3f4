//! Dependency ordering of entity types
//!
//! Restoring rows must respect foreign keys: a row can only be written
//! once every row it references exists. The schema is small and static,
//! so the order is a hand-maintained table ([`RESTORE_ORDER`]) rather than
//! something computed per call. It is checked once, the first time it is
//! requested, against the descriptors:
//!
//! 1. every foreign key targets a known entity type
//! 2. the foreign-key graph is acyclic
//! 3. every entity type appears after all the types it references
//! 4. the table lists each descriptor exactly once
//!
//! A failure is a configuration error and is fatal for any pipeline run.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use crate::error::{SchemaError, SchemaResult};
use crate::schema::{all_descriptors, EntityDescriptor, EntityKind};

/// Hand-verified restore order: referenced types first
pub const RESTORE_ORDER: [EntityKind; 8] = [
    EntityKind::Department,
    EntityKind::Employee,
    EntityKind::Vehicle,
    EntityKind::Attendance,
    EntityKind::Salary,
    EntityKind::Document,
    EntityKind::VehicleWorkshop,
    EntityKind::VehicleAccident,
];

static VALIDATED_ORDER: Lazy<SchemaResult<Vec<&'static EntityDescriptor>>> = Lazy::new(|| {
    let order: Vec<&'static EntityDescriptor> =
        RESTORE_ORDER.iter().map(|k| k.descriptor()).collect();
    validate_order(&order, &all_descriptors())?;
    Ok(order)
});

/// The validated restore order
///
/// # Errors
///
/// Returns the schema error found during the one-time validation.
pub fn restore_order() -> SchemaResult<&'static [&'static EntityDescriptor]> {
    match &*VALIDATED_ORDER {
        Ok(order) => Ok(order.as_slice()),
        Err(e) => Err(e.clone()),
    }
}

/// Position of an entity type in the restore order
pub fn restore_rank(name: &str) -> Option<usize> {
    RESTORE_ORDER.iter().position(|k| k.name() == name)
}

/// Sort a selection of entity kinds into restore order, dropping duplicates
pub fn in_restore_order(selection: &[EntityKind]) -> Vec<EntityKind> {
    RESTORE_ORDER
        .iter()
        .copied()
        .filter(|k| selection.contains(k))
        .collect()
}

/// Check a proposed order against a descriptor set
///
/// # Errors
///
/// - `UnknownReference`: a foreign key targets a type not in `descriptors`
/// - `DependencyCycle`: the reference graph has a cycle
/// - `Misordered`: a type precedes one of its dependencies
/// - `OrderMismatch`: `order` and `descriptors` do not hold the same types
pub fn validate_order(
    order: &[&'static EntityDescriptor],
    descriptors: &[&'static EntityDescriptor],
) -> SchemaResult<()> {
    for desc in descriptors {
        desc.validate()?;
    }
    find_cycle(descriptors)?;

    let listed: HashSet<&str> = order.iter().map(|d| d.name).collect();
    if listed.len() != order.len() {
        return Err(SchemaError::OrderMismatch(
            "an entity type is listed twice".to_string(),
        ));
    }
    for desc in descriptors {
        if !listed.contains(desc.name) {
            return Err(SchemaError::OrderMismatch(format!(
                "'{}' is missing from the restore order",
                desc.name
            )));
        }
    }
    if order.len() != descriptors.len() {
        return Err(SchemaError::OrderMismatch(
            "the restore order lists a type without a descriptor".to_string(),
        ));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for desc in order {
        for dependency in desc.dependencies() {
            if !seen.contains(dependency) {
                return Err(SchemaError::Misordered {
                    entity: desc.name,
                    dependency,
                });
            }
        }
        seen.insert(desc.name);
    }
    Ok(())
}

/// Compute a topological order of `descriptors` (dependencies first)
///
/// Ties are broken by input position, so an already valid input order is
/// returned unchanged.
///
/// # Errors
///
/// `UnknownReference` or `DependencyCycle`, as for [`validate_order`].
pub fn topological_order(
    descriptors: &[&'static EntityDescriptor],
) -> SchemaResult<Vec<&'static EntityDescriptor>> {
    find_cycle(descriptors)?;

    let mut placed: HashSet<&str> = HashSet::new();
    let mut result = Vec::with_capacity(descriptors.len());
    while result.len() < descriptors.len() {
        let next = descriptors
            .iter()
            .find(|d| {
                !placed.contains(d.name)
                    && d.dependencies().iter().all(|dep| placed.contains(dep))
            })
            .ok_or_else(|| SchemaError::OrderMismatch("no placeable entity type".to_string()))?;
        placed.insert(next.name);
        result.push(*next);
    }
    Ok(result)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first search for a cycle in the reference graph
fn find_cycle(descriptors: &[&'static EntityDescriptor]) -> SchemaResult<()> {
    let by_name: HashMap<&str, &'static EntityDescriptor> =
        descriptors.iter().map(|d| (d.name, *d)).collect();

    for desc in descriptors {
        for fk in desc.foreign_keys() {
            let target = fk.references.unwrap_or_default();
            if !by_name.contains_key(target) {
                return Err(SchemaError::UnknownReference {
                    entity: desc.name,
                    field: fk.name,
                    target,
                });
            }
        }
    }

    let mut marks: HashMap<&'static str, Mark> = HashMap::new();
    let mut path: Vec<&'static str> = Vec::new();
    for desc in descriptors {
        visit(*desc, &by_name, &mut marks, &mut path)?;
    }
    Ok(())
}

fn visit(
    desc: &'static EntityDescriptor,
    by_name: &HashMap<&str, &'static EntityDescriptor>,
    marks: &mut HashMap<&'static str, Mark>,
    path: &mut Vec<&'static str>,
) -> SchemaResult<()> {
    match marks.get(desc.name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::Visiting) => {
            let start = path.iter().position(|n| *n == desc.name).unwrap_or(0);
            let mut cycle: Vec<&'static str> = path[start..].to_vec();
            cycle.push(desc.name);
            return Err(SchemaError::DependencyCycle { cycle });
        }
        None => {}
    }

    marks.insert(desc.name, Mark::Visiting);
    path.push(desc.name);
    for dependency in desc.dependencies() {
        if let Some(next) = by_name.get(dependency) {
            visit(*next, by_name, marks, path)?;
        }
    }
    path.pop();
    marks.insert(desc.name, Mark::Done);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldType};

    static A: EntityDescriptor = EntityDescriptor {
        name: "a",
        fields: &[
            FieldDescriptor::required("code", FieldType::String),
            FieldDescriptor::reference("b_id", "b"),
        ],
        natural_key: &["code"],
    };
    static B: EntityDescriptor = EntityDescriptor {
        name: "b",
        fields: &[
            FieldDescriptor::required("code", FieldType::String),
            FieldDescriptor::optional_reference("a_id", "a"),
        ],
        natural_key: &["code"],
    };
    static C: EntityDescriptor = EntityDescriptor {
        name: "c",
        fields: &[
            FieldDescriptor::required("code", FieldType::String),
            FieldDescriptor::reference("d_id", "d"),
        ],
        natural_key: &["code"],
    };
    static D: EntityDescriptor = EntityDescriptor {
        name: "d",
        fields: &[FieldDescriptor::required("code", FieldType::String)],
        natural_key: &["code"],
    };
    static SELF_REF: EntityDescriptor = EntityDescriptor {
        name: "self_ref",
        fields: &[
            FieldDescriptor::required("code", FieldType::String),
            FieldDescriptor::optional_reference("parent_id", "self_ref"),
        ],
        natural_key: &["code"],
    };

    #[test]
    fn test_builtin_order_is_valid() {
        let order = restore_order().unwrap();
        assert_eq!(order.len(), EntityKind::ALL.len());
        assert_eq!(order[0].name, "department");
    }

    #[test]
    fn test_builtin_order_places_dependencies_first() {
        let order = restore_order().unwrap();
        for (i, desc) in order.iter().enumerate() {
            for dep in desc.dependencies() {
                let dep_pos = order.iter().position(|d| d.name == dep).unwrap();
                assert!(dep_pos < i, "{} must come after {}", desc.name, dep);
            }
        }
    }

    #[test]
    fn test_builtin_order_matches_topological_sort() {
        let topo = topological_order(&all_descriptors()).unwrap();
        let names: Vec<&str> = topo.iter().map(|d| d.name).collect();
        let fixed: Vec<&str> = RESTORE_ORDER.iter().map(|k| k.name()).collect();
        assert_eq!(names, fixed);
    }

    #[test]
    fn test_cycle_is_detected() {
        let err = topological_order(&[&A, &B]).unwrap_err();
        match err {
            SchemaError::DependencyCycle { cycle } => {
                assert_eq!(cycle.first(), cycle.last());
                assert!(cycle.contains(&"a") && cycle.contains(&"b"));
            }
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let err = validate_order(&[&SELF_REF], &[&SELF_REF]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::DependencyCycle {
                cycle: vec!["self_ref", "self_ref"]
            }
        );
    }

    #[test]
    fn test_unknown_reference_is_detected() {
        let err = validate_order(&[&C], &[&C]).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnknownReference { target: "d", .. }
        ));
    }

    #[test]
    fn test_misordered_table_is_rejected() {
        let err = validate_order(&[&C, &D], &[&C, &D]).unwrap_err();
        assert_eq!(
            err,
            SchemaError::Misordered {
                entity: "c",
                dependency: "d"
            }
        );
        validate_order(&[&D, &C], &[&C, &D]).unwrap();
    }

    #[test]
    fn test_incomplete_table_is_rejected() {
        let err = validate_order(&[&D], &[&C, &D]).unwrap_err();
        assert!(matches!(err, SchemaError::OrderMismatch(_)));
    }

    #[test]
    fn test_in_restore_order() {
        let sorted = in_restore_order(&[
            EntityKind::Salary,
            EntityKind::Department,
            EntityKind::Salary,
        ]);
        assert_eq!(sorted, vec![EntityKind::Department, EntityKind::Salary]);
        assert_eq!(restore_rank("employee"), Some(1));
        assert_eq!(restore_rank("users"), None);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn topological_order_is_valid_for_any_input_permutation(
                shuffled in Just(all_descriptors()).prop_shuffle()
            ) {
                let order = topological_order(&shuffled).unwrap();
                prop_assert!(validate_order(&order, &shuffled).is_ok());
            }
        }
    }
}
