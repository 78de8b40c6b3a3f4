//! Static entity type descriptors
//!
//! Every persisted entity type is described by a hand-written
//! [`EntityDescriptor`]: its table name, the ordered list of persisted
//! fields with their scalar types, its natural key and its foreign keys.
//! The primary key `id` is implicit and never listed.
//!
//! The tables here are the single source of truth for the snapshot codec,
//! the stores and the restore order. Nothing is discovered at runtime.
//!
//! `department.manager_id` is deliberately not described: it points back at
//! `employee` and would close a cycle (department -> employee -> department).

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};
use crate::row::{NaturalKey, Row};
use crate::value::Value;

/// Declared scalar type of a persisted field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// UTF-8 text
    String,
    /// 64-bit integer (also used for foreign keys)
    Integer,
    /// Decimal amount, held as a finite f64
    Decimal,
    /// Boolean flag
    Boolean,
    /// Calendar date
    Date,
    /// Date and time of day
    DateTime,
    /// Time of day
    Time,
    /// Binary payload, base64 in snapshots
    Blob,
}

impl FieldType {
    /// Lowercase name used in messages and DDL comments
    pub fn name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Decimal => "decimal",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Time => "time",
            FieldType::Blob => "blob",
        }
    }

    /// Check whether a non-null value is of this type
    ///
    /// Decimal fields accept integers as well; a non-finite float is never
    /// accepted because it has no representation in a snapshot.
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Integer, Value::Int(_)) => true,
            (FieldType::Decimal, Value::Float(f)) => f.is_finite(),
            (FieldType::Decimal, Value::Int(_)) => true,
            (FieldType::Boolean, Value::Bool(_)) => true,
            (FieldType::Date, Value::Date(_)) => true,
            (FieldType::DateTime, Value::DateTime(_)) => true,
            (FieldType::Time, Value::Time(_)) => true,
            (FieldType::Blob, Value::Bytes(_)) => true,
            _ => false,
        }
    }
}

/// One persisted field of an entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Column name
    pub name: &'static str,
    /// Scalar type
    pub ty: FieldType,
    /// Whether null is allowed
    pub nullable: bool,
    /// Target entity type when this is a foreign key
    pub references: Option<&'static str>,
}

impl FieldDescriptor {
    /// A non-null field
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        FieldDescriptor {
            name,
            ty,
            nullable: false,
            references: None,
        }
    }

    /// A nullable field
    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        FieldDescriptor {
            name,
            ty,
            nullable: true,
            references: None,
        }
    }

    /// A non-null foreign key to `target`
    pub const fn reference(name: &'static str, target: &'static str) -> Self {
        FieldDescriptor {
            name,
            ty: FieldType::Integer,
            nullable: false,
            references: Some(target),
        }
    }

    /// A nullable foreign key to `target`
    pub const fn optional_reference(name: &'static str, target: &'static str) -> Self {
        FieldDescriptor {
            name,
            ty: FieldType::Integer,
            nullable: true,
            references: Some(target),
        }
    }

    /// True if this field is a foreign key
    pub fn is_foreign_key(&self) -> bool {
        self.references.is_some()
    }
}

/// Static metadata of one entity type (one table)
#[derive(Debug, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Table name, also the key used in snapshot documents
    pub name: &'static str,
    /// Persisted fields in column order, primary key excluded
    pub fields: &'static [FieldDescriptor],
    /// Fields forming the natural key, in key order
    pub natural_key: &'static [&'static str],
}

impl EntityDescriptor {
    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Foreign-key fields in column order
    pub fn foreign_keys(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_foreign_key())
    }

    /// Entity types this one references, without duplicates
    pub fn dependencies(&self) -> Vec<&'static str> {
        let mut deps: Vec<&'static str> = Vec::new();
        for target in self.fields.iter().filter_map(|f| f.references) {
            if !deps.contains(&target) {
                deps.push(target);
            }
        }
        deps
    }

    /// Extract the natural key of a row
    ///
    /// # Errors
    ///
    /// Returns `MissingNaturalKey` if any key field is absent or null.
    pub fn natural_key_of(&self, row: &Row) -> SchemaResult<NaturalKey> {
        let mut values = Vec::with_capacity(self.natural_key.len());
        for &field in self.natural_key {
            match row.get(field) {
                Some(value) if !value.is_null() => values.push(value.clone()),
                _ => {
                    return Err(SchemaError::MissingNaturalKey {
                        entity: self.name,
                        field,
                    })
                }
            }
        }
        Ok(NaturalKey(values))
    }

    /// Check the descriptor's own consistency (natural key fields exist
    /// and are required)
    pub fn validate(&self) -> SchemaResult<()> {
        for &key_field in self.natural_key {
            match self.field(key_field) {
                Some(f) if !f.nullable => {}
                _ => {
                    return Err(SchemaError::InvalidNaturalKey {
                        entity: self.name,
                        field: key_field,
                    })
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Entity kinds
// ============================================================================

/// The entity types the pipeline knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Organizational department
    Department,
    /// Employee master record
    Employee,
    /// Fleet vehicle
    Vehicle,
    /// Daily attendance entry
    Attendance,
    /// Monthly salary record
    Salary,
    /// Employee document (ID, passport, license, ...)
    Document,
    /// Workshop visit of a vehicle
    VehicleWorkshop,
    /// Traffic accident involving a vehicle
    VehicleAccident,
}

impl EntityKind {
    /// Every kind, in declaration order
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Department,
        EntityKind::Employee,
        EntityKind::Vehicle,
        EntityKind::Attendance,
        EntityKind::Salary,
        EntityKind::Document,
        EntityKind::VehicleWorkshop,
        EntityKind::VehicleAccident,
    ];

    /// Static descriptor of this kind
    pub fn descriptor(self) -> &'static EntityDescriptor {
        match self {
            EntityKind::Department => &DEPARTMENT,
            EntityKind::Employee => &EMPLOYEE,
            EntityKind::Vehicle => &VEHICLE,
            EntityKind::Attendance => &ATTENDANCE,
            EntityKind::Salary => &SALARY,
            EntityKind::Document => &DOCUMENT,
            EntityKind::VehicleWorkshop => &VEHICLE_WORKSHOP,
            EntityKind::VehicleAccident => &VEHICLE_ACCIDENT,
        }
    }

    /// Table name
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Resolve a table name
    pub fn from_name(name: &str) -> Option<EntityKind> {
        EntityKind::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl std::str::FromStr for EntityKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::from_name(s).ok_or_else(|| SchemaError::UnknownEntity(s.to_string()))
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Descriptors of every entity kind, in declaration order
pub fn all_descriptors() -> Vec<&'static EntityDescriptor> {
    EntityKind::ALL.iter().map(|k| k.descriptor()).collect()
}

/// Look up a descriptor by table name
pub fn descriptor(name: &str) -> Option<&'static EntityDescriptor> {
    EntityKind::from_name(name).map(EntityKind::descriptor)
}

// ============================================================================
// Descriptor tables
// ============================================================================

/// `department`
pub static DEPARTMENT: EntityDescriptor = EntityDescriptor {
    name: "department",
    fields: &[
        FieldDescriptor::required("name", FieldType::String),
        FieldDescriptor::optional("description", FieldType::String),
        FieldDescriptor::optional("created_at", FieldType::DateTime),
        FieldDescriptor::optional("updated_at", FieldType::DateTime),
    ],
    natural_key: &["name"],
};

/// `employee`
pub static EMPLOYEE: EntityDescriptor = EntityDescriptor {
    name: "employee",
    fields: &[
        FieldDescriptor::required("employee_id", FieldType::String),
        FieldDescriptor::required("national_id", FieldType::String),
        FieldDescriptor::required("name", FieldType::String),
        FieldDescriptor::required("mobile", FieldType::String),
        FieldDescriptor::optional_reference("department_id", "department"),
        FieldDescriptor::optional("email", FieldType::String),
        FieldDescriptor::required("job_title", FieldType::String),
        FieldDescriptor::required("status", FieldType::String),
        FieldDescriptor::optional("nationality", FieldType::String),
        FieldDescriptor::optional("contract_type", FieldType::String),
        FieldDescriptor::optional("join_date", FieldType::Date),
        FieldDescriptor::optional("birth_date", FieldType::Date),
        FieldDescriptor::optional("basic_salary", FieldType::Decimal),
        FieldDescriptor::optional("daily_wage", FieldType::Decimal),
        FieldDescriptor::optional("attendance_bonus", FieldType::Decimal),
        FieldDescriptor::optional("has_national_balance", FieldType::Boolean),
        FieldDescriptor::optional("bank_iban", FieldType::String),
        FieldDescriptor::optional("created_at", FieldType::DateTime),
        FieldDescriptor::optional("updated_at", FieldType::DateTime),
    ],
    natural_key: &["employee_id"],
};

/// `vehicle`
pub static VEHICLE: EntityDescriptor = EntityDescriptor {
    name: "vehicle",
    fields: &[
        FieldDescriptor::required("plate_number", FieldType::String),
        FieldDescriptor::required("make", FieldType::String),
        FieldDescriptor::required("model", FieldType::String),
        FieldDescriptor::required("year", FieldType::Integer),
        FieldDescriptor::required("color", FieldType::String),
        FieldDescriptor::required("status", FieldType::String),
        FieldDescriptor::required("type_of_car", FieldType::String),
        FieldDescriptor::optional("driver_name", FieldType::String),
        FieldDescriptor::optional_reference("department_id", "department"),
        FieldDescriptor::optional("registration_expiry_date", FieldType::Date),
        FieldDescriptor::optional("inspection_expiry_date", FieldType::Date),
        FieldDescriptor::optional("project", FieldType::String),
        FieldDescriptor::optional("notes", FieldType::String),
        FieldDescriptor::optional("created_at", FieldType::DateTime),
        FieldDescriptor::optional("updated_at", FieldType::DateTime),
    ],
    natural_key: &["plate_number"],
};

/// `attendance`
pub static ATTENDANCE: EntityDescriptor = EntityDescriptor {
    name: "attendance",
    fields: &[
        FieldDescriptor::reference("employee_id", "employee"),
        FieldDescriptor::required("date", FieldType::Date),
        FieldDescriptor::optional("check_in", FieldType::Time),
        FieldDescriptor::optional("check_out", FieldType::Time),
        FieldDescriptor::required("status", FieldType::String),
        FieldDescriptor::optional("notes", FieldType::String),
        FieldDescriptor::optional("created_at", FieldType::DateTime),
    ],
    natural_key: &["employee_id", "date"],
};

/// `salary`
pub static SALARY: EntityDescriptor = EntityDescriptor {
    name: "salary",
    fields: &[
        FieldDescriptor::reference("employee_id", "employee"),
        FieldDescriptor::required("month", FieldType::Integer),
        FieldDescriptor::required("year", FieldType::Integer),
        FieldDescriptor::required("basic_salary", FieldType::Decimal),
        FieldDescriptor::optional("allowances", FieldType::Decimal),
        FieldDescriptor::optional("deductions", FieldType::Decimal),
        FieldDescriptor::optional("bonus", FieldType::Decimal),
        FieldDescriptor::required("net_salary", FieldType::Decimal),
        FieldDescriptor::required("is_paid", FieldType::Boolean),
        FieldDescriptor::optional("notes", FieldType::String),
        FieldDescriptor::optional("created_at", FieldType::DateTime),
    ],
    natural_key: &["employee_id", "month", "year"],
};

/// `document`
pub static DOCUMENT: EntityDescriptor = EntityDescriptor {
    name: "document",
    fields: &[
        FieldDescriptor::reference("employee_id", "employee"),
        FieldDescriptor::required("document_type", FieldType::String),
        FieldDescriptor::required("document_number", FieldType::String),
        FieldDescriptor::optional("issue_date", FieldType::Date),
        FieldDescriptor::optional("expiry_date", FieldType::Date),
        FieldDescriptor::optional("scan", FieldType::Blob),
        FieldDescriptor::optional("notes", FieldType::String),
        FieldDescriptor::optional("created_at", FieldType::DateTime),
    ],
    natural_key: &["document_type", "document_number"],
};

/// `vehicle_workshop`
pub static VEHICLE_WORKSHOP: EntityDescriptor = EntityDescriptor {
    name: "vehicle_workshop",
    fields: &[
        FieldDescriptor::reference("vehicle_id", "vehicle"),
        FieldDescriptor::required("entry_date", FieldType::Date),
        FieldDescriptor::optional("exit_date", FieldType::Date),
        FieldDescriptor::required("reason", FieldType::String),
        FieldDescriptor::required("description", FieldType::String),
        FieldDescriptor::required("repair_status", FieldType::String),
        FieldDescriptor::optional("cost", FieldType::Decimal),
        FieldDescriptor::optional("workshop_name", FieldType::String),
        FieldDescriptor::optional("notes", FieldType::String),
        FieldDescriptor::optional("created_at", FieldType::DateTime),
    ],
    natural_key: &["vehicle_id", "entry_date", "reason"],
};

/// `vehicle_accident`
pub static VEHICLE_ACCIDENT: EntityDescriptor = EntityDescriptor {
    name: "vehicle_accident",
    fields: &[
        FieldDescriptor::reference("vehicle_id", "vehicle"),
        FieldDescriptor::required("accident_date", FieldType::Date),
        FieldDescriptor::optional("accident_time", FieldType::Time),
        FieldDescriptor::required("driver_name", FieldType::String),
        FieldDescriptor::optional("driver_phone", FieldType::String),
        FieldDescriptor::optional_reference("reported_by_employee_id", "employee"),
        FieldDescriptor::optional("location", FieldType::String),
        FieldDescriptor::optional("description", FieldType::String),
        FieldDescriptor::optional("created_at", FieldType::DateTime),
    ],
    natural_key: &["vehicle_id", "accident_date", "driver_name"],
};
