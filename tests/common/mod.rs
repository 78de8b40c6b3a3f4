//! Shared test utilities for the integration test suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's
//! main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use fleetvault_core::schema::{
    ATTENDANCE, DEPARTMENT, DOCUMENT, EMPLOYEE, SALARY, VEHICLE, VEHICLE_ACCIDENT, VEHICLE_WORKSHOP,
};
pub use fleetvault::{
    restore_order, ConflictPolicy, EntityDescriptor, EntityKind, MemoryStore, RestoreEngine,
    RestoreOptions, RestoreSummary, Row, RowId, SnapshotDocument, SnapshotSerializer,
    SnapshotWriter, SqliteStore, Store, Value,
};
use tempfile::TempDir;

// ============================================================================
// Row builders
// ============================================================================

pub fn department(name: &str) -> Row {
    Row::new()
        .with("name", name)
        .with("description", format!("{} department", name))
}

pub fn employee(code: &str, department_id: Option<RowId>) -> Row {
    Row::new()
        .with("employee_id", code)
        .with("national_id", format!("1{}", code.trim_start_matches("E-")))
        .with("name", format!("Employee {}", code))
        .with("mobile", "0501234567")
        .with("department_id", department_id.map(RowId::get))
        .with("job_title", "Driver")
        .with("status", "active")
        .with("join_date", date(2024, 5, 1))
        .with("basic_salary", 4200.5)
        .with("has_national_balance", true)
}

pub fn vehicle(plate: &str, department_id: Option<RowId>) -> Row {
    Row::new()
        .with("plate_number", plate)
        .with("make", "Toyota")
        .with("model", "Hilux")
        .with("year", 2022i64)
        .with("color", "white")
        .with("status", "available")
        .with("type_of_car", "pickup")
        .with("department_id", department_id.map(RowId::get))
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

// ============================================================================
// Fixtures
// ============================================================================

/// Ids of the rows written by [`seed_hr`]
pub struct Seeded {
    pub departments: Vec<RowId>,
    pub employees: Vec<RowId>,
}

/// `departments` departments and `employees` employees spread over them
pub fn seed_hr(store: &dyn Store, departments: usize, employees: usize) -> Seeded {
    let mut s = store.begin().unwrap();
    let departments: Vec<RowId> = (0..departments)
        .map(|i| s.insert(&DEPARTMENT, &department(&format!("Dept {}", i + 1))).unwrap())
        .collect();
    let employees: Vec<RowId> = (0..employees)
        .map(|i| {
            let dept = departments.get(i % departments.len().max(1)).copied();
            s.insert(&EMPLOYEE, &employee(&format!("E-{:03}", i + 1), dept))
                .unwrap()
        })
        .collect();
    s.commit().unwrap();
    Seeded {
        departments,
        employees,
    }
}

/// Rows for every entity type, including blobs, times and decimals
pub fn seed_full(store: &dyn Store) {
    let seeded = seed_hr(store, 2, 5);
    let mut s = store.begin().unwrap();
    let truck = s.insert(&VEHICLE, &vehicle("KSA-1001", Some(seeded.departments[0]))).unwrap();
    let van = s.insert(&VEHICLE, &vehicle("KSA-1002", None)).unwrap();

    let e1 = seeded.employees[0].get();
    let e2 = seeded.employees[1].get();
    s.insert(
        &ATTENDANCE,
        &Row::new()
            .with("employee_id", e1)
            .with("date", date(2026, 1, 4))
            .with("check_in", NaiveTime::from_hms_opt(7, 55, 0).unwrap())
            .with("check_out", NaiveTime::from_hms_opt(16, 5, 30).unwrap())
            .with("status", "present"),
    )
    .unwrap();
    s.insert(
        &SALARY,
        &Row::new()
            .with("employee_id", e2)
            .with("month", 1i64)
            .with("year", 2026i64)
            .with("basic_salary", 4200.5)
            .with("allowances", 300.0)
            .with("net_salary", 4500.5)
            .with("is_paid", false),
    )
    .unwrap();
    s.insert(
        &DOCUMENT,
        &Row::new()
            .with("employee_id", e1)
            .with("document_type", "iqama")
            .with("document_number", "2456789012")
            .with("expiry_date", date(2027, 6, 30))
            .with("scan", vec![0x25u8, 0x50, 0x44, 0x46, 0x00, 0xff]),
    )
    .unwrap();
    s.insert(
        &VEHICLE_WORKSHOP,
        &Row::new()
            .with("vehicle_id", truck.get())
            .with("entry_date", date(2026, 2, 1))
            .with("reason", "service")
            .with("description", "Oil and filters")
            .with("repair_status", "done")
            .with("cost", 850.25),
    )
    .unwrap();
    s.insert(
        &VEHICLE_ACCIDENT,
        &Row::new()
            .with("vehicle_id", van.get())
            .with("accident_date", date(2026, 2, 10))
            .with("driver_name", "Employee E-002")
            .with("reported_by_employee_id", e2),
    )
    .unwrap();
    s.commit().unwrap();
}

/// A SQLite store in a fresh temporary directory
pub fn sqlite_store(name: &str) -> (TempDir, SqliteStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(dir.path().join(format!("{}.db", name))).unwrap();
    (dir, store)
}

// ============================================================================
// Comparison helpers
// ============================================================================

/// Rows of `entity` keyed by natural key, with foreign keys replaced by the
/// natural key of the referenced row so stores with different ids compare
pub fn portable_rows(store: &dyn Store, entity: &'static EntityDescriptor) -> BTreeMap<String, Row> {
    let mut s = store.begin().unwrap();
    let mut key_of: HashMap<(&'static str, i64), String> = HashMap::new();
    for desc in restore_order().unwrap().iter().copied() {
        for stored in s.scan(desc).unwrap() {
            let row = portable(&key_of, desc, stored.row);
            let key = desc.natural_key_of(&row).unwrap().to_string();
            key_of.insert((desc.name, stored.id.get()), key);
        }
    }
    s.scan(entity)
        .unwrap()
        .into_iter()
        .map(|stored| {
            let row = portable(&key_of, entity, stored.row);
            (entity.natural_key_of(&row).unwrap().to_string(), row)
        })
        .collect()
}

fn portable(
    key_of: &HashMap<(&'static str, i64), String>,
    entity: &'static EntityDescriptor,
    mut row: Row,
) -> Row {
    for fk in entity.foreign_keys() {
        if let Some(id) = row.get_or_null(fk.name).as_int() {
            let target = fk.references.unwrap();
            let key = key_of.get(&(target, id)).cloned().unwrap();
            row.set(fk.name, key);
        }
    }
    // Undeclared-in-row fields count as null
    for field in entity.fields {
        if row.get(field.name).is_none() {
            row.set(field.name, Value::Null);
        }
    }
    row
}

/// Natural keys of `entity`
pub fn natural_keys(store: &dyn Store, entity: &'static EntityDescriptor) -> BTreeSet<String> {
    portable_rows(store, entity).into_keys().collect()
}

pub fn count(store: &dyn Store, entity: &'static EntityDescriptor) -> u64 {
    store.begin().unwrap().count(entity).unwrap()
}

pub fn restore(store: &dyn Store, doc: &SnapshotDocument, policy: ConflictPolicy) -> RestoreSummary {
    RestoreEngine::new(store, RestoreOptions::with_policy(policy))
        .restore(doc)
        .unwrap()
}
