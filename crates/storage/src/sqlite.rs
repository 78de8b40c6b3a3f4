//! SQLite store
//!
//! Tables are created from the entity descriptors in restore order, so
//! every `REFERENCES` clause points at a table that already exists.
//! Enforcement of `FOREIGN KEY`, `UNIQUE` (natural key) and `NOT NULL` is
//! left to SQLite; violations come back as
//! [`StorageError::ConstraintViolation`].
//!
//! Value mapping:
//!
//! | Field type  | Column    | Stored as                        |
//! |-------------|-----------|----------------------------------|
//! | string      | TEXT      | text                             |
//! | integer     | INTEGER   | integer                          |
//! | decimal     | REAL      | real                             |
//! | boolean     | INTEGER   | 0 / 1                            |
//! | date        | TEXT      | `YYYY-MM-DD`                     |
//! | datetime    | TEXT      | `YYYY-MM-DDTHH:MM:SS[.fff]`      |
//! | time        | TEXT      | `HH:MM:SS[.fff]`                 |
//! | blob        | BLOB      | bytes                            |

use std::path::Path;

use fleetvault_core::temporal::{
    format_date, format_datetime, format_time, parse_date, parse_datetime, parse_time,
};
use fleetvault_core::{
    restore_order, EntityDescriptor, FieldDescriptor, FieldType, NaturalKey, Row, RowId,
    StoredRow, Value,
};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tracing::{debug, warn};

use crate::constraints::{check_fields, check_row};
use crate::error::{StorageError, StorageResult};
use crate::traits::{Session, Store};

/// Store backed by a SQLite database file
pub struct SqliteStore {
    source: String,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        Self::init(conn, path.display().to_string())
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::init(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn init(conn: Connection, source: String) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for entity in restore_order()? {
            conn.execute_batch(&table_ddl(entity))?;
        }
        debug!(target: "fleetvault::storage", source = %source, "Opened SQLite store");
        Ok(SqliteStore {
            source,
            conn: Mutex::new(conn),
        })
    }
}

impl Store for SqliteStore {
    fn begin(&self) -> StorageResult<Box<dyn Session + '_>> {
        let conn = self.conn.try_lock().ok_or(StorageError::Busy)?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteSession {
            conn,
            finished: false,
        }))
    }

    fn source(&self) -> String {
        self.source.clone()
    }
}

/// `CREATE TABLE` statement for an entity type
pub fn table_ddl(entity: &EntityDescriptor) -> String {
    let mut columns = vec![r#""id" INTEGER PRIMARY KEY AUTOINCREMENT"#.to_string()];
    for field in entity.fields {
        let mut column = format!("{} {}", quote(field.name), column_type(field.ty));
        if !field.nullable {
            column.push_str(" NOT NULL");
        }
        columns.push(column);
    }
    let key: Vec<String> = entity.natural_key.iter().map(|f| quote(f)).collect();
    columns.push(format!("UNIQUE ({})", key.join(", ")));
    for fk in entity.foreign_keys() {
        columns.push(format!(
            "FOREIGN KEY ({}) REFERENCES {} (\"id\")",
            quote(fk.name),
            quote(fk.references.unwrap_or_default())
        ));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        quote(entity.name),
        columns.join(",\n    ")
    )
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn column_type(ty: FieldType) -> &'static str {
    match ty {
        FieldType::String | FieldType::Date | FieldType::DateTime | FieldType::Time => "TEXT",
        FieldType::Integer | FieldType::Boolean => "INTEGER",
        FieldType::Decimal => "REAL",
        FieldType::Blob => "BLOB",
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Date(d) => SqlValue::Text(format_date(d)),
        Value::DateTime(dt) => SqlValue::Text(format_datetime(dt)),
        Value::Time(t) => SqlValue::Text(format_time(t)),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
    }
}

fn from_sql(
    entity: &EntityDescriptor,
    field: &FieldDescriptor,
    raw: ValueRef<'_>,
) -> StorageResult<Value> {
    let corrupt = |what: &str| {
        StorageError::Backend(format!(
            "column {}.{} holds {} where {} was expected",
            entity.name,
            field.name,
            what,
            field.ty.name()
        ))
    };
    let value = match (field.ty, raw) {
        (_, ValueRef::Null) => Value::Null,
        (FieldType::Integer, ValueRef::Integer(i)) => Value::Int(i),
        (FieldType::Decimal, ValueRef::Real(f)) => Value::Float(f),
        (FieldType::Decimal, ValueRef::Integer(i)) => Value::Float(i as f64),
        (FieldType::Boolean, ValueRef::Integer(i)) => Value::Bool(i != 0),
        (FieldType::Blob, ValueRef::Blob(b)) => Value::Bytes(b.to_vec()),
        (ty, ValueRef::Text(bytes)) => {
            let text = std::str::from_utf8(bytes).map_err(|_| corrupt("invalid UTF-8"))?;
            match ty {
                FieldType::String => Value::String(text.to_string()),
                FieldType::Date => Value::Date(parse_date(text).ok_or_else(|| corrupt(text))?),
                FieldType::DateTime => {
                    Value::DateTime(parse_datetime(text).ok_or_else(|| corrupt(text))?)
                }
                FieldType::Time => Value::Time(parse_time(text).ok_or_else(|| corrupt(text))?),
                _ => return Err(corrupt("text")),
            }
        }
        (_, ValueRef::Integer(_)) => return Err(corrupt("an integer")),
        (_, ValueRef::Real(_)) => return Err(corrupt("a real")),
        (_, ValueRef::Blob(_)) => return Err(corrupt("a blob")),
    };
    Ok(value)
}

struct SqliteSession<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl SqliteSession<'_> {
    fn select_columns(entity: &EntityDescriptor) -> String {
        std::iter::once(quote("id"))
            .chain(entity.fields.iter().map(|f| quote(f.name)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn query(
        &self,
        entity: &EntityDescriptor,
        sql: &str,
        params: Vec<SqlValue>,
    ) -> StorageResult<Vec<StoredRow>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut result = Vec::new();
        while let Some(r) = rows.next()? {
            let id: i64 = r.get(0)?;
            let mut row = Row::new();
            for (i, field) in entity.fields.iter().enumerate() {
                row.set(field.name, from_sql(entity, field, r.get_ref(i + 1)?)?);
            }
            result.push(StoredRow::new(RowId(id), row));
        }
        Ok(result)
    }

    fn finish(&mut self, statement: &str) -> StorageResult<()> {
        self.finished = true;
        self.conn.execute_batch(statement)?;
        Ok(())
    }
}

impl Session for SqliteSession<'_> {
    fn scan(&mut self, entity: &'static EntityDescriptor) -> StorageResult<Vec<StoredRow>> {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY \"id\"",
            Self::select_columns(entity),
            quote(entity.name)
        );
        self.query(entity, &sql, Vec::new())
    }

    fn count(&mut self, entity: &'static EntityDescriptor) -> StorageResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(entity.name));
        let n: i64 = self.conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    fn find_by_natural_key(
        &mut self,
        entity: &'static EntityDescriptor,
        key: &NaturalKey,
    ) -> StorageResult<Option<StoredRow>> {
        let predicate: Vec<String> = entity
            .natural_key
            .iter()
            .enumerate()
            .map(|(i, f)| format!("{} = ?{}", quote(f), i + 1))
            .collect();
        let sql = format!(
            "SELECT {} FROM {} WHERE {} LIMIT 1",
            Self::select_columns(entity),
            quote(entity.name),
            predicate.join(" AND ")
        );
        let params = key.values().iter().map(to_sql).collect();
        Ok(self.query(entity, &sql, params)?.into_iter().next())
    }

    fn insert(&mut self, entity: &'static EntityDescriptor, row: &Row) -> StorageResult<RowId> {
        check_row(entity, row)?;
        let (names, params): (Vec<String>, Vec<SqlValue>) =
            row.iter().map(|(name, value)| (quote(name), to_sql(value))).unzip();
        let sql = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote(entity.name))
        } else {
            let slots: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(entity.name),
                names.join(", "),
                slots.join(", ")
            )
        };
        self.conn.execute(&sql, params_from_iter(params.iter()))?;
        Ok(RowId(self.conn.last_insert_rowid()))
    }

    fn update(
        &mut self,
        entity: &'static EntityDescriptor,
        id: RowId,
        row: &Row,
    ) -> StorageResult<()> {
        check_fields(entity, row)?;
        if row.is_empty() {
            return Ok(());
        }
        let mut params: Vec<SqlValue> = Vec::with_capacity(row.len() + 1);
        let mut assignments = Vec::with_capacity(row.len());
        for (i, (name, value)) in row.iter().enumerate() {
            assignments.push(format!("{} = ?{}", quote(name), i + 1));
            params.push(to_sql(value));
        }
        params.push(SqlValue::Integer(id.get()));
        let sql = format!(
            "UPDATE {} SET {} WHERE \"id\" = ?{}",
            quote(entity.name),
            assignments.join(", "),
            params.len()
        );
        let changed = self.conn.execute(&sql, params_from_iter(params.iter()))?;
        if changed == 0 {
            return Err(StorageError::RowNotFound {
                entity: entity.name,
                id,
            });
        }
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> StorageResult<()> {
        self.finish("COMMIT")
    }

    fn rollback(mut self: Box<Self>) -> StorageResult<()> {
        self.finish("ROLLBACK")
    }
}

impl Drop for SqliteSession<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!(
                    target: "fleetvault::storage",
                    error = %e,
                    "Rollback of abandoned session failed"
                );
            }
        }
    }
}
