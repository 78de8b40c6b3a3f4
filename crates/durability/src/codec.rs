//! Field codec between stored rows and snapshot records
//!
//! Encoding is strict: a stored value must match its declared field type
//! exactly, or the snapshot is refused. Decoding is lenient where older
//! exports differ (numeric strings for decimals, 0/1 for booleans, a space
//! as the datetime separator) and reports fields the descriptor does not
//! know instead of failing on them.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use fleetvault_core::temporal::{
    format_date, format_datetime, format_time, parse_date, parse_datetime, parse_time,
};
use fleetvault_core::{EntityDescriptor, FieldDescriptor, FieldType, Row, StoredRow, Value};
use serde_json::{Number, Value as JsonValue};

use crate::document::Record;
use crate::error::{DecodeError, SerializationError};

/// Key of the snapshot-local primary key inside a record
pub const ID_FIELD: &str = "id";

/// Encode one stored row as a snapshot record
pub fn encode_record(
    entity: &'static EntityDescriptor,
    stored: &StoredRow,
) -> Result<Record, SerializationError> {
    if let Some((name, _)) = stored
        .row
        .iter()
        .find(|(name, _)| entity.field(name).is_none())
    {
        return Err(SerializationError::UndeclaredField {
            entity: entity.name,
            field: name.to_string(),
        });
    }

    let mut record = Record::new();
    record.insert(ID_FIELD.to_string(), JsonValue::from(stored.id.get()));
    for field in entity.fields {
        let value = stored.row.get_or_null(field.name);
        record.insert(field.name.to_string(), encode_value(entity, field, value)?);
    }
    Ok(record)
}

/// Encode one field value
pub fn encode_value(
    entity: &'static EntityDescriptor,
    field: &'static FieldDescriptor,
    value: &Value,
) -> Result<JsonValue, SerializationError> {
    let mismatch = || SerializationError::TypeMismatch {
        entity: entity.name,
        field: field.name,
        expected: field.ty.name(),
        found: value.type_name(),
    };

    let json = match (field.ty, value) {
        (_, Value::Null) if field.nullable => JsonValue::Null,
        (_, Value::Null) => {
            return Err(SerializationError::NullInRequired {
                entity: entity.name,
                field: field.name,
            })
        }
        (FieldType::String, Value::String(s)) => JsonValue::String(s.clone()),
        (FieldType::Integer, Value::Int(i)) => JsonValue::from(*i),
        (FieldType::Decimal, Value::Int(i)) => JsonValue::from(*i as f64),
        (FieldType::Decimal, Value::Float(f)) => {
            JsonValue::Number(Number::from_f64(*f).ok_or(SerializationError::NonFinite {
                entity: entity.name,
                field: field.name,
                value: *f,
            })?)
        }
        (FieldType::Boolean, Value::Bool(b)) => JsonValue::Bool(*b),
        (FieldType::Date, Value::Date(d)) => JsonValue::String(format_date(d)),
        (FieldType::DateTime, Value::DateTime(dt)) => JsonValue::String(format_datetime(dt)),
        (FieldType::Time, Value::Time(t)) => JsonValue::String(format_time(t)),
        (FieldType::Blob, Value::Bytes(b)) => JsonValue::String(BASE64.encode(b)),
        _ => return Err(mismatch()),
    };
    Ok(json)
}

/// A snapshot record turned back into a row
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    /// Snapshot-local primary key
    pub id: i64,
    /// Every declared field; absent nullable fields are null
    pub row: Row,
    /// Record keys the descriptor does not declare, in key order
    pub unknown_fields: Vec<String>,
}

/// Decode one snapshot record
///
/// # Errors
///
/// `MissingId` / `InvalidId` for a bad `id`, `MissingField` for an absent
/// or null required field, `InvalidValue` for a value of the wrong shape.
pub fn decode_record(
    entity: &'static EntityDescriptor,
    record: &Record,
) -> Result<DecodedRecord, DecodeError> {
    let id = match record.get(ID_FIELD) {
        None | Some(JsonValue::Null) => return Err(DecodeError::MissingId),
        Some(v) => v.as_i64().ok_or_else(|| DecodeError::InvalidId(v.to_string()))?,
    };

    let mut row = Row::new();
    for field in entity.fields {
        let value = match record.get(field.name) {
            None | Some(JsonValue::Null) => Value::Null,
            Some(json) => decode_value(field, json)?,
        };
        if value.is_null() && !field.nullable {
            return Err(DecodeError::MissingField(field.name));
        }
        row.set(field.name, value);
    }

    let unknown_fields = record
        .keys()
        .filter(|k| k.as_str() != ID_FIELD && entity.field(k).is_none())
        .cloned()
        .collect();

    Ok(DecodedRecord {
        id,
        row,
        unknown_fields,
    })
}

/// Decode one non-null field value
pub fn decode_value(
    field: &'static FieldDescriptor,
    json: &JsonValue,
) -> Result<Value, DecodeError> {
    let invalid = || DecodeError::InvalidValue {
        field: field.name,
        expected: field.ty.name(),
        found: json.to_string(),
    };

    let value = match (field.ty, json) {
        (FieldType::String, JsonValue::String(s)) => Value::String(s.clone()),
        (FieldType::Integer, JsonValue::Number(n)) => Value::Int(n.as_i64().ok_or_else(invalid)?),
        (FieldType::Decimal, JsonValue::Number(n)) => {
            Value::Float(n.as_f64().ok_or_else(invalid)?)
        }
        (FieldType::Decimal, JsonValue::String(s)) => {
            let f: f64 = s.trim().parse().map_err(|_| invalid())?;
            if !f.is_finite() {
                return Err(invalid());
            }
            Value::Float(f)
        }
        (FieldType::Boolean, JsonValue::Bool(b)) => Value::Bool(*b),
        (FieldType::Boolean, JsonValue::Number(n)) => match n.as_i64() {
            Some(0) => Value::Bool(false),
            Some(1) => Value::Bool(true),
            _ => return Err(invalid()),
        },
        (FieldType::Date, JsonValue::String(s)) => Value::Date(parse_date(s).ok_or_else(invalid)?),
        (FieldType::DateTime, JsonValue::String(s)) => {
            Value::DateTime(parse_datetime(s).ok_or_else(invalid)?)
        }
        (FieldType::Time, JsonValue::String(s)) => Value::Time(parse_time(s).ok_or_else(invalid)?),
        (FieldType::Blob, JsonValue::String(s)) => {
            Value::Bytes(BASE64.decode(s.as_bytes()).map_err(|_| invalid())?)
        }
        _ => return Err(invalid()),
    };
    Ok(value)
}
