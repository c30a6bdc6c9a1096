// Field type <-> declared SQL column type, and value binding in both directions.
use rusqlite::types::{Value as SqlValue, ValueRef};

use crate::core::error::{Error, ErrorKind};
use crate::core::value::{FieldType, Value};

/// Declared column types. `PRAGMA table_info` reports them verbatim, so the
/// schema can be recovered from the physical table.
const TYPE_MAP: [(FieldType, &str); 9] = [
    (FieldType::String, "TEXT"),
    (FieldType::Int64, "BIGINT"),
    (FieldType::Int32, "INT"),
    (FieldType::Int16, "SMALLINT"),
    (FieldType::Byte, "TINYINT"),
    (FieldType::Boolean, "BIT"),
    (FieldType::Binary, "BLOB"),
    (FieldType::DateTime, "DATETIME"),
    (FieldType::Double, "FLOAT"),
];

pub(crate) fn column_type(field_type: FieldType) -> &'static str {
    TYPE_MAP
        .iter()
        .find(|(ty, _)| *ty == field_type)
        .map(|(_, decl)| *decl)
        .unwrap_or("TEXT")
}

pub(crate) fn field_type(declared: &str) -> Result<FieldType, Error> {
    TYPE_MAP
        .iter()
        .find(|(_, decl)| decl.eq_ignore_ascii_case(declared.trim()))
        .map(|(ty, _)| *ty)
        .ok_or_else(|| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!("column type `{declared}` has no field type"))
        })
}

pub(crate) fn to_sql(value: &Value) -> Result<SqlValue, Error> {
    let bound = match value {
        Value::Null => SqlValue::Null,
        Value::String(v) => SqlValue::Text(v.clone()),
        Value::Int64(v) => SqlValue::Integer(*v),
        Value::Int32(v) => SqlValue::Integer(i64::from(*v)),
        Value::Int16(v) => SqlValue::Integer(i64::from(*v)),
        Value::Byte(v) => SqlValue::Integer(i64::from(*v)),
        Value::Boolean(v) => SqlValue::Integer(i64::from(*v)),
        Value::Binary(v) => SqlValue::Blob(v.clone()),
        Value::DateTime(_) => SqlValue::Text(value.to_text()?),
        Value::Double(v) => SqlValue::Real(*v),
    };
    Ok(bound)
}

pub(crate) fn from_sql(field_type: FieldType, cell: ValueRef<'_>) -> Result<Value, Error> {
    let mismatch = || {
        Error::new(ErrorKind::Corrupt).with_message(format!(
            "stored {:?} cell does not fit a {field_type} field",
            cell.data_type()
        ))
    };
    let value = match (field_type, cell) {
        (_, ValueRef::Null) => Value::Null,
        (FieldType::String, ValueRef::Text(bytes)) => {
            Value::String(String::from_utf8(bytes.to_vec()).map_err(|_| mismatch())?)
        }
        (FieldType::Int64, ValueRef::Integer(v)) => Value::Int64(v),
        (FieldType::Int32, ValueRef::Integer(v)) => {
            Value::Int32(i32::try_from(v).map_err(|_| mismatch())?)
        }
        (FieldType::Int16, ValueRef::Integer(v)) => {
            Value::Int16(i16::try_from(v).map_err(|_| mismatch())?)
        }
        (FieldType::Byte, ValueRef::Integer(v)) => {
            Value::Byte(u8::try_from(v).map_err(|_| mismatch())?)
        }
        (FieldType::Boolean, ValueRef::Integer(v)) => Value::Boolean(v != 0),
        (FieldType::Binary, ValueRef::Blob(bytes)) => Value::Binary(bytes.to_vec()),
        (FieldType::DateTime, ValueRef::Text(bytes)) => {
            let text = std::str::from_utf8(bytes).map_err(|_| mismatch())?;
            Value::from_text(FieldType::DateTime, text)?
        }
        (FieldType::Double, ValueRef::Real(v)) => Value::Double(v),
        (FieldType::Double, ValueRef::Integer(v)) => Value::Double(v as f64),
        _ => return Err(mismatch()),
    };
    Ok(value)
}
