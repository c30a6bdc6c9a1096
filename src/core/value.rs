// Field types, cell values, and the canonical text form used by page files.
use std::fmt;

use serde_json::{Value as JsonValue, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::error::{Error, ErrorKind};

/// Closed set of storable field types. Each backend maps these through its own table.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FieldType {
    String,
    Int64,
    Int32,
    Int16,
    Byte,
    Boolean,
    Binary,
    DateTime,
    Double,
}

impl FieldType {
    pub const ALL: [FieldType; 9] = [
        FieldType::String,
        FieldType::Int64,
        FieldType::Int32,
        FieldType::Int16,
        FieldType::Byte,
        FieldType::Boolean,
        FieldType::Binary,
        FieldType::DateTime,
        FieldType::Double,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldType::String => "String",
            FieldType::Int64 => "Int64",
            FieldType::Int32 => "Int32",
            FieldType::Int16 => "Int16",
            FieldType::Byte => "Byte",
            FieldType::Boolean => "Boolean",
            FieldType::Binary => "Binary",
            FieldType::DateTime => "DateTime",
            FieldType::Double => "Double",
        }
    }

    /// Unknown names are rejected rather than guessed.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        Self::ALL
            .into_iter()
            .find(|ty| ty.name() == name)
            .ok_or_else(|| Error::invalid(format!("unknown field type `{name}`")))
    }

    /// Text and binary fields are not range-scannable.
    pub fn is_indexable(self) -> bool {
        !matches!(self, FieldType::String | FieldType::Binary)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    String(String),
    Int64(i64),
    Int32(i32),
    Int16(i16),
    Byte(u8),
    Boolean(bool),
    Binary(Vec<u8>),
    DateTime(OffsetDateTime),
    Double(f64),
}

pub type Row = Vec<Value>;

impl Value {
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            Value::Null => None,
            Value::String(_) => Some(FieldType::String),
            Value::Int64(_) => Some(FieldType::Int64),
            Value::Int32(_) => Some(FieldType::Int32),
            Value::Int16(_) => Some(FieldType::Int16),
            Value::Byte(_) => Some(FieldType::Byte),
            Value::Boolean(_) => Some(FieldType::Boolean),
            Value::Binary(_) => Some(FieldType::Binary),
            Value::DateTime(_) => Some(FieldType::DateTime),
            Value::Double(_) => Some(FieldType::Double),
        }
    }

    /// Null fits any field.
    pub fn fits(&self, field_type: FieldType) -> bool {
        self.field_type().is_none_or(|ty| ty == field_type)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::String(v) => json!(v),
            Value::Int64(v) => json!(v),
            Value::Int32(v) => json!(v),
            Value::Int16(v) => json!(v),
            Value::Byte(v) => json!(v),
            Value::Boolean(v) => json!(v),
            Value::Binary(v) => json!(hex::encode(v)),
            Value::DateTime(v) => v
                .format(&Rfc3339)
                .map(JsonValue::String)
                .unwrap_or_else(|_| json!(v.to_string())),
            Value::Double(v) => json!(v),
        }
    }

    /// Canonical text form. Null renders as the empty string.
    pub fn to_text(&self) -> Result<String, Error> {
        let text = match self {
            Value::Null => String::new(),
            Value::String(v) => escape(v),
            Value::Int64(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Boolean(v) => v.to_string(),
            Value::Binary(v) => hex::encode(v),
            Value::DateTime(v) => v.format(&Rfc3339).map_err(|err| {
                Error::invalid("timestamp has no RFC 3339 form").with_source(err)
            })?,
            Value::Double(v) => v.to_string(),
        };
        Ok(text)
    }

    /// Inverse of [`Value::to_text`]; the empty string reads back as `Null`.
    pub fn from_text(field_type: FieldType, text: &str) -> Result<Self, Error> {
        if text.is_empty() {
            return Ok(Value::Null);
        }
        let corrupt = |err: &dyn fmt::Display| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!("bad {field_type} value `{text}`: {err}"))
        };
        let value = match field_type {
            FieldType::String => Value::String(unescape(text)),
            FieldType::Int64 => Value::Int64(text.parse().map_err(|e| corrupt(&e))?),
            FieldType::Int32 => Value::Int32(text.parse().map_err(|e| corrupt(&e))?),
            FieldType::Int16 => Value::Int16(text.parse().map_err(|e| corrupt(&e))?),
            FieldType::Byte => Value::Byte(text.parse().map_err(|e| corrupt(&e))?),
            FieldType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Boolean(true),
                "false" | "0" => Value::Boolean(false),
                _ => return Err(corrupt(&"expected true or false")),
            },
            FieldType::Binary => Value::Binary(hex::decode(text).map_err(|e| corrupt(&e))?),
            FieldType::DateTime => {
                Value::DateTime(OffsetDateTime::parse(text, &Rfc3339).map_err(|e| corrupt(&e))?)
            }
            FieldType::Double => Value::Double(text.parse().map_err(|e| corrupt(&e))?),
        };
        Ok(value)
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
