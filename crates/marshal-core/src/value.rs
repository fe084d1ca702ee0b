//! # Typed Values
//!
//! `TypedValue` is the in-memory form of a field after coercion. Each
//! variant corresponds to one declared field type; `Json` carries values of
//! fields declared as `Any`, which are passed through untouched.
//!
//! ## Output Encoding
//!
//! [`TypedValue::to_json`] is the single place where typed values become
//! plain output again:
//!
//! | Variant | Encoding |
//! |---------|----------|
//! | `DateTime` | RFC 3339, `Z` for UTC |
//! | `Date` | `YYYY-MM-DD` |
//! | `Time` | `HH:MM:SS[.f]` |
//! | `Duration` | ISO 8601 (`P3DT12H30M5S`) |
//! | `Uuid` | lowercase hyphenated |
//! | `Float` | JSON number, `null` when not finite |
//!
//! Every encoding is accepted back by the coercer, which is what makes
//! load/dump symmetric.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta};
use serde::{Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::record::Record;
use crate::temporal;

/// A value that has been coerced to a declared field type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Explicit null (only produced for fields that allow none).
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string (also used for validated emails).
    Str(String),
    /// Datetime with a fixed UTC offset.
    DateTime(DateTime<FixedOffset>),
    /// Calendar date.
    Date(NaiveDate),
    /// Wall-clock time.
    Time(NaiveTime),
    /// Signed duration.
    Duration(TimeDelta),
    /// UUID.
    Uuid(Uuid),
    /// Homogeneous list.
    List(Vec<TypedValue>),
    /// Nested record.
    Record(Record),
    /// Untyped passthrough for `Any` fields and included unknown keys.
    Json(Value),
}

impl TypedValue {
    /// Returns the type name for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::DateTime(_) => "datetime",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Duration(_) => "duration",
            Self::Uuid(_) => "uuid",
            Self::List(_) => "list",
            Self::Record(_) => "object",
            Self::Json(v) => json_type_name(v),
        }
    }

    /// Convert an untyped JSON value into the closest typed value.
    ///
    /// Integers that fit `i64` become `Int`, other numbers `Float`, objects
    /// become nested records. Used for literal values, which keep the type
    /// they were written with.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::Str(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => Self::Record(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Encode this value as plain JSON output.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Str(s) => Value::String(s.clone()),
            Self::DateTime(dt) => Value::String(temporal::format_datetime(dt)),
            Self::Date(d) => Value::String(temporal::format_date(d)),
            Self::Time(t) => Value::String(temporal::format_time(t)),
            Self::Duration(d) => Value::String(temporal::format_duration(d)),
            Self::Uuid(u) => Value::String(u.hyphenated().to_string()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Record(r) => r.to_json(),
            Self::Json(v) => v.clone(),
        }
    }

    /// Returns true for [`TypedValue::Null`] and for a JSON null passthrough.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Json(Value::Null))
    }

    /// String content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric content widened to `f64`, for integers and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Boolean content, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Nested record, if this is a record.
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(r) => Some(r),
            _ => None,
        }
    }

    /// List items, if this is a list.
    pub fn as_list(&self) -> Option<&[TypedValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl Serialize for TypedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for TypedValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<Uuid> for TypedValue {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<Record> for TypedValue {
    fn from(r: Record) -> Self {
        Self::Record(r)
    }
}

impl From<Vec<TypedValue>> for TypedValue {
    fn from(items: Vec<TypedValue>) -> Self {
        Self::List(items)
    }
}

/// Returns the JSON type name of a raw value for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "integer"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}
