//! Field values captured in snapshots
//!
//! A `FieldValue` carries the semantic type of a field so that comparisons
//! follow the meaning of the data rather than its textual form: numbers
//! compare numerically, timestamps compare as instants, and references compare
//! by the identity of the referenced row.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Longest text shown verbatim in summaries
const MAX_DISPLAY_CHARS: usize = 50;

/// A single field value with its semantic type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Field present with no value
    Null,
    Bool(bool),
    Integer(i64),
    /// Integers above `i64::MAX`
    Unsigned(u64),
    /// Always finite once captured; non-finite input becomes `Null`
    #[serde(deserialize_with = "deserialize_decimal")]
    Decimal(f64),
    Text(String),
    /// An instant in time, always stored in UTC
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    /// Foreign key to another model's row
    Reference { model: String, id: String },
    List(Vec<FieldValue>),
    /// Opaque structured data compared as-is
    Json(Value),
}

impl FieldValue {
    /// Build a reference to a row of another model
    pub fn reference(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Reference {
            model: model.into(),
            id: id.into(),
        }
    }

    /// Check if this is an explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert a JSON value, keeping nested objects opaque
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(u) = n.as_u64() {
                    Self::Unsigned(u)
                } else {
                    n.as_f64().map(Self::from).unwrap_or(Self::Null)
                }
            }
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            obj @ Value::Object(_) => Self::Json(obj),
        }
    }

    /// Replace non-finite decimals with `Null`, recursing into lists
    pub fn normalized(self) -> Self {
        match self {
            Self::Decimal(d) if !d.is_finite() => Self::Null,
            Self::List(items) => Self::List(items.into_iter().map(Self::normalized).collect()),
            other => other,
        }
    }

    /// Plain JSON rendering, used by exports
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Unsigned(u) => Value::from(*u),
            Self::Decimal(d) => Value::from(*d),
            Self::Text(s) => Value::String(s.clone()),
            Self::Timestamp(ts) => Value::String(ts.to_rfc3339()),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Reference { model, id } => serde_json::json!({ "model": model, "id": id }),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Json(v) => v.clone(),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Unsigned(a), Unsigned(b)) => a == b,
            (Integer(a), Unsigned(b)) | (Unsigned(b), Integer(a)) => {
                u64::try_from(*a).is_ok_and(|a| a == *b)
            }
            (Decimal(a), Decimal(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Integer(a), Decimal(b)) | (Decimal(b), Integer(a)) => integral_eq(i128::from(*a), *b),
            (Unsigned(a), Decimal(b)) | (Decimal(b), Unsigned(a)) => {
                integral_eq(i128::from(*a), *b)
            }
            (Text(a), Text(b)) => a == b,
            (Timestamp(a), Timestamp(b)) => a == b,
            (Date(a), Date(b)) => a == b,
            (Reference { model: ma, id: ia }, Reference { model: mb, id: ib }) => {
                ma == mb && ia == ib
            }
            (List(a), List(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y),
            (Json(a), Json(b)) => a == b,
            _ => false,
        }
    }
}

/// Exact comparison of an integer with a float: only an integral float
/// holding the very same number is equal
fn integral_eq(int: i128, float: f64) -> bool {
    // 2^127, the first magnitude outside i128
    const LIMIT: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;
    float.is_finite() && float.fract() == 0.0 && float.abs() < LIMIT && float as i128 == int
}

/// serde_json writes non-finite floats as `null`
fn deserialize_decimal<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Unsigned(u) => write!(f, "{}", u),
            Self::Decimal(d) => write!(f, "{}", d),
            Self::Text(s) => {
                if s.chars().count() > MAX_DISPLAY_CHARS {
                    let head: String = s.chars().take(MAX_DISPLAY_CHARS - 3).collect();
                    write!(f, "\"{}...\"", head)
                } else {
                    write!(f, "\"{}\"", s)
                }
            }
            Self::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Reference { model, id } => write!(f, "{}#{}", model, id),
            Self::List(items) => write!(f, "[{} items]", items.len()),
            Self::Json(Value::Object(obj)) => write!(f, "{{{} fields}}", obj.len()),
            Self::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<u64> for FieldValue {
    fn from(u: u64) -> Self {
        match i64::try_from(u) {
            Ok(i) => Self::Integer(i),
            Err(_) => Self::Unsigned(u),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(d: f64) -> Self {
        Self::Decimal(d).normalized()
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        Self::Timestamp(ts)
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        Self::Timestamp(ts.with_timezone(&Utc))
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}
