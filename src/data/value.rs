use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Serialize, Serializer};

use super::dataset::DatasetError;

/// Object key that marks a JSON cell value as a timestamp
pub const TIMESTAMP_TAG: &str = "ts";

/// Value stored in a single (row, column) slot at a point in time
#[derive(Debug, Clone)]
pub enum CellValue {
    Null,
    Int64(i64),
    Float64(f64),
    String(String),
    /// Epoch milliseconds
    Timestamp(i64),
}

impl CellValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Int64(_) => "int64",
            CellValue::Float64(_) => "float64",
            CellValue::String(_) => "string",
            CellValue::Timestamp(_) => "timestamp",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int64(v) => Some(*v),
            CellValue::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float64(v) => Some(*v),
            CellValue::Int64(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Convert a JSON value into a cell value.
    ///
    /// Timestamp values are written as `{"ts": <timestamp>}`, where the inner
    /// value takes any form [`parse_timestamp`] accepts. Booleans, arrays and
    /// other objects are outside the supported value union.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, DatasetError> {
        match json {
            serde_json::Value::Object(map) if map.len() == 1 => match map.get(TIMESTAMP_TAG) {
                Some(ts) => parse_timestamp(ts).map(CellValue::Timestamp),
                None => Err(DatasetError::InvalidValueType("object".to_string())),
            },
            serde_json::Value::Null => Ok(CellValue::Null),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(CellValue::Int64(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(CellValue::Float64(f))
                } else {
                    Err(DatasetError::InvalidValueType(n.to_string()))
                }
            }
            serde_json::Value::String(s) => Ok(CellValue::String(s.clone())),
            other => Err(DatasetError::InvalidValueType(json_type_name(other).to_string())),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Int64(i) => serde_json::json!(i),
            CellValue::Float64(f) => serde_json::json!(f),
            CellValue::String(s) => serde_json::Value::String(s.clone()),
            CellValue::Timestamp(t) => match format_timestamp(*t) {
                Some(s) => serde_json::Value::String(s),
                None => serde_json::json!(t),
            },
        }
    }
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Int64(a), CellValue::Int64(b)) => a == b,
            (CellValue::Float64(a), CellValue::Float64(b)) => a.to_bits() == b.to_bits(),
            (CellValue::String(a), CellValue::String(b)) => a == b,
            (CellValue::Timestamp(a), CellValue::Timestamp(b)) => a == b,
            _ => false,
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Null
    }
}

impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Int64(v)
    }
}

impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        CellValue::Int64(v as i64)
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float64(v)
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::String(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::String(v)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Int64(i) => write!(f, "{}", i),
            CellValue::Float64(v) => write!(f, "{}", v),
            CellValue::String(s) => write!(f, "{}", s),
            CellValue::Timestamp(t) => match format_timestamp(*t) {
                Some(s) => write!(f, "{}", s),
                None => write!(f, "{}", t),
            },
        }
    }
}

/// Parse a cell timestamp from JSON.
///
/// Accepts epoch milliseconds, an RFC 3339 string, or a bare `YYYY-MM-DD`
/// date (midnight UTC).
pub fn parse_timestamp(json: &serde_json::Value) -> Result<i64, DatasetError> {
    match json {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| DatasetError::InvalidTimestamp(n.to_string())),
        serde_json::Value::String(s) => parse_timestamp_str(s),
        other => Err(DatasetError::InvalidTimestamp(other.to_string())),
    }
}

fn parse_timestamp_str(s: &str) -> Result<i64, DatasetError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp_millis());
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| DatasetError::InvalidTimestamp(s.to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DatasetError::InvalidTimestamp(s.to_string()))?;
    Ok(Utc.from_utc_datetime(&midnight).timestamp_millis())
}

fn format_timestamp(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

pub(crate) fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
