use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Primitive kinds a defaults store accepts without any encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawKind {
    Bool,
    String,
    Integer,
    Double,
    Float,
    Timestamp,
    Bytes,
}

impl RawKind {
    pub const ALL: [RawKind; 7] = [
        RawKind::Bool,
        RawKind::String,
        RawKind::Integer,
        RawKind::Double,
        RawKind::Float,
        RawKind::Timestamp,
        RawKind::Bytes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RawKind::Bool => "bool",
            RawKind::String => "string",
            RawKind::Integer => "integer",
            RawKind::Double => "double",
            RawKind::Float => "float",
            RawKind::Timestamp => "timestamp",
            RawKind::Bytes => "bytes",
        }
    }
}

impl fmt::Display for RawKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value in the representation the store persists natively.
///
/// Anything richer than these primitives has to be encoded into one of them
/// (structured values become `String`, secure archives become `Bytes`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RawValue {
    Bool(bool),
    String(String),
    Integer(i64),
    Double(f64),
    Float(f32),
    Timestamp(DateTime<Utc>),
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl RawValue {
    pub fn kind(&self) -> RawKind {
        match self {
            RawValue::Bool(_) => RawKind::Bool,
            RawValue::String(_) => RawKind::String,
            RawValue::Integer(_) => RawKind::Integer,
            RawValue::Double(_) => RawKind::Double,
            RawValue::Float(_) => RawKind::Float,
            RawValue::Timestamp(_) => RawKind::Timestamp,
            RawValue::Bytes(_) => RawKind::Bytes,
        }
    }

    /// Parse the textual form produced by `Display` back into a value of `kind`.
    ///
    /// Timestamps are RFC 3339, byte buffers are standard base64.
    pub fn parse(kind: RawKind, text: &str) -> Result<Self, ParseRawError> {
        let invalid = |reason: String| ParseRawError::Invalid { kind, reason };
        match kind {
            RawKind::Bool => text
                .trim()
                .parse()
                .map(RawValue::Bool)
                .map_err(|e| invalid(e.to_string())),
            RawKind::String => Ok(RawValue::String(text.to_string())),
            RawKind::Integer => text
                .trim()
                .parse()
                .map(RawValue::Integer)
                .map_err(|e| invalid(e.to_string())),
            RawKind::Double => text
                .trim()
                .parse()
                .map(RawValue::Double)
                .map_err(|e| invalid(e.to_string())),
            RawKind::Float => text
                .trim()
                .parse()
                .map(RawValue::Float)
                .map_err(|e| invalid(e.to_string())),
            RawKind::Timestamp => DateTime::parse_from_rfc3339(text.trim())
                .map(|ts| RawValue::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|e| invalid(e.to_string())),
            RawKind::Bytes => STANDARD
                .decode(text.trim())
                .map(RawValue::Bytes)
                .map_err(|e| invalid(e.to_string())),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Bool(v) => write!(f, "{v}"),
            RawValue::String(v) => f.write_str(v),
            RawValue::Integer(v) => write!(f, "{v}"),
            RawValue::Double(v) => write!(f, "{v}"),
            RawValue::Float(v) => write!(f, "{v}"),
            RawValue::Timestamp(v) => f.write_str(&v.to_rfc3339()),
            RawValue::Bytes(v) => f.write_str(&STANDARD.encode(v)),
        }
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Bool(value)
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::String(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::String(value.to_string())
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Integer(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Double(value)
    }
}

impl From<f32> for RawValue {
    fn from(value: f32) -> Self {
        RawValue::Float(value)
    }
}

impl From<DateTime<Utc>> for RawValue {
    fn from(value: DateTime<Utc>) -> Self {
        RawValue::Timestamp(value)
    }
}

impl From<Vec<u8>> for RawValue {
    fn from(value: Vec<u8>) -> Self {
        RawValue::Bytes(value)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseRawError {
    #[error("invalid {kind} value: {reason}")]
    Invalid { kind: RawKind, reason: String },
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(D::Error::custom)
    }
}
