//! Cache Value Module
//!
//! Tagged values stored in the cache and their byte encoding in the arena.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

// == Value Kind ==
/// Type tag kept in entry metadata alongside the arena handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Int,
    Float,
    Str,
    Blob,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Str => "string",
            ValueKind::Blob => "blob",
        }
    }
}

// == Cache Value ==
/// A value held by the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CacheValue {
    /// Signed 64-bit integer; the only kind numeric operations accept
    Int(i64),
    Float(f64),
    Str(String),
    /// Opaque bytes, usually a serialized structure
    Blob(Vec<u8>),
}

impl CacheValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            CacheValue::Int(_) => ValueKind::Int,
            CacheValue::Float(_) => ValueKind::Float,
            CacheValue::Str(_) => ValueKind::Str,
            CacheValue::Blob(_) => ValueKind::Blob,
        }
    }

    // == Encoding ==
    /// Bytes written to the arena. Numbers are little-endian.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            CacheValue::Int(v) => v.to_le_bytes().to_vec(),
            CacheValue::Float(v) => v.to_le_bytes().to_vec(),
            CacheValue::Str(s) => s.as_bytes().to_vec(),
            CacheValue::Blob(b) => b.clone(),
        }
    }

    /// Rebuilds a value from arena bytes and its type tag.
    ///
    /// Returns None if the bytes do not match the tag.
    pub fn decode(kind: ValueKind, bytes: &[u8]) -> Option<Self> {
        match kind {
            ValueKind::Int => Some(CacheValue::Int(i64::from_le_bytes(bytes.try_into().ok()?))),
            ValueKind::Float => Some(CacheValue::Float(f64::from_le_bytes(
                bytes.try_into().ok()?,
            ))),
            ValueKind::Str => String::from_utf8(bytes.to_vec()).ok().map(CacheValue::Str),
            ValueKind::Blob => Some(CacheValue::Blob(bytes.to_vec())),
        }
    }

    // == Serialized Blobs ==
    /// Serializes any serde value into a blob.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self> {
        Ok(CacheValue::Blob(serde_json::to_vec(value)?))
    }

    /// Deserializes this value. Blobs are decoded as JSON; scalar values are
    /// converted directly.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match self {
            CacheValue::Blob(bytes) => return Ok(serde_json::from_slice(bytes)?),
            CacheValue::Int(v) => serde_json::Value::from(*v),
            CacheValue::Float(v) => serde_json::Value::from(*v),
            CacheValue::Str(s) => serde_json::Value::from(s.as_str()),
        };
        Ok(serde_json::from_value(value)?)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            CacheValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CacheValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<i64> for CacheValue {
    fn from(v: i64) -> Self {
        CacheValue::Int(v)
    }
}

impl From<i32> for CacheValue {
    fn from(v: i32) -> Self {
        CacheValue::Int(v.into())
    }
}

impl From<f64> for CacheValue {
    fn from(v: f64) -> Self {
        CacheValue::Float(v)
    }
}

impl From<&str> for CacheValue {
    fn from(v: &str) -> Self {
        CacheValue::Str(v.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(v: String) -> Self {
        CacheValue::Str(v)
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(v: Vec<u8>) -> Self {
        CacheValue::Blob(v)
    }
}
