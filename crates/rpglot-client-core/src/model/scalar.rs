//! Scalar field values and entity identifiers.

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// Open map of the non-id fields of a row.
pub type Fields = BTreeMap<String, Scalar>;

/// One field value of a row.
///
/// Integers are normalised on construction: every value that fits in `i64`
/// is stored as `Int`, only larger ones as `UInt`. The same number therefore
/// always compares equal regardless of where it came from.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum Scalar {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Converts the value into an entity id. Floats, booleans and nulls
    /// cannot identify a row.
    pub fn as_entity_id(&self) -> Option<EntityId> {
        match self {
            Scalar::Int(v) => Some(EntityId::Int(*v)),
            Scalar::UInt(v) => Some(EntityId::UInt(*v)),
            Scalar::Text(v) => Some(EntityId::Text(v.clone())),
            Scalar::Null | Scalar::Bool(_) | Scalar::Float(_) => None,
        }
    }
}

impl From<serde_json::Value> for Scalar {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Scalar::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Scalar::UInt(u)
                } else {
                    n.as_f64().map_or(Scalar::Null, Scalar::Float)
                }
            }
            Value::String(s) => Scalar::Text(s),
            // Nested values are not navigable; keep their text for display/filtering.
            other @ (Value::Array(_) | Value::Object(_)) => Scalar::Text(other.to_string()),
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v.into())
    }
}

impl From<u32> for Scalar {
    fn from(v: u32) -> Self {
        Scalar::Int(v.into())
    }
}

impl From<u64> for Scalar {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => Scalar::Int(i),
            Err(_) => Scalar::UInt(v),
        }
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<EntityId> for Scalar {
    fn from(id: EntityId) -> Self {
        match id {
            EntityId::Int(v) => Scalar::Int(v),
            EntityId::UInt(v) => Scalar::UInt(v),
            EntityId::Text(v) => Scalar::Text(v),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::Int(v) => write!(f, "{}", v),
            Scalar::UInt(v) => write!(f, "{}", v),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Text(v) => f.write_str(v),
        }
    }
}

/// Identifier of a row within one collection of one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    Int(i64),
    UInt(u64),
    Text(String),
}

impl From<i64> for EntityId {
    fn from(v: i64) -> Self {
        EntityId::Int(v)
    }
}

impl From<i32> for EntityId {
    fn from(v: i32) -> Self {
        EntityId::Int(v.into())
    }
}

impl From<u32> for EntityId {
    fn from(v: u32) -> Self {
        EntityId::Int(v.into())
    }
}

impl From<u64> for EntityId {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => EntityId::Int(i),
            Err(_) => EntityId::UInt(v),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(v) => write!(f, "{}", v),
            EntityId::UInt(v) => write!(f, "{}", v),
            EntityId::Text(v) => f.write_str(v),
        }
    }
}
