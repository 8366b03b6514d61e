//! Dynamically typed property values.
//!
//! Model properties are schema-typed, but the engine moves them through a
//! single [`Value`] enum: the property store holds `Value`s, the store
//! layer persists their canonical string form, and index/unique keys embed
//! that form directly.

use serde::{Deserialize, Serialize};

/// A property value.
///
/// The `storage_form` of a value is the exact string written to the hash
/// field, index key segment, and (lowercased for strings) unique lock key.
/// Two values are interchangeable for change tracking iff they compare
/// equal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Json(serde_json::Value),
}

impl Value {
    /// The canonical string form used for hash fields and key segments.
    pub fn storage_form(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Json(j) => j.to_string(),
        }
    }

    /// The comparison key for uniqueness: strings are lowercased
    /// (uniqueness is case-insensitive), every other type uses its
    /// canonical string form.
    pub fn unique_form(&self) -> String {
        match self {
            Value::String(s) => s.to_lowercase(),
            other => other.storage_form(),
        }
    }

    /// Numeric score for scored indexes, if this value is numeric.
    pub fn as_score(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// True for values exempt from unique locking (nothing to lock on).
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Null) || matches!(self, Value::String(s) if s.is_empty())
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.storage_form())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}
