//! The value tree every record's fields are made of.

use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A schemaless value: the unit a record's fields are built from.
///
/// Mirrors the usual JSON-ish tree (null/bool/number/string/array/object)
/// but keeps object field order, since chunk contents are expected to
/// round-trip byte-for-byte across a commit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl Value {
    #[must_use]
    pub fn object() -> Self {
        Self::Object(IndexMap::new())
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object_mut(&mut self) -> Option<&mut IndexMap<String, Value>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(field))
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        if let Some(map) = self.as_object_mut() {
            map.insert(field.into(), value);
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.as_object_mut().and_then(|map| map.shift_remove(field))
    }

    /// Matches the source's "skip falsy field values" rule used by
    /// `create_index`: null, false, zero, empty string/array/object are
    /// all falsy.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Array(items) => !items.is_empty(),
            Self::Object(map) => !map.is_empty(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

/// Manual impl: `Value` is used as a field-index key (§4.2 `create_index`),
/// which needs `Hash`. `f64` has no `Hash`, so floats hash via `to_bits`.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::String(s) => s.hash(state),
            Self::Array(items) => items.hash(state),
            Self::Object(map) => {
                for (k, v) in map {
                    k.hash(state);
                    v.hash(state);
                }
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy_rules() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(Value::String("x".into()).is_truthy());
    }

    #[test]
    fn test_value_as_hashmap_key() {
        use std::collections::HashMap;
        let mut map: HashMap<Value, &str> = HashMap::new();
        map.insert(Value::Int(42), "answer");
        map.insert(Value::String("k".into()), "string key");
        assert_eq!(map.get(&Value::Int(42)), Some(&"answer"));
    }

    #[test]
    fn test_object_field_access() {
        let mut obj = Value::object();
        obj.set("age", Value::Int(30));
        assert_eq!(obj.get("age"), Some(&Value::Int(30)));
        obj.remove("age");
        assert_eq!(obj.get("age"), None);
    }

    #[test]
    fn test_float_equality_via_bits() {
        assert_eq!(Value::Float(1.5), Value::Float(1.5));
        assert_ne!(Value::Float(f64::NAN), Value::Float(1.5));
    }
}
