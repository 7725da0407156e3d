//! Configuration value types
//!
//! Every layer stores [`Value`]s. Codecs convert their native document
//! model into this tagged representation at the boundary so the resolver,
//! the flattener and the decoder can match on it exhaustively. An absent
//! key is `Option::None`, never a `Value` variant.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered mapping of (normalized) keys to values
pub type Mapping = IndexMap<String, Value>;

/// A configuration value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[derive(Default)]
pub enum Value {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Sequence of values
    Sequence(Vec<Value>),
    /// Mapping of string keys to values
    Mapping(Mapping),
    /// Opaque binary blob (never produced by deserialization)
    Bytes(Vec<u8>),
}

impl Value {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if this value is a mapping
    pub fn is_mapping(&self) -> bool {
        matches!(self, Value::Mapping(_))
    }

    /// Anything that is not a mapping is a leaf for flattening purposes
    pub fn is_leaf(&self) -> bool {
        !self.is_mapping()
    }

    /// Get as boolean if this is a Bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Integer
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float or Integer
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as str if this is a String
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as slice if this is a Sequence
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Get as mapping if this is a Mapping
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Get as mutable mapping if this is a Mapping
    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Get as bytes if this is a Bytes blob
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Returns the type name of this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Sequence(_) => "sequence",
            Value::Mapping(_) => "mapping",
            Value::Bytes(_) => "bytes",
        }
    }

    /// Merge another value into this one
    ///
    /// - Mappings: deep merge recursively
    /// - Anything else (scalars, sequences, type mismatch): `other` replaces
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Mapping(base), Value::Mapping(overlay)) => merge_mappings(base, overlay),
            (this, other) => {
                *this = other;
            }
        }
    }
}

/// Deep-merge `overlay` into `base`; see [`Value::merge`]
pub fn merge_mappings(base: &mut Mapping, overlay: Mapping) {
    for (key, overlay_value) in overlay {
        if let Some(base_value) = base.get_mut(&key) {
            base_value.merge(overlay_value);
        } else {
            base.insert(key, overlay_value);
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Sequence(seq) => {
                write!(f, "[")?;
                for (i, v) in seq.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Mapping(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Sequence(v.into_iter().map(Into::into).collect())
    }
}

impl From<Mapping> for Value {
    fn from(m: Mapping) -> Self {
        Value::Mapping(m)
    }
}

impl From<serde_yaml::Value> for Value {
    fn from(v: serde_yaml::Value) -> Self {
        match v {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => number_value(n.as_i64(), n.as_u64(), n.as_f64()),
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(seq) => {
                Value::Sequence(seq.into_iter().map(Value::from).collect())
            }
            serde_yaml::Value::Mapping(map) => Value::Mapping(
                map.into_iter()
                    .map(|(k, v)| (yaml_key_string(k), Value::from(v)))
                    .collect(),
            ),
            serde_yaml::Value::Tagged(tagged) => Value::from(tagged.value),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => number_value(n.as_i64(), n.as_u64(), n.as_f64()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(seq) => {
                Value::Sequence(seq.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Mapping(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

fn number_value(i: Option<i64>, u: Option<u64>, f: Option<f64>) -> Value {
    if let Some(i) = i {
        Value::Integer(i)
    } else if let Some(u) = u {
        // Larger than i64::MAX
        Value::Float(u as f64)
    } else {
        Value::Float(f.unwrap_or(f64::NAN))
    }
}

/// Mapping keys of any scalar type become strings
fn yaml_key_string(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Null => "null".to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Tagged(tagged) => yaml_key_string(tagged.value),
        other => Value::from(other).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn mapping(pairs: Vec<(&str, Value)>) -> Value {
        Value::Mapping(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Integer(42).as_i64(), Some(42));
        assert_eq!(Value::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::Integer(42).as_f64(), Some(42.0));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2]).as_bytes(), Some(&[1u8, 2][..]));
    }

    #[test]
    fn test_leaf_classification() {
        assert!(Value::Null.is_leaf());
        assert!(Value::Sequence(vec![]).is_leaf());
        assert!(Value::Bytes(vec![]).is_leaf());
        assert!(!Value::Mapping(Mapping::new()).is_leaf());
    }

    #[test]
    fn test_merge_deep() {
        let mut base = mapping(vec![(
            "database",
            mapping(vec![
                ("host", Value::from("localhost")),
                ("port", Value::from(5432)),
            ]),
        )]);
        let overlay = mapping(vec![(
            "database",
            mapping(vec![("host", Value::from("prod-db"))]),
        )]);

        base.merge(overlay);

        let db = base.as_mapping().unwrap()["database"].as_mapping().unwrap();
        assert_eq!(db["host"], Value::from("prod-db"));
        assert_eq!(db["port"], Value::from(5432));
    }

    #[test]
    fn test_merge_sequence_replaces() {
        let mut base = mapping(vec![("servers", Value::from(vec!["a", "b"]))]);
        base.merge(mapping(vec![("servers", Value::from(vec!["c"]))]));

        assert_eq!(
            base.as_mapping().unwrap()["servers"],
            Value::from(vec!["c"])
        );
    }

    #[test]
    fn test_merge_type_mismatch_overlay_wins() {
        let mut base = mapping(vec![(
            "database",
            mapping(vec![("host", Value::from("localhost"))]),
        )]);
        base.merge(mapping(vec![("database", Value::from("conn-string"))]));

        assert_eq!(
            base.as_mapping().unwrap()["database"],
            Value::from("conn-string")
        );
    }

    #[test]
    fn test_from_yaml_stringifies_keys() {
        let yaml: serde_yaml::Value = serde_yaml::from_str("1: one\ntrue: yes\nname: x\n").unwrap();
        let value = Value::from(yaml);
        let map = value.as_mapping().unwrap();

        assert_eq!(map["1"], Value::from("one"));
        assert_eq!(map["true"], Value::from("yes"));
        assert_eq!(map["name"], Value::from("x"));
    }

    #[test]
    fn test_from_json_numbers() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"i": 3, "f": 1.5, "big": 18446744073709551615}"#).unwrap();
        let value = Value::from(json);
        let map = value.as_mapping().unwrap();

        assert_eq!(map["i"], Value::Integer(3));
        assert_eq!(map["f"], Value::Float(1.5));
        assert!(matches!(map["big"], Value::Float(_)));
    }

    #[test]
    fn test_display() {
        let v = mapping(vec![
            ("a", Value::from(1)),
            ("b", Value::from(vec!["x", "y"])),
        ]);
        assert_eq!(v.to_string(), "{a: 1, b: [x, y]}");
        assert_eq!(Value::Bytes(vec![0; 3]).to_string(), "<3 bytes>");
    }
}
