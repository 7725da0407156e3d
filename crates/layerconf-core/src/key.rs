//! Key paths
//!
//! Keys are compared case-insensitively and addressed as delimiter-separated
//! segments. Every public entry point of the resolver normalizes its key
//! argument exactly once through [`normalize`].

use crate::value::{Mapping, Value};

/// Delimiter used between key segments unless configured otherwise
pub const DEFAULT_KEY_DELIMITER: &str = ".";

/// Lower-case a key. Nothing else is trimmed or rewritten.
pub fn normalize(key: &str) -> String {
    key.to_lowercase()
}

/// Split a key into its segments.
///
/// An empty key has no segments.
pub fn split<'a>(key: &'a str, delimiter: &str) -> Vec<&'a str> {
    if key.is_empty() {
        return Vec::new();
    }
    key.split(delimiter).collect()
}

/// Join segments back into a key
pub fn join<S: AsRef<str>>(segments: &[S], delimiter: &str) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push_str(delimiter);
        }
        out.push_str(segment.as_ref());
    }
    out
}

/// Append `key` under `prefix`, handling the root (empty) prefix
pub fn child(prefix: &str, key: &str, delimiter: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else if key.is_empty() {
        prefix.to_string()
    } else {
        format!("{}{}{}", prefix, delimiter, key)
    }
}

/// Recursively lower-case every key of a mapping.
///
/// Sequences are walked as well so mappings nested inside lists are
/// addressable the same way as top-level ones.
pub fn normalize_mapping(map: Mapping) -> Mapping {
    map.into_iter()
        .map(|(k, v)| (normalize(&k), normalize_value(v)))
        .collect()
}

/// Lower-case the keys of any mapping contained in `value`
pub fn normalize_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(normalize_mapping(map)),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(normalize_value).collect()),
        other => other,
    }
}

/// A normalized key split into segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// Parse and normalize a key
    pub fn parse(key: &str, delimiter: &str) -> Self {
        Self {
            segments: split(&normalize(key), delimiter)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// `self` followed by every segment of `rest`
    pub fn concat(&self, rest: &KeyPath) -> KeyPath {
        let mut segments = self.segments.clone();
        segments.extend(rest.segments.iter().cloned());
        Self { segments }
    }

    /// Whether `self` is a (non-strict) prefix of `other`
    pub fn is_prefix_of(&self, other: &KeyPath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Remove `prefix` from the front of the path
    pub fn strip_prefix(&self, prefix: &KeyPath) -> Option<KeyPath> {
        if !prefix.is_prefix_of(self) {
            return None;
        }
        Some(Self {
            segments: self.segments[prefix.len()..].to_vec(),
        })
    }

    /// Render with the given delimiter
    pub fn join(&self, delimiter: &str) -> String {
        join(&self.segments, delimiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_only_lowercases() {
        assert_eq!(normalize("Database.HOST"), "database.host");
        assert_eq!(normalize("  Spaced "), "  spaced ");
        assert_eq!(normalize(&normalize("MiXeD")), normalize("MiXeD"));
    }

    #[test]
    fn test_split_and_join() {
        assert_eq!(split("a.b.c", "."), vec!["a", "b", "c"]);
        assert_eq!(split("a::b", "::"), vec!["a", "b"]);
        assert!(split("", ".").is_empty());
        assert_eq!(join(&["a", "b", "c"], "."), "a.b.c");
        assert_eq!(join(&split("x.y", "."), "/"), "x/y");
    }

    #[test]
    fn test_child_handles_root() {
        assert_eq!(child("", "host", "."), "host");
        assert_eq!(child("db", "host", "."), "db.host");
        assert_eq!(child("db", "", "."), "db");
    }

    #[test]
    fn test_key_path_prefix_operations() {
        let full = KeyPath::parse("Clothing.Jacket.Price", ".");
        let prefix = KeyPath::parse("clothing", ".");

        assert_eq!(full.segments(), &["clothing", "jacket", "price"]);
        assert!(prefix.is_prefix_of(&full));
        assert!(!full.is_prefix_of(&prefix));
        assert_eq!(
            full.strip_prefix(&prefix).unwrap().join("."),
            "jacket.price"
        );
        assert!(full.strip_prefix(&KeyPath::parse("cloth", ".")).is_none());
        assert_eq!(
            prefix.concat(&KeyPath::parse("Hat/Brim", "/")).join("::"),
            "clothing::hat::brim"
        );
        assert!(KeyPath::parse("", ".").is_empty());
    }

    #[test]
    fn test_normalize_mapping_recurses() {
        let mut inner = IndexMap::new();
        inner.insert("Host".to_string(), Value::from("localhost"));
        let mut item = IndexMap::new();
        item.insert("NAME".to_string(), Value::from("a"));
        let mut map = IndexMap::new();
        map.insert("DataBase".to_string(), Value::Mapping(inner));
        map.insert(
            "Servers".to_string(),
            Value::Sequence(vec![Value::Mapping(item)]),
        );

        let normalized = normalize_mapping(map);
        assert!(normalized.contains_key("database"));
        assert!(normalized["database"].as_mapping().unwrap().contains_key("host"));
        let servers = normalized["servers"].as_sequence().unwrap();
        assert!(servers[0].as_mapping().unwrap().contains_key("name"));
    }
}
