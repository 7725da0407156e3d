//! Typed access on top of `get`
//!
//! Anything that can resolve a key to a [`Value`] gets the typed getters for
//! free. Absent keys give the type's zero value; a present value that cannot
//! be coerced is an [`ErrorKind::TypeCoercion`](crate::ErrorKind) error.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;

use crate::decode;
use crate::error::{Error, Result};
use crate::value::{Mapping, Value};

/// Key lookup with typed getters
pub trait Lookup {
    /// Resolve `key`; `None` when no layer holds it
    fn get(&self, key: &str) -> Option<Value>;

    /// Whether `key` resolves to anything, defaults included
    fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Resolve and decode `key`, using `T::default()` when absent
    fn get_as<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        match self.get(key) {
            None => Ok(T::default()),
            Some(value) => coerce(key, value),
        }
    }

    fn get_string(&self, key: &str) -> Result<String> {
        self.get_as(key)
    }

    fn get_bool(&self, key: &str) -> Result<bool> {
        self.get_as(key)
    }

    fn get_i64(&self, key: &str) -> Result<i64> {
        self.get_as(key)
    }

    fn get_i32(&self, key: &str) -> Result<i32> {
        self.get_as(key)
    }

    fn get_u64(&self, key: &str) -> Result<u64> {
        self.get_as(key)
    }

    fn get_f64(&self, key: &str) -> Result<f64> {
        self.get_as(key)
    }

    fn get_string_vec(&self, key: &str) -> Result<Vec<String>> {
        self.get_as(key)
    }

    fn get_string_map(&self, key: &str) -> Result<IndexMap<String, String>> {
        self.get_as(key)
    }

    /// The raw mapping under `key`
    fn get_mapping(&self, key: &str) -> Result<Mapping> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(Mapping::new()),
            Some(Value::Mapping(map)) => Ok(map),
            Some(other) => Err(Error::type_coercion(
                key,
                "mapping",
                other.type_name(),
            )),
        }
    }

    /// Decode the value under `key` into `T`; an absent key decodes from null
    fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        coerce(key, self.get(key).unwrap_or_default())
    }
}

fn coerce<T: DeserializeOwned>(key: &str, value: Value) -> Result<T> {
    decode::from_value(value)
        .map_err(|e| Error::type_coercion(key, std::any::type_name::<T>(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Fixed table of flat keys
    struct Table(HashMap<&'static str, Value>);

    impl Lookup for Table {
        fn get(&self, key: &str) -> Option<Value> {
            self.0.get(key).cloned()
        }
    }

    fn table() -> Table {
        let mut m = HashMap::new();
        m.insert("port", Value::from("8080"));
        m.insert("debug", Value::from(false));
        m.insert("name", Value::Integer(7));
        m.insert("hosts", Value::from("a,b"));
        m.insert("bad", Value::from("not-a-number"));
        m.insert(
            "labels",
            Value::Mapping(
                [("team".to_string(), Value::from("core")), ("tier".to_string(), Value::Integer(1))]
                    .into_iter()
                    .collect(),
            ),
        );
        Table(m)
    }

    #[test]
    fn test_typed_getters_coerce() {
        let t = table();
        assert_eq!(t.get_i64("port").unwrap(), 8080);
        assert_eq!(t.get_u64("port").unwrap(), 8080);
        assert_eq!(t.get_string("name").unwrap(), "7");
        assert_eq!(t.get_string_vec("hosts").unwrap(), vec!["a", "b"]);
        assert!(!t.get_bool("debug").unwrap());

        let labels = t.get_string_map("labels").unwrap();
        assert_eq!(labels["tier"], "1");
    }

    #[test]
    fn test_absent_is_zero_value() {
        let t = table();
        assert_eq!(t.get_string("missing").unwrap(), "");
        assert_eq!(t.get_i32("missing").unwrap(), 0);
        assert_eq!(t.get_f64("missing").unwrap(), 0.0);
        assert!(t.get_string_vec("missing").unwrap().is_empty());
        assert!(t.get_mapping("missing").unwrap().is_empty());
        assert!(!t.is_set("missing"));
    }

    #[test]
    fn test_is_set_includes_zero_values() {
        assert!(table().is_set("debug"));
    }

    #[test]
    fn test_coercion_failure() {
        let err = table().get_i64("bad").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeCoercion);
        assert_eq!(err.path.as_deref(), Some("bad"));

        let err = table().get_mapping("port").unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeCoercion);
    }

    #[test]
    fn test_unmarshal_key_absent_decodes_null() {
        let v: Option<String> = table().unmarshal_key("missing").unwrap();
        assert_eq!(v, None);
    }
}
