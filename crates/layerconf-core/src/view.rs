//! Prefix-scoped views
//!
//! A [`View`] holds no state of its own. Every lookup is rewritten to
//! `prefix + delimiter + key` and answered by the parent resolver, so a
//! view always sees the resolver's current layers.

use serde::de::DeserializeOwned;

use crate::decode;
use crate::error::{Error, Result};
use crate::flatten::insert_path;
use crate::key::{self, KeyPath};
use crate::layers::Layer;
use crate::lookup::Lookup;
use crate::resolver::Resolver;
use crate::value::{Mapping, Value};

/// A lens over the keys under one prefix
#[derive(Debug, Clone)]
pub struct View<'a> {
    resolver: &'a Resolver,
    path: KeyPath,
    prefix: String,
}

impl<'a> View<'a> {
    pub(crate) fn new(resolver: &'a Resolver, prefix: &str) -> Self {
        Self::at(resolver, KeyPath::parse(prefix, resolver.key_delimiter()))
    }

    fn at(resolver: &'a Resolver, path: KeyPath) -> Self {
        let prefix = path.join(resolver.key_delimiter());
        Self {
            resolver,
            path,
            prefix,
        }
    }

    /// The full (normalized) prefix of this view
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn relative(&self, key: &str) -> KeyPath {
        KeyPath::parse(key, self.resolver.key_delimiter())
    }

    fn full_key(&self, key: &str) -> String {
        self.path
            .concat(&self.relative(key))
            .join(self.resolver.key_delimiter())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.resolver.get(&self.full_key(key))
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn source_of(&self, key: &str) -> Option<Layer> {
        self.resolver.source_of(&self.full_key(key))
    }

    /// A narrower view under `prefix`, relative to this one
    pub fn view(&self, prefix: &str) -> View<'a> {
        View::at(self.resolver, self.path.concat(&self.relative(prefix)))
    }

    /// The resolver's keys under this prefix, with the prefix stripped
    pub fn all_keys(&self) -> Vec<String> {
        let delimiter = self.resolver.key_delimiter();
        self.resolver
            .all_keys()
            .iter()
            .filter_map(|k| KeyPath::parse(k, delimiter).strip_prefix(&self.path))
            .filter(|rest| !rest.is_empty())
            .map(|rest| rest.join(delimiter))
            .collect()
    }

    /// Nested snapshot of every key under this prefix
    pub fn all_settings(&self) -> Mapping {
        let delimiter = self.resolver.key_delimiter();
        let mut root = Mapping::new();
        for k in self.all_keys() {
            if let Some(value) = self.get(&k) {
                insert_path(&mut root, &key::split(&k, delimiter), value);
            }
        }
        root
    }

    /// Decode everything under this prefix into `T`, merged across layers
    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T> {
        decode::from_value(Value::Mapping(self.all_settings())).map_err(|e| {
            let path = if self.prefix.is_empty() {
                "(root)"
            } else {
                self.prefix.as_str()
            };
            Error::type_coercion(path, std::any::type_name::<T>(), e.to_string())
        })
    }
}

impl Lookup for View<'_> {
    fn get(&self, key: &str) -> Option<Value> {
        View::get(self, key)
    }
}
