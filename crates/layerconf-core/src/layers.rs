//! Source layers
//!
//! Six independent stores, each behind its own lock. They are never merged
//! into one another; precedence exists only in the order the resolver
//! consults them. Override, file, remote and default layers hold nested
//! mappings. The flag and env layers hold bindings whose values are read
//! at lookup time.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use crate::env::{EnvOptions, EnvSource};
use crate::flag::FlagValue;
use crate::key;
use crate::value::{Mapping, Value};

/// One configuration source, in precedence order (highest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    /// Values set explicitly through the API
    Override,
    /// Bound command-line flags that were given
    Flag,
    /// Bound or automatic environment variables
    Env,
    /// The config file
    File,
    /// The remote key/value store
    Remote,
    /// Registered defaults
    Default,
}

impl Layer {
    /// All layers, highest precedence first
    pub const PRECEDENCE: [Layer; 6] = [
        Layer::Override,
        Layer::Flag,
        Layer::Env,
        Layer::File,
        Layer::Remote,
        Layer::Default,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Layer::Override => "override",
            Layer::Flag => "flag",
            Layer::Env => "env",
            Layer::File => "file",
            Layer::Remote => "remote",
            Layer::Default => "default",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of asking a single layer for a key
#[derive(Debug, Clone, PartialEq)]
pub enum LayerHit {
    /// The layer holds a value for the key
    Found(Value),
    /// A proper prefix of the key is a leaf in this layer
    Shadowed(String),
    /// Nothing here; fall through to the next layer
    Missing,
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Find `path` inside `map`.
///
/// At each level the longest literal key is tried first, so a key that
/// itself contains the delimiter is still reachable. Numeric segments
/// index into sequences.
pub fn search<'a>(map: &'a Mapping, path: &[&str], delimiter: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    for i in (1..=path.len()).rev() {
        let prefix = key::join(&path[..i], delimiter);
        if let Some(next) = map.get(&prefix) {
            if let Some(found) = search_value(next, &path[i..], delimiter) {
                return Some(found);
            }
        }
    }
    None
}

fn search_value<'a>(value: &'a Value, path: &[&str], delimiter: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    match value {
        Value::Mapping(map) => search(map, path, delimiter),
        Value::Sequence(seq) => {
            let idx: usize = path[0].parse().ok()?;
            search_value(seq.get(idx)?, &path[1..], delimiter)
        }
        _ => None,
    }
}

/// The first proper prefix of `path` that is a non-mapping value in `map`
pub fn shadowing_prefix(map: &Mapping, path: &[&str], delimiter: &str) -> Option<String> {
    for i in 1..path.len() {
        match search(map, &path[..i], delimiter) {
            None => return None,
            Some(Value::Mapping(_)) => continue,
            Some(_) => return Some(key::join(&path[..i], delimiter)),
        }
    }
    None
}

/// Look up `path` in a nested mapping
pub fn lookup_mapping(map: &Mapping, path: &[&str], delimiter: &str) -> LayerHit {
    if let Some(value) = search(map, path, delimiter) {
        return LayerHit::Found(value.clone());
    }
    match shadowing_prefix(map, path, delimiter) {
        Some(prefix) => LayerHit::Shadowed(prefix),
        None => LayerHit::Missing,
    }
}

/// Write `value` at `path`, creating intermediate mappings and replacing
/// any leaf that stands in the way
pub fn set_nested(map: &mut Mapping, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        if !entry.is_mapping() {
            *entry = Value::Mapping(Mapping::new());
        }
        match entry {
            Value::Mapping(inner) => current = inner,
            _ => return,
        }
    }
    current.insert(last.to_string(), value);
}

/// Remove and return the value at `path`, trying literal keys the same way
/// [`search`] does
pub fn remove_nested(map: &mut Mapping, path: &[&str], delimiter: &str) -> Option<Value> {
    if path.is_empty() {
        return None;
    }
    for i in (1..=path.len()).rev() {
        let prefix = key::join(&path[..i], delimiter);
        if i == path.len() {
            if let Some(value) = map.shift_remove(&prefix) {
                return Some(value);
            }
            continue;
        }
        if let Some(Value::Mapping(inner)) = map.get_mut(&prefix) {
            if let Some(value) = remove_nested(inner, &path[i..], delimiter) {
                return Some(value);
            }
        }
    }
    None
}

/// The six stores
#[derive(Default)]
pub struct SourceLayers {
    overrides: RwLock<Mapping>,
    flags: RwLock<IndexMap<String, Arc<dyn FlagValue>>>,
    env: RwLock<IndexMap<String, Vec<String>>>,
    file: RwLock<Mapping>,
    remote: RwLock<Mapping>,
    defaults: RwLock<Mapping>,
}

impl SourceLayers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock of a mapping-backed layer; `None` for flag and env
    fn mapping(&self, layer: Layer) -> Option<&RwLock<Mapping>> {
        match layer {
            Layer::Override => Some(&self.overrides),
            Layer::File => Some(&self.file),
            Layer::Remote => Some(&self.remote),
            Layer::Default => Some(&self.defaults),
            Layer::Flag | Layer::Env => None,
        }
    }

    /// Look up a mapping-backed layer
    pub fn lookup_nested(&self, layer: Layer, path: &[&str], delimiter: &str) -> LayerHit {
        match self.mapping(layer) {
            Some(lock) => lookup_mapping(&read(lock), path, delimiter),
            None => LayerHit::Missing,
        }
    }

    /// Look up the flag layer: only flags the user actually set count
    pub fn lookup_flag(&self, path: &[&str], delimiter: &str) -> LayerHit {
        let flags = read(&self.flags);
        let full = key::join(path, delimiter);
        if let Some(flag) = flags.get(&full) {
            if flag.changed() {
                return LayerHit::Found(flag.value());
            }
        }
        for i in 1..path.len() {
            let parent = key::join(&path[..i], delimiter);
            if flags.get(&parent).is_some_and(|f| f.changed()) {
                return LayerHit::Shadowed(parent);
            }
        }
        LayerHit::Missing
    }

    /// Default value of a bound flag, set or not
    pub fn flag_default(&self, key: &str) -> Option<Value> {
        read(&self.flags).get(key).and_then(|f| f.default_value())
    }

    /// Look up explicitly bound environment variables
    pub fn lookup_env_bound(
        &self,
        path: &[&str],
        delimiter: &str,
        opts: &EnvOptions,
        source: &dyn EnvSource,
    ) -> LayerHit {
        let bindings = read(&self.env);
        let lookup = |key: &str| -> Option<String> {
            bindings
                .get(key)?
                .iter()
                .find_map(|name| opts.lookup(source, name))
        };

        if let Some(val) = lookup(&key::join(path, delimiter)) {
            return LayerHit::Found(Value::String(val));
        }
        for i in 1..path.len() {
            let parent = key::join(&path[..i], delimiter);
            if lookup(&parent).is_some() {
                return LayerHit::Shadowed(parent);
            }
        }
        LayerHit::Missing
    }

    /// Look up `PREFIX_KEY` variables synthesized from the key itself
    pub fn lookup_env_automatic(
        &self,
        path: &[&str],
        delimiter: &str,
        opts: &EnvOptions,
        source: &dyn EnvSource,
    ) -> LayerHit {
        let lookup = |segments: &[&str]| -> Option<String> {
            opts.lookup(source, &opts.env_name(&key::join(segments, delimiter)))
        };

        if let Some(val) = lookup(path) {
            return LayerHit::Found(Value::String(val));
        }
        for i in 1..path.len() {
            if lookup(&path[..i]).is_some() {
                return LayerHit::Shadowed(key::join(&path[..i], delimiter));
            }
        }
        LayerHit::Missing
    }

    /// Replace a mapping-backed layer wholesale
    pub fn replace(&self, layer: Layer, map: Mapping) {
        if let Some(lock) = self.mapping(layer) {
            *write(lock) = map;
            log::debug!("replaced {} layer", layer);
        }
    }

    /// Deep-merge into a mapping-backed layer
    pub fn merge(&self, layer: Layer, map: Mapping) {
        if let Some(lock) = self.mapping(layer) {
            crate::value::merge_mappings(&mut write(lock), map);
        }
    }

    /// Set a nested value in a mapping-backed layer
    pub fn set(&self, layer: Layer, path: &[&str], value: Value) {
        if let Some(lock) = self.mapping(layer) {
            set_nested(&mut write(lock), path, value);
        }
    }

    /// Copy of a mapping-backed layer
    pub fn snapshot(&self, layer: Layer) -> Mapping {
        self.mapping(layer)
            .map(|lock| read(lock).clone())
            .unwrap_or_default()
    }

    /// Whether a mapping-backed layer holds `path`
    pub fn contains(&self, layer: Layer, path: &[&str], delimiter: &str) -> bool {
        self.mapping(layer)
            .is_some_and(|lock| search(&read(lock), path, delimiter).is_some())
    }

    pub fn bind_flag(&self, key: String, flag: Arc<dyn FlagValue>) {
        write(&self.flags).insert(key, flag);
    }

    pub fn bind_env(&self, key: String, names: Vec<String>) {
        write(&self.env).insert(key, names);
    }

    /// Keys that have a flag bound
    pub fn flag_keys(&self) -> Vec<String> {
        read(&self.flags).keys().cloned().collect()
    }

    /// Keys that have env variables bound
    pub fn env_keys(&self) -> Vec<String> {
        read(&self.env).keys().cloned().collect()
    }

    /// Move whatever `alias` holds in each layer over to `target`
    pub fn migrate(&self, alias: &str, target: &str, delimiter: &str) {
        let alias_path = key::split(alias, delimiter);
        let target_path = key::split(target, delimiter);

        for layer in [Layer::Override, Layer::File, Layer::Remote, Layer::Default] {
            if let Some(lock) = self.mapping(layer) {
                let mut map = write(lock);
                if let Some(value) = remove_nested(&mut map, &alias_path, delimiter) {
                    log::debug!("moved '{}' to '{}' in {} layer", alias, target, layer);
                    set_nested(&mut map, &target_path, value);
                }
            }
        }

        {
            let mut flags = write(&self.flags);
            if let Some(flag) = flags.shift_remove(alias) {
                flags.insert(target.to_string(), flag);
            }
        }
        let mut env = write(&self.env);
        if let Some(names) = env.shift_remove(alias) {
            env.insert(target.to_string(), names);
        }
    }

    /// Drop every value and binding
    pub fn clear(&self) {
        for layer in Layer::PRECEDENCE {
            if let Some(lock) = self.mapping(layer) {
                write(lock).clear();
            }
        }
        write(&self.flags).clear();
        write(&self.env).clear();
    }
}

impl fmt::Debug for SourceLayers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceLayers")
            .field("overrides", &*read(&self.overrides))
            .field("flags", &self.flag_keys())
            .field("env", &*read(&self.env))
            .field("file", &*read(&self.file))
            .field("remote", &*read(&self.remote))
            .field("defaults", &*read(&self.defaults))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnv;
    use crate::flag::Flag;
    use pretty_assertions::assert_eq;

    fn yaml(src: &str) -> Mapping {
        let v: serde_yaml::Value = serde_yaml::from_str(src).unwrap();
        match Value::from(v) {
            Value::Mapping(m) => m,
            other => panic!("not a mapping: {:?}", other),
        }
    }

    #[test]
    fn test_precedence_order() {
        assert_eq!(
            Layer::PRECEDENCE.iter().map(Layer::name).collect::<Vec<_>>(),
            vec!["override", "flag", "env", "file", "remote", "default"]
        );
    }

    #[test]
    fn test_search_nested_and_literal_keys() {
        let map = yaml("clothing:\n  jacket: leather\n\"a.b\": literal\n");
        assert_eq!(
            search(&map, &["clothing", "jacket"], "."),
            Some(&Value::from("leather"))
        );
        assert_eq!(search(&map, &["a", "b"], "."), Some(&Value::from("literal")));
        assert_eq!(search(&map, &["clothing", "hat"], "."), None);
    }

    #[test]
    fn test_search_sequence_index() {
        let map = yaml("servers:\n  - host: one\n  - host: two\n");
        assert_eq!(
            search(&map, &["servers", "1", "host"], "."),
            Some(&Value::from("two"))
        );
        assert_eq!(search(&map, &["servers", "x"], "."), None);
    }

    #[test]
    fn test_lookup_mapping_shadowed() {
        let map = yaml("clothing:\n  jacket: leather\n");
        assert_eq!(
            lookup_mapping(&map, &["clothing", "jacket", "price"], "."),
            LayerHit::Shadowed("clothing.jacket".into())
        );
        assert_eq!(
            lookup_mapping(&map, &["clothing", "pants"], "."),
            LayerHit::Missing
        );
    }

    #[test]
    fn test_set_nested_replaces_leaf_in_the_way() {
        let mut map = yaml("a: 1\n");
        set_nested(&mut map, &["a", "b"], Value::from(2));
        assert_eq!(search(&map, &["a", "b"], "."), Some(&Value::from(2)));
    }

    #[test]
    fn test_remove_nested() {
        let mut map = yaml("a:\n  b: 1\n  c: 2\n");
        assert_eq!(remove_nested(&mut map, &["a", "b"], "."), Some(Value::from(1)));
        assert_eq!(search(&map, &["a", "c"], "."), Some(&Value::from(2)));
        assert_eq!(remove_nested(&mut map, &["a", "zzz"], "."), None);
    }

    #[test]
    fn test_flag_lookup_requires_changed() {
        let layers = SourceLayers::new();
        let flag = Arc::new(Flag::new("port", 8080));
        layers.bind_flag("port".into(), flag.clone());

        assert_eq!(layers.lookup_flag(&["port"], "."), LayerHit::Missing);
        assert_eq!(layers.flag_default("port"), Some(Value::from(8080)));

        flag.set(9090);
        assert_eq!(layers.lookup_flag(&["port"], "."), LayerHit::Found(Value::from(9090)));
    }

    #[test]
    fn test_env_bound_lookup_tries_names_in_order() {
        let layers = SourceLayers::new();
        layers.bind_env("id".into(), vec!["APP_ID".into(), "ID".into()]);
        let opts = EnvOptions::default();

        let env = MapEnv::new().with("ID", "13");
        assert_eq!(
            layers.lookup_env_bound(&["id"], ".", &opts, &env),
            LayerHit::Found(Value::from("13"))
        );

        let env = MapEnv::new().with("ID", "13").with("APP_ID", "7");
        assert_eq!(
            layers.lookup_env_bound(&["id"], ".", &opts, &env),
            LayerHit::Found(Value::from("7"))
        );
    }

    #[test]
    fn test_automatic_env_shadowing() {
        let layers = SourceLayers::new();
        let opts = EnvOptions::default().with_prefix("app").with_automatic(true);
        let env = MapEnv::new().with("APP_CLOTHING", "none");

        assert_eq!(
            layers.lookup_env_automatic(&["clothing"], ".", &opts, &env),
            LayerHit::Found(Value::from("none"))
        );
        assert_eq!(
            layers.lookup_env_automatic(&["clothing", "jacket"], ".", &opts, &env),
            LayerHit::Shadowed("clothing".into())
        );
    }

    #[test]
    fn test_migrate_moves_values_and_bindings() {
        let layers = SourceLayers::new();
        layers.set(Layer::Default, &["years"], Value::from(40));
        layers.bind_env("years".into(), vec!["YEARS".into()]);

        layers.migrate("years", "age", ".");

        assert!(!layers.contains(Layer::Default, &["years"], "."));
        assert_eq!(
            layers.lookup_nested(Layer::Default, &["age"], "."),
            LayerHit::Found(Value::from(40))
        );
        assert_eq!(layers.env_keys(), vec!["age".to_string()]);
    }

    #[test]
    fn test_replace_is_wholesale() {
        let layers = SourceLayers::new();
        layers.replace(Layer::File, yaml("a: 1\nb: 2\n"));
        layers.replace(Layer::File, yaml("c: 3\n"));

        assert!(!layers.contains(Layer::File, &["a"], "."));
        assert!(layers.contains(Layer::File, &["c"], "."));
    }
}
