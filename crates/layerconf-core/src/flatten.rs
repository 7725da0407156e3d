//! Flattening nested mappings into delimiter-joined keys, and back
//!
//! `flatten_and_merge` projects a nested mapping into a flat shadow map
//! keyed by normalized key paths. Layers are merged into the same shadow
//! in precedence order (highest first): once a key is present as a leaf,
//! anything a later layer nests under it is dropped.
//!
//! ```text
//! shadow = {}                      flatten {app: {name: "x"}}
//! shadow = {app.name: "x"}         flatten {app: {name: {first: "y"}}}
//! shadow = {app.name: "x"}         (app.name is a leaf, subtree dropped)
//! ```
//!
//! Within a single mapping, two entries that normalize to the same flat key
//! collide; the one visited later in the mapping's insertion order wins.

use crate::key;
use crate::value::{merge_mappings, Mapping, Value};

/// Flatten `nested` under `prefix` into `shadow`.
///
/// If `shadow` already holds a leaf at `prefix`, the whole subtree is
/// skipped. Nested mappings recurse; every other value is written at its
/// normalized full key.
pub fn flatten_and_merge(shadow: &mut Mapping, nested: &Mapping, prefix: &str, delimiter: &str) {
    if !prefix.is_empty() && shadow.contains_key(prefix) {
        return;
    }

    for (k, val) in nested {
        let full_key = key::child(prefix, &key::normalize(k), delimiter);
        match val {
            Value::Mapping(inner) => flatten_and_merge(shadow, inner, &full_key, delimiter),
            leaf => {
                shadow.insert(full_key, leaf.clone());
            }
        }
    }
}

/// Flatten a nested mapping into a fresh flat map
pub fn flatten(nested: &Mapping, delimiter: &str) -> Mapping {
    let mut shadow = Mapping::new();
    flatten_and_merge(&mut shadow, nested, "", delimiter);
    shadow
}

/// Merge already-flat keys into `shadow`.
///
/// A key is skipped when any of its proper prefixes is already a leaf in
/// `shadow`; this is the flat-map counterpart of the subtree check in
/// [`flatten_and_merge`].
pub fn merge_flat<I>(shadow: &mut Mapping, flat: I, delimiter: &str)
where
    I: IntoIterator<Item = (String, Value)>,
{
    'outer: for (k, val) in flat {
        let k = key::normalize(&k);
        let segments = key::split(&k, delimiter);
        for i in 1..segments.len() {
            let parent = key::join(&segments[..i], delimiter);
            if shadow.contains_key(&parent) {
                continue 'outer;
            }
        }
        shadow.insert(k, val);
    }
}

/// Rebuild a nested mapping from flat keys
pub fn unflatten<I>(flat: I, delimiter: &str) -> Mapping
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut root = Mapping::new();
    for (k, val) in flat {
        let segments = key::split(&k, delimiter);
        insert_path(&mut root, &segments, val);
    }
    root
}

/// Write `value` at `segments` inside `map`, creating intermediate mappings.
///
/// Leaves win over nested data regardless of insertion order: a leaf found
/// on the way down stops the insert, and a leaf written over an existing
/// mapping replaces it. Two mappings at the same spot are deep-merged.
/// Returns whether the value was written.
pub fn insert_path<S: AsRef<str>>(map: &mut Mapping, segments: &[S], value: Value) -> bool {
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.as_ref().to_string())
            .or_insert_with(|| Value::Mapping(Mapping::new()));
        match entry {
            Value::Mapping(inner) => current = inner,
            _ => return false,
        }
    }

    let last = last.as_ref();
    match value {
        Value::Mapping(incoming) if current.get(last).is_some_and(Value::is_mapping) => {
            if let Some(Value::Mapping(existing)) = current.get_mut(last) {
                merge_mappings(existing, incoming);
            }
        }
        value => {
            current.insert(last.to_string(), value);
        }
    }
    true
}
