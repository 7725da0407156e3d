//! Alias redirection
//!
//! An alias is a directed edge `alias -> target`. Lookups follow edges until
//! they reach a key with no outgoing edge. Registration refuses edges that
//! would make an alias reach itself, and [`AliasTable::resolve`] carries its
//! own cycle guard so a corrupted table still terminates. Registering an
//! existing alias with a different target repoints the edge.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::{Error, Result};

/// What to do when an alias registration would create a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasPolicy {
    /// Return an `AliasConflict` error
    #[default]
    Reject,
    /// Log a warning and ignore the registration
    Warn,
}

/// Outcome of a successful check in [`AliasTable::check`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The alias is new and may be inserted
    New,
    /// The alias already resolves to the same key; nothing changes
    Existing,
    /// The alias exists but points elsewhere; its edge is replaced
    Retarget,
}

/// Table of alias edges, keyed by normalized alias name
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    edges: IndexMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow edges from `key` to its canonical key.
    ///
    /// Stops at the last key seen before a repeat if the table somehow
    /// contains a cycle.
    pub fn resolve(&self, key: &str) -> String {
        let mut current = key.to_string();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(current.clone());

        while let Some(next) = self.edges.get(&current) {
            if !seen.insert(next.clone()) {
                log::warn!("alias cycle detected while resolving '{}'", key);
                break;
            }
            current = next.clone();
        }
        current
    }

    /// The chain of keys visited while resolving `key`, including both ends
    pub fn chain(&self, key: &str) -> Vec<String> {
        let mut chain = vec![key.to_string()];
        let mut current = key.to_string();
        while let Some(next) = self.edges.get(&current) {
            if chain.contains(next) {
                break;
            }
            chain.push(next.clone());
            current = next.clone();
        }
        chain
    }

    /// Validate an `alias -> target` edge without inserting it.
    ///
    /// Both keys must already be normalized.
    pub fn check(&self, alias: &str, target: &str) -> Result<Registration> {
        if alias.is_empty() || target.is_empty() {
            return Err(Error::invalid_key("alias and target must not be empty"));
        }
        // The new edge closes a cycle iff the alias is reachable from the target
        let reachable = self.chain(target);
        if let Some(pos) = reachable.iter().position(|k| k == alias) {
            let mut chain = vec![alias.to_string()];
            chain.extend_from_slice(&reachable[..=pos]);
            return Err(Error::circular_alias(alias, chain));
        }
        match self.edges.get(alias) {
            Some(current) if self.resolve(current) == self.resolve(target) => {
                Ok(Registration::Existing)
            }
            Some(_) => Ok(Registration::Retarget),
            None => Ok(Registration::New),
        }
    }

    /// Insert or replace an edge previously accepted by [`AliasTable::check`]
    pub fn insert(&mut self, alias: String, target: String) {
        self.edges.insert(alias, target);
    }

    /// Whether `key` is a registered alias
    pub fn is_alias(&self, key: &str) -> bool {
        self.edges.contains_key(key)
    }

    /// Canonical targets of every alias
    pub fn targets(&self) -> impl Iterator<Item = String> + '_ {
        self.edges.keys().map(move |alias| self.resolve(alias))
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn table(edges: &[(&str, &str)]) -> AliasTable {
        let mut t = AliasTable::new();
        for (a, b) in edges {
            t.insert(a.to_string(), b.to_string());
        }
        t
    }

    #[test]
    fn test_resolve_follows_chain() {
        let t = table(&[("a", "b"), ("b", "c")]);
        assert_eq!(t.resolve("a"), "c");
        assert_eq!(t.resolve("b"), "c");
        assert_eq!(t.resolve("c"), "c");
        assert_eq!(t.resolve("unrelated"), "unrelated");
    }

    #[test]
    fn test_resolve_terminates_on_corrupt_cycle() {
        // Built directly, bypassing check()
        let t = table(&[("a", "b"), ("b", "a")]);
        assert_eq!(t.resolve("a"), "b");
        assert_eq!(t.resolve("b"), "a");
    }

    #[test]
    fn test_check_rejects_self_alias() {
        let t = AliasTable::new();
        let err = t.check("x", "x").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AliasConflict);
    }

    #[test]
    fn test_check_rejects_indirect_cycle() {
        let t = table(&[("a", "b"), ("b", "c")]);
        let err = t.check("c", "a").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AliasConflict);
        assert!(err.to_string().contains("c → a → b → c"));
    }

    #[test]
    fn test_check_existing_is_noop() {
        let t = table(&[("years", "age"), ("yrs", "years"), ("oldness", "age")]);
        assert_eq!(t.check("years", "age").unwrap(), Registration::Existing);
        // Same canonical key through another alias
        assert_eq!(t.check("years", "oldness").unwrap(), Registration::Existing);
        assert_eq!(t.check("how_old", "yrs").unwrap(), Registration::New);
    }

    #[test]
    fn test_check_different_target_retargets() {
        let t = table(&[("years", "age"), ("birth", "born")]);
        assert_eq!(t.check("years", "other").unwrap(), Registration::Retarget);
        assert_eq!(t.check("years", "birth").unwrap(), Registration::Retarget);
    }

    #[test]
    fn test_check_retarget_into_own_chain_is_cycle() {
        let t = table(&[("x", "a"), ("b", "x")]);
        let err = t.check("x", "b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AliasConflict);
        assert!(err.to_string().contains("x → b → x"));
    }

    #[test]
    fn test_insert_replaces_target() {
        let mut t = table(&[("years", "age")]);
        t.insert("years".into(), "other".into());
        assert_eq!(t.resolve("years"), "other");
    }

    #[test]
    fn test_targets_are_canonical() {
        let t = table(&[("yrs", "years"), ("years", "age")]);
        let targets: Vec<String> = t.targets().collect();
        assert_eq!(targets, vec!["age".to_string(), "age".to_string()]);
    }
}
