//! Environment variable access
//!
//! The resolver never calls `std::env` directly; it reads through an
//! [`EnvSource`] so tests and embedders can supply synthetic variables.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Read access to a set of environment variables
pub trait EnvSource: Send + Sync {
    /// Look up a variable by its exact name
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed map of variables
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Rewrites an environment variable name before it is looked up,
/// e.g. mapping `.` to `_` so `db.host` reads `DB_HOST`.
#[derive(Clone)]
pub struct EnvKeyReplacer {
    transform: Arc<dyn Fn(&str) -> String + Send + Sync>,
}

impl EnvKeyReplacer {
    /// Replace each `from` substring with its `to`, applied in order
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        Self::from_fn(move |name| {
            pairs
                .iter()
                .fold(name.to_string(), |acc, (from, to)| acc.replace(from, to))
        })
    }

    /// Use an arbitrary transform
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            transform: Arc::new(f),
        }
    }

    pub fn replace(&self, name: &str) -> String {
        (self.transform)(name)
    }
}

impl fmt::Debug for EnvKeyReplacer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvKeyReplacer").finish_non_exhaustive()
    }
}

/// How environment variables participate in resolution
#[derive(Debug, Clone, Default)]
pub struct EnvOptions {
    /// Prefix prepended (with `_`) to synthesized variable names
    pub prefix: Option<String>,
    /// Check `PREFIX_KEY` for every lookup, even without a binding
    pub automatic: bool,
    /// Treat a set-but-empty variable as a value
    pub allow_empty: bool,
    /// Applied to every variable name before lookup
    pub key_replacer: Option<EnvKeyReplacer>,
}

impl EnvOptions {
    /// Set the variable prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Enable automatic env lookups
    pub fn with_automatic(mut self, automatic: bool) -> Self {
        self.automatic = automatic;
        self
    }

    /// Accept empty variables as values
    pub fn with_allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    /// Set the name replacer
    pub fn with_key_replacer(mut self, replacer: EnvKeyReplacer) -> Self {
        self.key_replacer = Some(replacer);
        self
    }

    /// Synthesize the variable name for a key: `PREFIX_KEY`, upper-cased
    pub fn env_name(&self, key: &str) -> String {
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{}_{}", prefix, key).to_uppercase(),
            _ => key.to_uppercase(),
        }
    }

    /// Read a variable, applying the replacer and the empty-value rule
    pub fn lookup(&self, source: &dyn EnvSource, name: &str) -> Option<String> {
        let name = match &self.key_replacer {
            Some(replacer) => replacer.replace(name),
            None => name.to_string(),
        };
        source
            .var(&name)
            .filter(|val| self.allow_empty || !val.is_empty())
    }
}
