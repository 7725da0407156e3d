//! Command-line flag bindings
//!
//! The resolver stores a handle to each bound flag and asks it for its value
//! on every lookup, so a flag parsed after binding is still seen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::value::Value;

/// A flag owned by some command-line parser
pub trait FlagValue: Send + Sync {
    /// Flag name as given on the command line
    fn name(&self) -> &str;

    /// Current value, whether parsed or defaulted
    fn value(&self) -> Value;

    /// Whether the user set the flag explicitly
    fn changed(&self) -> bool;

    /// Value the flag has when not given
    fn default_value(&self) -> Option<Value> {
        None
    }
}

/// A simple thread-safe flag
///
/// Useful for parsers without their own adapter and in tests.
#[derive(Debug)]
pub struct Flag {
    name: String,
    default: Value,
    value: RwLock<Value>,
    changed: AtomicBool,
}

impl Flag {
    /// A flag that has not been given, holding its default
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        let default = default.into();
        Self {
            name: name.into(),
            value: RwLock::new(default.clone()),
            default,
            changed: AtomicBool::new(false),
        }
    }

    /// A flag that was given explicitly with `value`
    pub fn explicit(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let flag = Self::new(name, Value::Null);
        flag.set(value);
        flag
    }

    /// Record an explicit value, marking the flag changed
    pub fn set(&self, value: impl Into<Value>) {
        let mut guard = self
            .value
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = value.into();
        self.changed.store(true, Ordering::SeqCst);
    }
}

impl FlagValue for Flag {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        self.value
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    fn changed(&self) -> bool {
        self.changed.load(Ordering::SeqCst)
    }

    fn default_value(&self) -> Option<Value> {
        Some(self.default.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_flag_is_unchanged() {
        let flag = Flag::new("port", 8080);
        assert!(!flag.changed());
        assert_eq!(flag.value(), Value::from(8080));
        assert_eq!(flag.default_value(), Some(Value::from(8080)));
    }

    #[test]
    fn test_set_marks_changed() {
        let flag = Flag::new("port", 8080);
        flag.set(9090);
        assert!(flag.changed());
        assert_eq!(flag.value(), Value::from(9090));
        assert_eq!(flag.default_value(), Some(Value::from(8080)));
    }

    #[test]
    fn test_explicit_constructor() {
        let flag = Flag::explicit("verbose", true);
        assert_eq!(flag.name(), "verbose");
        assert!(flag.changed());
        assert_eq!(flag.value(), Value::Bool(true));
    }
}
