//! Process-wide resolver
//!
//! Convenience for applications that want one configuration everywhere.
//! Nothing else in this crate touches it; libraries should take a
//! [`Resolver`] explicitly instead.

use std::sync::{Arc, OnceLock};

use crate::error::Result;
use crate::resolver::Resolver;
use crate::value::{Mapping, Value};

static INSTANCE: OnceLock<Arc<Resolver>> = OnceLock::new();

/// Get the process-wide resolver.
///
/// Created with default options on first use. It is an `Arc` so it can be
/// handed to [`Resolver::watch_config`].
pub fn instance() -> &'static Arc<Resolver> {
    INSTANCE.get_or_init(|| Arc::new(Resolver::new()))
}

pub fn get(key: &str) -> Option<Value> {
    instance().get(key)
}

pub fn set(key: &str, value: impl Into<Value>) {
    instance().set(key, value);
}

pub fn set_default(key: &str, value: impl Into<Value>) {
    instance().set_default(key, value);
}

pub fn is_set(key: &str) -> bool {
    instance().is_set(key)
}

pub fn register_alias(alias: &str, key: &str) -> Result<()> {
    instance().register_alias(alias, key)
}

pub fn all_keys() -> Vec<String> {
    instance().all_keys()
}

pub fn all_settings() -> Mapping {
    instance().all_settings()
}
