//! clap adapter for flag bindings
//!
//! Snapshots each argument of a parsed [`ArgMatches`] into a [`ClapFlag`]
//! so it can be bound into a [`Resolver`] like any other flag.

use std::sync::Arc;

use clap::parser::ValueSource;
use clap::ArgMatches;
use layerconf_core::{FlagValue, Resolver, Result, Value};

/// One parsed clap argument
#[derive(Debug, Clone)]
pub struct ClapFlag {
    name: String,
    value: Value,
    changed: bool,
    default: Option<Value>,
}

impl ClapFlag {
    /// Snapshot argument `id`, or `None` if it has no values
    pub fn from_matches(matches: &ArgMatches, id: &str) -> Option<Self> {
        let raw = matches.try_get_raw(id).ok()??;
        let mut values: Vec<Value> = raw
            .map(|v| parse_scalar(&v.to_string_lossy()))
            .collect();
        let value = match values.len() {
            0 => return None,
            1 => values.remove(0),
            _ => Value::Sequence(values),
        };
        let source = matches.value_source(id);
        let changed = source == Some(ValueSource::CommandLine);
        let default = (source == Some(ValueSource::DefaultValue)).then(|| value.clone());
        Some(Self {
            name: id.to_string(),
            value,
            changed,
            default,
        })
    }
}

impl FlagValue for ClapFlag {
    fn name(&self) -> &str {
        &self.name
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn changed(&self) -> bool {
        self.changed
    }

    fn default_value(&self) -> Option<Value> {
        self.default.clone()
    }
}

/// Bind every valued argument in `matches` under its own id
pub fn bind_arg_matches(resolver: &Resolver, matches: &ArgMatches) -> Result<()> {
    let flags: Vec<Arc<dyn FlagValue>> = matches
        .ids()
        .filter_map(|id| ClapFlag::from_matches(matches, id.as_str()))
        .map(|flag| Arc::new(flag) as Arc<dyn FlagValue>)
        .collect();
    resolver.bind_flags(flags)
}

/// Parse a command-line value as a YAML scalar, falling back to a string
pub fn parse_scalar(raw: &str) -> Value {
    match serde_yaml::from_str::<serde_yaml::Value>(raw) {
        Ok(v @ (serde_yaml::Value::Bool(_) | serde_yaml::Value::Number(_))) => Value::from(v),
        _ => Value::String(raw.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{Arg, ArgAction, Command};
    use layerconf_core::Layer;

    fn command() -> Command {
        Command::new("app")
            .arg(Arg::new("port").long("port").default_value("8080"))
            .arg(Arg::new("host").long("host"))
            .arg(Arg::new("verbose").long("verbose").action(ArgAction::SetTrue))
    }

    #[test]
    fn test_changed_only_from_command_line() {
        let matches = command().try_get_matches_from(["app", "--host", "db"]).unwrap();

        let host = ClapFlag::from_matches(&matches, "host").unwrap();
        assert!(host.changed());
        assert_eq!(host.value(), Value::from("db"));

        let port = ClapFlag::from_matches(&matches, "port").unwrap();
        assert!(!port.changed());
        assert_eq!(port.default_value(), Some(Value::from(8080)));
    }

    #[test]
    fn test_bind_arg_matches() {
        let matches = command()
            .try_get_matches_from(["app", "--port", "9090", "--verbose"])
            .unwrap();
        let r = Resolver::new();
        r.set_default("host", "localhost");
        bind_arg_matches(&r, &matches).unwrap();

        assert_eq!(r.get("port"), Some(Value::from(9090)));
        assert_eq!(r.source_of("port"), Some(Layer::Flag));
        assert_eq!(r.get("verbose"), Some(Value::Bool(true)));
        // Absent flag leaves lower layers alone
        assert_eq!(r.get("host"), Some(Value::from("localhost")));
    }

    #[test]
    fn test_parse_scalar() {
        assert_eq!(parse_scalar("42"), Value::from(42));
        assert_eq!(parse_scalar("true"), Value::Bool(true));
        assert_eq!(parse_scalar("1.5"), Value::Float(1.5));
        assert_eq!(parse_scalar("hello"), Value::from("hello"));
        assert_eq!(parse_scalar("[a, b]"), Value::from("[a, b]"));
        assert_eq!(parse_scalar(""), Value::from(""));
    }
}
