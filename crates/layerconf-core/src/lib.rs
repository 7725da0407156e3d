//! layerconf-core: layered configuration resolution
//!
//! Values come from six layers: overrides, command-line flags, environment
//! variables, a config file, a remote key/value store and defaults. A
//! [`Resolver`] answers each lookup from the highest layer that holds the
//! key. Keys are case-insensitive, delimiter-separated paths, and aliases
//! redirect one key to another.
//!
//! # Example
//!
//! ```rust
//! use layerconf_core::{Lookup, Resolver, Value};
//!
//! let config = Resolver::new();
//! config.set_default("database.port", 5432);
//! config.set_config_type("yaml");
//! config.read_config(b"database:\n  host: localhost\n").unwrap();
//! config.set("database.port", 6543);
//!
//! assert_eq!(config.get("Database.Host"), Some(Value::from("localhost")));
//! assert_eq!(config.get_i64("database.port").unwrap(), 6543);
//!
//! let db = config.view("database");
//! assert_eq!(db.all_keys(), vec!["host", "port"]);
//! ```

pub mod alias;
pub mod codec;
pub mod decode;
pub mod env;
pub mod error;
pub mod file;
pub mod flag;
pub mod flatten;
pub mod global;
pub mod key;
pub mod layers;
pub mod lookup;
pub mod remote;
pub mod resolver;
pub mod value;
pub mod view;

#[cfg(feature = "watch")]
pub mod watch;

pub use alias::AliasPolicy;
pub use codec::{Codec, CodecRegistry, JsonCodec, YamlCodec};
pub use env::{EnvKeyReplacer, EnvOptions, EnvSource, MapEnv, ProcessEnv};
pub use error::{Error, ErrorKind, RemoteErrorKind, Result};
pub use flag::{Flag, FlagValue};
pub use layers::Layer;
pub use lookup::Lookup;
pub use remote::RemoteProvider;
pub use resolver::{ConfigEvent, Resolver, ResolverOptions};
pub use value::{Mapping, Value};
pub use view::View;

#[cfg(feature = "watch")]
pub use watch::{ConfigWatcher, RemoteWatcher};
