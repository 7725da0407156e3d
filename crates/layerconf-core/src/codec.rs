//! Format codecs
//!
//! A codec turns raw bytes into a [`Mapping`] and back. Codecs know nothing
//! about layers or precedence; the resolver picks one by file extension or
//! explicit config type.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::value::{Mapping, Value};

/// A `bytes <-> mapping` transcoder
pub trait Codec: Send + Sync {
    /// Decode a document whose root must be a mapping
    fn decode(&self, bytes: &[u8]) -> Result<Mapping>;

    /// Encode a nested mapping
    fn encode(&self, map: &Mapping) -> Result<Vec<u8>>;
}

fn root_mapping(value: Value, format: &str) -> Result<Mapping> {
    match value {
        Value::Mapping(map) => Ok(map),
        // An empty document
        Value::Null => Ok(Mapping::new()),
        other => Err(Error::parse(format!(
            "{} document root must be a mapping, got {}",
            format,
            other.type_name()
        ))),
    }
}

/// YAML via serde_yaml
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Mapping> {
        let native: serde_yaml::Value =
            serde_yaml::from_slice(bytes).map_err(|e| Error::parse(e.to_string()))?;
        root_mapping(Value::from(native), "YAML")
    }

    fn encode(&self, map: &Mapping) -> Result<Vec<u8>> {
        serde_yaml::to_string(map)
            .map(String::into_bytes)
            .map_err(|e| Error::encode("YAML", e.to_string()))
    }
}

/// JSON via serde_json, pretty-printed on output
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Mapping> {
        let native: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| Error::parse(e.to_string()))?;
        root_mapping(Value::from(native), "JSON")
    }

    fn encode(&self, map: &Mapping) -> Result<Vec<u8>> {
        let mut out =
            serde_json::to_vec_pretty(map).map_err(|e| Error::encode("JSON", e.to_string()))?;
        out.push(b'\n');
        Ok(out)
    }
}

/// Codecs keyed by lower-case extension, in registration order
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: IndexMap<String, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            codecs: IndexMap::new(),
        }
    }

    /// A registry with the builtin YAML and JSON codecs
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("yaml", Arc::new(YamlCodec));
        registry.register("yml", Arc::new(YamlCodec));
        registry.register("json", Arc::new(JsonCodec));
        registry
    }

    /// Register (or replace) the codec for an extension
    pub fn register(&mut self, ext: &str, codec: Arc<dyn Codec>) {
        self.codecs.insert(ext.trim_start_matches('.').to_lowercase(), codec);
    }

    /// Look up a codec, failing with the list of known extensions
    pub fn get(&self, ext: &str) -> Result<Arc<dyn Codec>> {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.codecs
            .get(&ext)
            .cloned()
            .ok_or_else(|| Error::unsupported_format(ext, &self.extensions()))
    }

    pub fn contains(&self, ext: &str) -> bool {
        self.codecs
            .contains_key(&ext.trim_start_matches('.').to_lowercase())
    }

    /// Registered extensions in registration order
    pub fn extensions(&self) -> Vec<String> {
        self.codecs.keys().cloned().collect()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}
