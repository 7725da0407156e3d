//! The resolver
//!
//! A [`Resolver`] owns six source layers and answers `get(key)` by probing
//! them in a fixed order:
//!
//! ```text
//! override > flag > env (bound) > env (automatic) > file > remote > default
//! ```
//!
//! Keys are lower-cased and passed through the alias table before any layer
//! is consulted. Every method takes `&self`; each layer sits behind its own
//! lock so a reload swaps one layer without blocking readers of the others.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::de::DeserializeOwned;

use crate::alias::{AliasPolicy, AliasTable, Registration};
use crate::codec::{Codec, CodecRegistry};
use crate::decode;
use crate::env::{EnvKeyReplacer, EnvOptions, EnvSource, ProcessEnv};
use crate::error::{Error, ErrorKind, Result};
use crate::file::{self, ConfigLocator};
use crate::flag::FlagValue;
use crate::flatten::{flatten_and_merge, insert_path, merge_flat};
use crate::key;
use crate::layers::{read, write, Layer, LayerHit, SourceLayers};
use crate::lookup::Lookup;
use crate::remote::{RemoteProvider, RemoteSource};
use crate::value::{Mapping, Value};
use crate::view::View;

/// Options fixed when a [`Resolver`] is created
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Separator between key segments
    pub key_delimiter: String,
    /// What to do with an alias that would form a cycle
    pub alias_policy: AliasPolicy,
    /// Fall back to an unchanged flag's default after the default layer
    pub flag_defaults: bool,
    /// Initial environment settings
    pub env: EnvOptions,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            key_delimiter: key::DEFAULT_KEY_DELIMITER.to_string(),
            alias_policy: AliasPolicy::default(),
            flag_defaults: false,
            env: EnvOptions::default(),
        }
    }
}

impl ResolverOptions {
    /// Set the key delimiter
    pub fn with_key_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.key_delimiter = delimiter.into();
        self
    }

    /// Set the circular alias policy
    pub fn with_alias_policy(mut self, policy: AliasPolicy) -> Self {
        self.alias_policy = policy;
        self
    }

    /// Consult unchanged flag defaults last
    pub fn with_flag_defaults(mut self, enabled: bool) -> Self {
        self.flag_defaults = enabled;
        self
    }

    /// Set the environment options
    pub fn with_env(mut self, env: EnvOptions) -> Self {
        self.env = env;
        self
    }
}

/// Something that changed underneath a running resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEvent {
    /// The config file was re-read
    FileReloaded(PathBuf),
    /// A remote provider delivered a new document
    RemoteUpdated { provider: String, path: String },
}

type ChangeCallback = Arc<dyn Fn(&ConfigEvent) + Send + Sync>;

/// Layered configuration resolver
pub struct Resolver {
    delimiter: String,
    alias_policy: AliasPolicy,
    flag_defaults: bool,
    env: RwLock<EnvOptions>,
    env_source: Arc<dyn EnvSource>,
    aliases: RwLock<AliasTable>,
    layers: SourceLayers,
    config_file: RwLock<ConfigLocator>,
    config_file_used: RwLock<Option<PathBuf>>,
    codecs: RwLock<CodecRegistry>,
    remotes: RwLock<Vec<RemoteSource>>,
    reload_lock: Mutex<()>,
    callbacks: RwLock<Vec<ChangeCallback>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// A resolver with default options reading the process environment
    pub fn new() -> Self {
        Self::with_options(ResolverOptions::default())
    }

    pub fn with_options(options: ResolverOptions) -> Self {
        let delimiter = if options.key_delimiter.is_empty() {
            log::warn!("empty key delimiter, using '{}'", key::DEFAULT_KEY_DELIMITER);
            key::DEFAULT_KEY_DELIMITER.to_string()
        } else {
            options.key_delimiter
        };
        Self {
            delimiter,
            alias_policy: options.alias_policy,
            flag_defaults: options.flag_defaults,
            env: RwLock::new(options.env),
            env_source: Arc::new(ProcessEnv),
            aliases: RwLock::new(AliasTable::new()),
            layers: SourceLayers::new(),
            config_file: RwLock::new(ConfigLocator::default()),
            config_file_used: RwLock::new(None),
            codecs: RwLock::new(CodecRegistry::with_builtins()),
            remotes: RwLock::new(Vec::new()),
            reload_lock: Mutex::new(()),
            callbacks: RwLock::new(Vec::new()),
        }
    }

    /// Read environment variables from `source` instead of the process
    pub fn with_env_source(mut self, source: Arc<dyn EnvSource>) -> Self {
        self.env_source = source;
        self
    }

    pub fn key_delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Normalize `key` and follow aliases to its canonical form
    fn canonical(&self, key: &str) -> String {
        read(&self.aliases).resolve(&key::normalize(key))
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    /// Resolve `key` across all layers; `None` if no layer holds it
    pub fn get(&self, key: &str) -> Option<Value> {
        self.find(key).map(|(_, value)| value)
    }

    /// Which layer answers for `key`
    pub fn source_of(&self, key: &str) -> Option<Layer> {
        self.find(key).map(|(layer, _)| layer)
    }

    /// Whether `key` resolves to anything.
    ///
    /// A key that only has a default is set, even if the default is a zero
    /// value like `false`.
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn find(&self, key: &str) -> Option<(Layer, Value)> {
        let canonical = self.canonical(key);
        let path = key::split(&canonical, &self.delimiter);
        if path.is_empty() {
            return None;
        }
        let d = self.delimiter.as_str();
        let env = read(&self.env);

        for layer in Layer::PRECEDENCE {
            let hit = match layer {
                Layer::Flag => self.layers.lookup_flag(&path, d),
                Layer::Env => {
                    match self.layers.lookup_env_bound(&path, d, &env, &*self.env_source) {
                        LayerHit::Missing if env.automatic => self.layers.lookup_env_automatic(
                            &path,
                            d,
                            &env,
                            &*self.env_source,
                        ),
                        other => other,
                    }
                }
                nested => self.layers.lookup_nested(nested, &path, d),
            };
            match hit {
                LayerHit::Found(value) => {
                    log::trace!("'{}' resolved from {} layer", canonical, layer);
                    return Some((layer, value));
                }
                LayerHit::Shadowed(prefix) => {
                    log::trace!(
                        "'{}' shadowed by leaf '{}' in {} layer",
                        canonical,
                        prefix,
                        layer
                    );
                    return None;
                }
                LayerHit::Missing => {}
            }
        }

        if self.flag_defaults {
            if let Some(value) = self.layers.flag_default(&canonical) {
                log::trace!("'{}' resolved from flag default", canonical);
                return Some((Layer::Flag, value));
            }
        }
        None
    }

    /// Every key known to any layer, sorted.
    ///
    /// Flag and env bindings count even when they currently resolve to
    /// nothing, and so does an alias target that no layer holds. A key
    /// nested under a leaf of a higher layer is left out.
    pub fn all_keys(&self) -> Vec<String> {
        let d = self.delimiter.as_str();
        let mut shadow = Mapping::new();

        flatten_and_merge(&mut shadow, &self.layers.snapshot(Layer::Override), "", d);
        merge_flat(
            &mut shadow,
            self.layers.flag_keys().into_iter().map(|k| (k, Value::Null)),
            d,
        );
        merge_flat(
            &mut shadow,
            self.layers.env_keys().into_iter().map(|k| (k, Value::Null)),
            d,
        );
        for layer in [Layer::File, Layer::Remote, Layer::Default] {
            flatten_and_merge(&mut shadow, &self.layers.snapshot(layer), "", d);
        }

        // A target naming a section is already covered by its children
        let alias_targets: Vec<String> = read(&self.aliases)
            .targets()
            .filter(|target| {
                let scope = format!("{}{}", target, d);
                !shadow.keys().any(|k| k == target || k.starts_with(&scope))
            })
            .collect();
        merge_flat(&mut shadow, alias_targets.into_iter().map(|k| (k, Value::Null)), d);

        let mut keys: Vec<String> = shadow.into_keys().collect();
        keys.sort();
        keys
    }

    /// Nested snapshot of every resolvable key
    pub fn all_settings(&self) -> Mapping {
        let mut root = Mapping::new();
        for k in self.all_keys() {
            if let Some(value) = self.get(&k) {
                insert_path(&mut root, &key::split(&k, &self.delimiter), value);
            }
        }
        root
    }

    /// Decode every setting into `T`
    pub fn unmarshal<T: DeserializeOwned>(&self) -> Result<T> {
        decode::from_value(Value::Mapping(self.all_settings())).map_err(|e| {
            Error::type_coercion("(root)", std::any::type_name::<T>(), e.to_string())
        })
    }

    /// A lens over the keys under `prefix`
    pub fn view(&self, prefix: &str) -> View<'_> {
        View::new(self, prefix)
    }

    // ---------------------------------------------------------------------
    // Layer mutation
    // ---------------------------------------------------------------------

    /// Set an override
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        self.set_in(Layer::Override, key, value.into());
    }

    /// Set a default
    pub fn set_default(&self, key: &str, value: impl Into<Value>) {
        self.set_in(Layer::Default, key, value.into());
    }

    fn set_in(&self, layer: Layer, key: &str, value: Value) {
        let canonical = self.canonical(key);
        let path = key::split(&canonical, &self.delimiter);
        if path.is_empty() {
            log::warn!("ignoring {} for empty key", layer);
            return;
        }
        self.layers.set(layer, &path, key::normalize_value(value));
    }

    /// Register `alias` as another name for `key`.
    ///
    /// The first registration moves any value stored under `alias` in each
    /// layer over to the canonical key. Registering it again for the same
    /// canonical key is a no-op; for a different key the alias is repointed
    /// without moving any values.
    pub fn register_alias(&self, alias: &str, key: &str) -> Result<()> {
        let alias = key::normalize(alias);
        let target = key::normalize(key);
        let mut aliases = write(&self.aliases);

        match aliases.check(&alias, &target) {
            Ok(Registration::Existing) => Ok(()),
            Ok(Registration::Retarget) => {
                log::debug!("repointing alias '{}' to '{}'", alias, target);
                aliases.insert(alias, target);
                Ok(())
            }
            Ok(Registration::New) => {
                let canonical = aliases.resolve(&target);
                self.layers.migrate(&alias, &canonical, &self.delimiter);
                aliases.insert(alias, target);
                Ok(())
            }
            Err(e) if e.kind == ErrorKind::AliasConflict && self.alias_policy == AliasPolicy::Warn => {
                log::warn!("ignoring alias '{}' -> '{}': {}", alias, target, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Whether `key` is a registered alias
    pub fn is_alias(&self, key: &str) -> bool {
        read(&self.aliases).is_alias(&key::normalize(key))
    }

    /// Bind a flag to `key`
    pub fn bind_flag(&self, key: &str, flag: Arc<dyn FlagValue>) -> Result<()> {
        if key.is_empty() {
            return Err(Error::invalid_key("cannot bind a flag to an empty key"));
        }
        self.layers.bind_flag(self.canonical(key), flag);
        Ok(())
    }

    /// Bind each flag under its own name
    pub fn bind_flags<I>(&self, flags: I) -> Result<()>
    where
        I: IntoIterator<Item = Arc<dyn FlagValue>>,
    {
        for flag in flags {
            let name = flag.name().to_string();
            self.bind_flag(&name, flag)?;
        }
        Ok(())
    }

    /// Bind environment variables to `key`, tried in order.
    ///
    /// With no names, binds the synthesized `PREFIX_KEY`.
    pub fn bind_env(&self, key: &str, names: &[&str]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::invalid_key("bind_env requires a key"));
        }
        let canonical = self.canonical(key);
        let names = if names.is_empty() {
            vec![read(&self.env).env_name(&canonical)]
        } else {
            names.iter().map(|n| n.to_string()).collect()
        };
        self.layers.bind_env(canonical, names);
        Ok(())
    }

    /// Prefix for synthesized variable names
    pub fn set_env_prefix(&self, prefix: &str) {
        write(&self.env).prefix = Some(prefix.to_string());
    }

    /// Check `PREFIX_KEY` on every lookup
    pub fn automatic_env(&self) {
        write(&self.env).automatic = true;
    }

    /// Treat set-but-empty variables as values
    pub fn allow_empty_env(&self, allow: bool) {
        write(&self.env).allow_empty = allow;
    }

    /// Rewrite variable names before lookup
    pub fn set_env_key_replacer(&self, replacer: EnvKeyReplacer) {
        write(&self.env).key_replacer = Some(replacer);
    }

    /// Drop every value, binding, alias and registration
    pub fn reset(&self) {
        self.layers.clear();
        write(&self.aliases).clear();
        *write(&self.env) = EnvOptions::default();
        *write(&self.config_file) = ConfigLocator::default();
        *write(&self.config_file_used) = None;
        *write(&self.codecs) = CodecRegistry::with_builtins();
        write(&self.remotes).clear();
        write(&self.callbacks).clear();
    }

    // ---------------------------------------------------------------------
    // Config file
    // ---------------------------------------------------------------------

    /// Use this file instead of searching
    pub fn set_config_file(&self, path: impl Into<PathBuf>) {
        write(&self.config_file).file = Some(path.into());
    }

    /// Base name to search for, without extension
    pub fn set_config_name(&self, name: &str) {
        let mut locator = write(&self.config_file);
        locator.name = name.to_string();
        locator.file = None;
    }

    /// Add a directory to search
    pub fn add_config_path(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        let mut locator = write(&self.config_file);
        if !locator.paths.contains(&dir) {
            locator.paths.push(dir);
        }
    }

    /// Decode with this codec regardless of file extension
    pub fn set_config_type(&self, ext: &str) {
        write(&self.config_file).config_type = Some(ext.to_lowercase());
    }

    /// Path of the last file read
    pub fn config_file_used(&self) -> Option<PathBuf> {
        read(&self.config_file_used).clone()
    }

    /// Register a codec for an extension
    pub fn register_codec(&self, ext: &str, codec: Arc<dyn Codec>) {
        write(&self.codecs).register(ext, codec);
    }

    fn codec(&self, format: &str) -> Result<Arc<dyn Codec>> {
        read(&self.codecs).get(format)
    }

    /// Locate, read and decode the config file without touching any layer
    fn load_config_file(&self) -> Result<(PathBuf, Mapping)> {
        let locator = read(&self.config_file).clone();
        let path = locator.find(&read(&self.codecs))?;
        let codec = self.codec(&locator.format_for(&path)?)?;
        let bytes = std::fs::read(&path).map_err(|e| Error::io(&path, &e))?;
        let map = codec
            .decode(&bytes)
            .map_err(|e| e.with_path(path.display().to_string()))?;
        Ok((path, key::normalize_mapping(map)))
    }

    fn decode_buffer(&self, bytes: &[u8]) -> Result<Mapping> {
        let config_type = read(&self.config_file).config_type.clone();
        let Some(format) = config_type else {
            return Err(Error::unsupported_format("(none)", &read(&self.codecs).extensions())
                .with_help("Call set_config_type() before reading from a buffer"));
        };
        let map = self.codec(&format)?.decode(bytes)?;
        Ok(key::normalize_mapping(map))
    }

    /// Read the config file, replacing the file layer.
    ///
    /// On any error the layer keeps its previous content.
    pub fn read_in_config(&self) -> Result<()> {
        let (path, map) = self.load_config_file()?;
        self.layers.replace(Layer::File, map);
        *write(&self.config_file_used) = Some(path);
        Ok(())
    }

    /// Read config from a buffer, replacing the file layer
    pub fn read_config(&self, bytes: &[u8]) -> Result<()> {
        let map = self.decode_buffer(bytes)?;
        self.layers.replace(Layer::File, map);
        Ok(())
    }

    /// Read the config file and deep-merge it into the file layer
    pub fn merge_in_config(&self) -> Result<()> {
        let (path, map) = self.load_config_file()?;
        self.layers.merge(Layer::File, map);
        *write(&self.config_file_used) = Some(path);
        Ok(())
    }

    /// Deep-merge config from a buffer into the file layer
    pub fn merge_config(&self, bytes: &[u8]) -> Result<()> {
        let map = self.decode_buffer(bytes)?;
        self.layers.merge(Layer::File, map);
        Ok(())
    }

    /// Deep-merge a mapping into the file layer
    pub fn merge_config_map(&self, map: Mapping) {
        self.layers.merge(Layer::File, key::normalize_mapping(map));
    }

    /// Whether the file layer holds `key`
    pub fn in_config(&self, key: &str) -> bool {
        let canonical = self.canonical(key);
        let path = key::split(&canonical, &self.delimiter);
        self.layers.contains(Layer::File, &path, &self.delimiter)
    }

    /// Re-read the config file and notify change callbacks.
    ///
    /// Concurrent reloads are serialized; a failed reload leaves the file
    /// layer as it was.
    pub fn reload_config(&self) -> Result<()> {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (path, map) = self.load_config_file()?;
        self.layers.replace(Layer::File, map);
        *write(&self.config_file_used) = Some(path.clone());
        log::debug!("reloaded {}", path.display());
        self.notify(&ConfigEvent::FileReloaded(path));
        Ok(())
    }

    /// Where `write_config` and `safe_write_config` write to
    fn write_target(&self) -> Result<PathBuf> {
        if let Some(path) = self.config_file_used() {
            return Ok(path);
        }
        let locator = read(&self.config_file);
        if let Some(file) = &locator.file {
            return Ok(file.clone());
        }
        match locator.paths.first() {
            Some(dir) => {
                let ext = locator.config_type.as_deref().unwrap_or("yaml");
                Ok(dir.join(format!("{}.{}", locator.name, ext)))
            }
            None => Err(Error::config_file_not_found(&locator.name, &[])
                .with_help("Call set_config_file() or add_config_path() before writing")),
        }
    }

    fn write_to(&self, path: &Path, overwrite: bool) -> Result<()> {
        if !overwrite && path.exists() {
            return Err(Error::config_file_already_exists(path));
        }
        let format = match file::extension_of(path) {
            Ok(ext) => ext,
            Err(e) => read(&self.config_file).config_type.clone().ok_or(e)?,
        };
        let bytes = self.codec(&format)?.encode(&self.all_settings())?;
        std::fs::write(path, bytes).map_err(|e| Error::io(path, &e))?;
        log::debug!("wrote settings to {}", path.display());
        Ok(())
    }

    /// Write all settings to the current config file, overwriting it
    pub fn write_config(&self) -> Result<()> {
        self.write_to(&self.write_target()?, true)
    }

    /// Write all settings to the current config file unless it exists
    pub fn safe_write_config(&self) -> Result<()> {
        self.write_to(&self.write_target()?, false)
    }

    /// Write all settings to `path`, overwriting it
    pub fn write_config_as(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_to(path.as_ref(), true)
    }

    /// Write all settings to `path` unless it exists
    pub fn safe_write_config_as(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_to(path.as_ref(), false)
    }

    // ---------------------------------------------------------------------
    // Remote
    // ---------------------------------------------------------------------

    /// Register a remote provider serving `path` in format `config_type`
    pub fn add_remote_provider(
        &self,
        provider: Arc<dyn RemoteProvider>,
        path: &str,
        config_type: &str,
    ) -> Result<()> {
        self.codec(config_type)?;
        write(&self.remotes).push(RemoteSource::new(provider, path, config_type));
        Ok(())
    }

    pub(crate) fn remote_sources(&self) -> Vec<RemoteSource> {
        read(&self.remotes).clone()
    }

    fn decode_remote(&self, source: &RemoteSource, bytes: &[u8]) -> Result<Mapping> {
        let map = self
            .codec(&source.config_type)?
            .decode(bytes)
            .map_err(|e| e.with_path(source.path.clone()))?;
        Ok(key::normalize_mapping(map))
    }

    /// Fetch from the first provider that answers, replacing the remote layer.
    ///
    /// If every provider fails the layer is untouched and the last error is
    /// returned.
    pub fn read_remote_config(&self) -> Result<()> {
        let sources = self.remote_sources();
        if sources.is_empty() {
            return Err(Error::no_remote_providers());
        }

        let mut last_err = None;
        for source in &sources {
            match source.fetch().and_then(|bytes| self.decode_remote(source, &bytes)) {
                Ok(map) => {
                    self.layers.replace(Layer::Remote, map);
                    log::debug!(
                        "read remote config from {} ({})",
                        source.path,
                        source.provider.name()
                    );
                    return Ok(());
                }
                Err(e) => {
                    log::warn!(
                        "remote provider '{}' failed for {}: {}",
                        source.provider.name(),
                        source.path,
                        e
                    );
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(Error::no_remote_providers))
    }

    /// Decode a pushed remote document and swap it in
    #[cfg_attr(not(feature = "watch"), allow(dead_code))]
    pub(crate) fn apply_remote(&self, source: &RemoteSource, bytes: &[u8]) -> Result<()> {
        let map = self.decode_remote(source, bytes)?;
        self.layers.replace(Layer::Remote, map);
        self.notify(&ConfigEvent::RemoteUpdated {
            provider: source.provider.name().to_string(),
            path: source.path.clone(),
        });
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Change notification
    // ---------------------------------------------------------------------

    /// Call `callback` after every successful reload
    pub fn on_config_change<F>(&self, callback: F)
    where
        F: Fn(&ConfigEvent) + Send + Sync + 'static,
    {
        write(&self.callbacks).push(Arc::new(callback));
    }

    fn notify(&self, event: &ConfigEvent) {
        let callbacks = read(&self.callbacks).clone();
        for callback in callbacks {
            callback(event);
        }
    }
}

impl Lookup for Resolver {
    fn get(&self, key: &str) -> Option<Value> {
        Resolver::get(self, key)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("delimiter", &self.delimiter)
            .field("alias_policy", &self.alias_policy)
            .field("aliases", &*read(&self.aliases))
            .field("layers", &self.layers)
            .field("config_file", &*read(&self.config_file))
            .finish_non_exhaustive()
    }
}
