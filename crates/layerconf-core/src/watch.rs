//! Live reload
//!
//! File changes are picked up with a debounced watcher on the config file's
//! directory; remote changes come from the provider's own stream. Both run
//! on a background thread that holds only a weak reference to the resolver,
//! so a watcher never keeps a dropped resolver alive.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};

use crate::error::{Error, Result};
use crate::resolver::Resolver;

/// Quiet period before a burst of file events triggers one reload
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Handle to a running file watcher; dropping it stops watching
pub struct ConfigWatcher {
    path: PathBuf,
    _debouncer: Debouncer<RecommendedWatcher>,
}

impl ConfigWatcher {
    /// The file being watched
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Handle to a remote watch thread.
///
/// Dropping it stops the thread at the next message from the provider.
#[derive(Debug)]
pub struct RemoteWatcher {
    provider: String,
    stop: Arc<AtomicBool>,
}

impl RemoteWatcher {
    pub fn provider(&self) -> &str {
        &self.provider
    }
}

impl Drop for RemoteWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Resolver {
    /// Reload the config file whenever it changes on disk.
    ///
    /// The file must have been read with `read_in_config` first. Failed
    /// reloads are logged and leave the previous settings in place.
    pub fn watch_config(self: &Arc<Self>) -> Result<ConfigWatcher> {
        self.watch_config_with(DEFAULT_DEBOUNCE)
    }

    /// [`Resolver::watch_config`] with a custom debounce period
    pub fn watch_config_with(self: &Arc<Self>, debounce: Duration) -> Result<ConfigWatcher> {
        let path = self.config_file_used().ok_or_else(|| {
            Error::watch("no config file has been read")
                .with_help("Call read_in_config() before watch_config()")
        })?;
        let file_name: OsString = path
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| Error::watch("config path has no file name").with_path(path.display().to_string()))?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(debounce, tx).map_err(|e| Error::watch(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| Error::watch(e.to_string()).with_path(dir.display().to_string()))?;
        log::debug!("watching {}", path.display());

        let resolver = Arc::downgrade(self);
        std::thread::Builder::new()
            .name("layerconf-watch".into())
            .spawn(move || {
                for result in rx {
                    match result {
                        Ok(events) => {
                            if !events
                                .iter()
                                .any(|e| e.path.file_name() == Some(file_name.as_os_str()))
                            {
                                continue;
                            }
                            let Some(resolver) = resolver.upgrade() else {
                                break;
                            };
                            if let Err(e) = resolver.reload_config() {
                                log::warn!("config reload failed, keeping previous settings: {}", e);
                            }
                        }
                        Err(e) => log::warn!("config watcher error: {}", e),
                    }
                }
                log::debug!("config watcher stopped");
            })
            .map_err(|e| Error::watch(e.to_string()))?;

        Ok(ConfigWatcher {
            path,
            _debouncer: debouncer,
        })
    }

    /// Apply every document the first remote provider streams.
    ///
    /// Documents that fail to decode are logged and skipped.
    pub fn watch_remote_config(self: &Arc<Self>) -> Result<RemoteWatcher> {
        let source = self
            .remote_sources()
            .into_iter()
            .next()
            .ok_or_else(Error::no_remote_providers)?;
        let rx = source.provider.watch(&source.path)?;
        let provider = source.provider.name().to_string();

        let stop = Arc::new(AtomicBool::new(false));
        let stopped = stop.clone();
        let resolver = Arc::downgrade(self);
        std::thread::Builder::new()
            .name("layerconf-remote-watch".into())
            .spawn(move || {
                for message in rx {
                    if stopped.load(Ordering::SeqCst) {
                        break;
                    }
                    let Some(resolver) = resolver.upgrade() else {
                        break;
                    };
                    let applied = message.and_then(|bytes| resolver.apply_remote(&source, &bytes));
                    if let Err(e) = applied {
                        log::warn!(
                            "skipping remote update from '{}': {}",
                            source.provider.name(),
                            e
                        );
                    }
                }
                log::debug!("remote watcher for {} stopped", source.path);
            })
            .map_err(|e| Error::watch(e.to_string()))?;

        Ok(RemoteWatcher { provider, stop })
    }
}
