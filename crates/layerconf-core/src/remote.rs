//! Remote key/value providers
//!
//! Transport is entirely the provider's business. The resolver hands it a
//! path, gets bytes back, and decodes them with the registered codec.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use crate::error::{Error, Result};

/// A remote store such as etcd or Consul
pub trait RemoteProvider: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Fetch the document stored at `path`
    fn fetch(&self, path: &str) -> Result<Vec<u8>>;

    /// Stream new versions of the document at `path`.
    ///
    /// Each message is a full document. The stream ends when the sender is
    /// dropped.
    fn watch(&self, path: &str) -> Result<Receiver<Result<Vec<u8>>>> {
        let _ = path;
        Err(Error::remote_watch_unsupported(self.name()))
    }
}

/// A provider registered together with its path and format
#[derive(Clone)]
pub struct RemoteSource {
    pub provider: Arc<dyn RemoteProvider>,
    pub path: String,
    /// Codec extension used to decode fetched bytes
    pub config_type: String,
}

impl RemoteSource {
    pub fn new(
        provider: Arc<dyn RemoteProvider>,
        path: impl Into<String>,
        config_type: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            path: path.into(),
            config_type: config_type.into(),
        }
    }

    /// Fetch, tagging failures with the provider and path
    pub fn fetch(&self) -> Result<Vec<u8>> {
        self.provider.fetch(&self.path).map_err(|e| {
            let cause = e.cause.clone().unwrap_or_else(|| e.to_string());
            Error::remote_fetch(self.provider.name(), &self.path, cause)
        })
    }
}

impl std::fmt::Debug for RemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSource")
            .field("provider", &self.provider.name())
            .field("path", &self.path)
            .field("config_type", &self.config_type)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, RemoteErrorKind};

    struct Failing;

    impl RemoteProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn fetch(&self, _path: &str) -> Result<Vec<u8>> {
            Err(Error::io(
                std::path::Path::new("/v1/kv"),
                &std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            ))
        }
    }

    #[test]
    fn test_fetch_error_names_provider_and_path() {
        let source = RemoteSource::new(Arc::new(Failing), "/config/app.json", "json");
        let err = source.fetch().unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::Remote(RemoteErrorKind::FetchFailed {
                provider: "failing".into(),
                path: "/config/app.json".into(),
            })
        );
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_watch_unsupported_by_default() {
        let err = Failing.watch("/config/app.json").err().unwrap();
        assert_eq!(
            err.kind,
            ErrorKind::Remote(RemoteErrorKind::WatchUnsupported {
                provider: "failing".into()
            })
        );
    }
}
