//! Error types for layerconf
//!
//! Lookups never fail: a key missing from every layer is a valid outcome.
//! Errors are reserved for registering aliases, loading or writing a layer,
//! and coercing a resolved value into a concrete type.

use std::fmt;
use std::path::Path;

/// Result type alias for layerconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for layerconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Config key (or file path) the error relates to
    pub path: Option<String>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A codec could not decode layer content
    Parse,
    /// A codec could not encode the settings snapshot
    Encode,
    /// Alias registration would create a self-reference or cycle
    AliasConflict,
    /// A key was empty or otherwise unusable
    InvalidKey,
    /// No codec is registered for the requested format
    UnsupportedFormat,
    /// No config file could be located
    ConfigFileNotFound,
    /// Refused to overwrite an existing config file
    ConfigFileAlreadyExists,
    /// Remote key/value provider failure
    Remote(RemoteErrorKind),
    /// A resolved value could not be coerced to the requested type
    TypeCoercion,
    /// I/O error while reading or writing a file
    Io,
    /// The file watcher could not be started
    Watch,
    /// Internal error (bug in layerconf)
    Internal,
}

/// Specific remote provider error categories
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// `read_remote_config` was called without any registered provider
    NoProviders,
    /// The provider failed to return content for the path
    FetchFailed { provider: String, path: String },
    /// The provider cannot stream changes
    WatchUnsupported { provider: String },
}

impl Error {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            path: None,
            help: None,
            cause: None,
        }
    }

    /// Create a parse (decode) error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Parse)
        }
    }

    /// Create an encode error
    pub fn encode(format: impl Into<String>, message: impl Into<String>) -> Self {
        let format = format.into();
        Self {
            help: Some(format!(
                "The settings snapshot could not be represented as {}",
                format
            )),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Encode)
        }
    }

    /// Create a circular alias error
    pub fn circular_alias(alias: impl Into<String>, chain: Vec<String>) -> Self {
        Self {
            path: Some(alias.into()),
            help: Some("An alias must not point back to itself, directly or through other aliases".into()),
            cause: Some(format!("Chain: {}", chain.join(" → "))),
            ..Self::new(ErrorKind::AliasConflict)
        }
    }

    /// Create an invalid key error
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::InvalidKey)
        }
    }

    /// Create an unsupported format error
    pub fn unsupported_format(format: impl Into<String>, known: &[String]) -> Self {
        let format = format.into();
        let known_str = if known.is_empty() {
            "(none)".to_string()
        } else {
            known.join(", ")
        };
        Self {
            help: Some(format!(
                "Register a codec for '{}' or use one of: {}",
                format, known_str
            )),
            cause: Some(format!("Format: {}", format)),
            ..Self::new(ErrorKind::UnsupportedFormat)
        }
    }

    /// Create a config file not found error
    pub fn config_file_not_found(name: impl Into<String>, searched: &[String]) -> Self {
        let name = name.into();
        Self {
            path: Some(name.clone()),
            help: Some(format!(
                "Create '{}' with a supported extension in one of the search paths, or call set_config_file()",
                name
            )),
            cause: Some(format!("Searched: [{}]", searched.join(", "))),
            ..Self::new(ErrorKind::ConfigFileNotFound)
        }
    }

    /// Create a config file already exists error
    pub fn config_file_already_exists(path: &Path) -> Self {
        Self {
            path: Some(path.display().to_string()),
            help: Some("Use write_config_as() to overwrite an existing file".into()),
            ..Self::new(ErrorKind::ConfigFileAlreadyExists)
        }
    }

    /// Create an error for a remote read without providers
    pub fn no_remote_providers() -> Self {
        Self {
            help: Some("Register a provider with add_remote_provider() first".into()),
            ..Self::new(ErrorKind::Remote(RemoteErrorKind::NoProviders))
        }
    }

    /// Create a remote fetch failure
    pub fn remote_fetch(
        provider: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let provider = provider.into();
        let path = path.into();
        Self {
            path: Some(path.clone()),
            help: Some(format!(
                "Check that the '{}' provider is reachable and serves '{}'",
                provider, path
            )),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Remote(RemoteErrorKind::FetchFailed { provider, path }))
        }
    }

    /// Create an error for a provider that cannot watch
    pub fn remote_watch_unsupported(provider: impl Into<String>) -> Self {
        Self::new(ErrorKind::Remote(RemoteErrorKind::WatchUnsupported {
            provider: provider.into(),
        }))
    }

    /// Create a type coercion error
    pub fn type_coercion(
        path: impl Into<String>,
        expected: impl Into<String>,
        got: impl Into<String>,
    ) -> Self {
        Self {
            path: Some(path.into()),
            help: Some(format!(
                "Ensure the value can be converted to {}",
                expected.into()
            )),
            cause: Some(format!("Got: {}", got.into())),
            ..Self::new(ErrorKind::TypeCoercion)
        }
    }

    /// Create an I/O error for a file
    pub fn io(path: &Path, err: &std::io::Error) -> Self {
        Self {
            path: Some(path.display().to_string()),
            cause: Some(err.to_string()),
            ..Self::new(ErrorKind::Io)
        }
    }

    /// Create a watcher error
    pub fn watch(message: impl Into<String>) -> Self {
        Self {
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Watch)
        }
    }

    /// Create an internal error (bug in layerconf)
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            help: Some("This is likely a bug in layerconf. Please report it.".into()),
            cause: Some(message.into()),
            ..Self::new(ErrorKind::Internal)
        }
    }

    /// Add path context to the error
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::Encode => write!(f, "Encode error")?,
            ErrorKind::AliasConflict => write!(f, "Circular alias rejected")?,
            ErrorKind::InvalidKey => write!(f, "Invalid key")?,
            ErrorKind::UnsupportedFormat => write!(f, "Unsupported config format")?,
            ErrorKind::ConfigFileNotFound => write!(f, "Config file not found")?,
            ErrorKind::ConfigFileAlreadyExists => write!(f, "Config file already exists")?,
            ErrorKind::Remote(r) => match r {
                RemoteErrorKind::NoProviders => write!(f, "No remote providers registered")?,
                RemoteErrorKind::FetchFailed { provider, path } => {
                    write!(f, "Remote fetch failed: {} ({})", path, provider)?
                }
                RemoteErrorKind::WatchUnsupported { provider } => {
                    write!(f, "Remote provider '{}' does not support watching", provider)?
                }
            },
            ErrorKind::TypeCoercion => write!(f, "Type coercion failed")?,
            ErrorKind::Io => write!(f, "I/O error")?,
            ErrorKind::Watch => write!(f, "Watch error")?,
            ErrorKind::Internal => write!(f, "Internal error")?,
        }

        if let Some(path) = &self.path {
            write!(f, "\n  Path: {}", path)?;
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
