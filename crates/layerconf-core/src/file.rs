//! Config file discovery
//!
//! Either an explicit path is configured, or a base name is searched for in
//! each search directory with every registered extension.

use std::path::{Path, PathBuf};

use crate::codec::CodecRegistry;
use crate::error::{Error, Result};

/// Default base name searched for when no explicit file is set
pub const DEFAULT_CONFIG_NAME: &str = "config";

/// Where the config file lives and how to read it
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    /// Explicit file, bypassing the search
    pub file: Option<PathBuf>,
    /// Base name without extension
    pub name: String,
    /// Directories to search, in order
    pub paths: Vec<PathBuf>,
    /// Force a codec instead of using the file extension
    pub config_type: Option<String>,
}

impl Default for ConfigLocator {
    fn default() -> Self {
        Self {
            file: None,
            name: DEFAULT_CONFIG_NAME.to_string(),
            paths: Vec::new(),
            config_type: None,
        }
    }
}

impl ConfigLocator {
    /// Locate the file to read
    pub fn find(&self, codecs: &CodecRegistry) -> Result<PathBuf> {
        if let Some(file) = &self.file {
            return Ok(file.clone());
        }
        find_config_file(&self.name, &self.paths, codecs)
    }

    /// Codec extension for `path`: the forced type, else the file extension
    pub fn format_for(&self, path: &Path) -> Result<String> {
        if let Some(ty) = &self.config_type {
            return Ok(ty.clone());
        }
        extension_of(path)
    }
}

/// Lower-case extension of `path`
pub fn extension_of(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| {
            Error::unsupported_format("(none)", &[])
                .with_path(path.display().to_string())
                .with_help("Give the file an extension or call set_config_type()")
        })
}

/// Search `paths` for `name.<ext>` over every registered extension.
///
/// Directories are tried in order, and within a directory the extensions
/// in registration order; the first existing file wins.
pub fn find_config_file(name: &str, paths: &[PathBuf], codecs: &CodecRegistry) -> Result<PathBuf> {
    let extensions = codecs.extensions();
    for dir in paths {
        for ext in &extensions {
            let candidate = dir.join(format!("{}.{}", name, ext));
            if candidate.is_file() {
                log::debug!("found config file {}", candidate.display());
                return Ok(candidate);
            }
        }
    }
    let searched: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    Err(Error::config_file_not_found(name, &searched))
}
