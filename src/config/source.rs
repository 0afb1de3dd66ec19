//! Configuration sources and how their text is obtained.

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::ConfigError;

/// One document in the overlay stack.
pub enum ConfigSource {
    File { path: PathBuf, required: bool },
    Text { name: String, text: String },
    Reader { name: String, reader: Box<dyn Read + Send> },
}

impl ConfigSource {
    /// Name used in logs and errors.
    pub fn name(&self) -> String {
        match self {
            ConfigSource::File { path, .. } => path.display().to_string(),
            ConfigSource::Text { name, .. } | ConfigSource::Reader { name, .. } => name.clone(),
        }
    }

    /// Reads the raw text of the source.
    ///
    /// Returns `Ok(None)` for an optional file that doesn't exist.
    pub fn read(self) -> Result<Option<String>, ConfigError> {
        match self {
            ConfigSource::File { path, required } => read_file(&path, required),
            ConfigSource::Text { text, .. } => Ok(Some(text)),
            ConfigSource::Reader { name, mut reader } => {
                let mut text = String::new();
                reader
                    .read_to_string(&mut text)
                    .map_err(|source| ConfigError::ReadError { name, source })?;
                Ok(Some(text))
            }
        }
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File { path, required } => f
                .debug_struct("File")
                .field("path", path)
                .field("required", required)
                .finish(),
            ConfigSource::Text { name, .. } => f.debug_struct("Text").field("name", name).finish(),
            ConfigSource::Reader { name, .. } => {
                f.debug_struct("Reader").field("name", name).finish()
            }
        }
    }
}

fn read_file(path: &Path, required: bool) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            if required {
                Err(ConfigError::FileNotFound(path.to_path_buf()))
            } else {
                warn!(path = %path.display(), "optional config file not found, skipping");
                Ok(None)
            }
        }
        Err(e) => Err(ConfigError::ReadError {
            name: path.display().to_string(),
            source: e,
        }),
    }
}
