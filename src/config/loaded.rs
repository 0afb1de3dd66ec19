use std::fmt;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::{codec, ConfigBuilder, ConfigError};
use crate::redact::{redact, SecretDetector};

pub(crate) type SharedDetector = Arc<dyn SecretDetector + Send + Sync>;

/// A loaded configuration value of type `T`.
///
/// The value is deserialized once at build time; [`get`](Self::get) is a
/// plain reference. Output methods re-encode `T` into a fresh document tree,
/// so hiding secrets never touches the loaded value.
///
/// ## Example
///
/// ```
/// use cfg_overlay::Config;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Db {
///     user: String,
///     password: String,
/// }
///
/// let config = Config::builder()
///     .with_args(Vec::<String>::new())
///     .with_str("db", "user = \"app\"\npassword = \"hunter2\"")
///     .build::<Db>()?;
///
/// let mut out = Vec::new();
/// config.to_writer_secrets_hidden(&mut out)?;
/// assert_eq!(String::from_utf8(out).unwrap(), "user = \"app\"\npassword = \"*******\"\n");
/// # Ok::<(), cfg_overlay::ConfigError>(())
/// ```
#[derive(Clone)]
pub struct Config<T> {
    content: T,
    detector: SharedDetector,
}

impl Config<()> {
    /// Creates a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

impl<T> Config<T> {
    pub(crate) fn new(content: T, detector: SharedDetector) -> Self {
        Self { content, detector }
    }

    /// Returns a reference to the configuration.
    pub fn get(&self) -> &T {
        &self.content
    }

    pub fn into_inner(self) -> T {
        self.content
    }
}

impl<T: Serialize> Config<T> {
    /// Writes the configuration as TOML.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), ConfigError> {
        let tree = codec::from_typed(&self.content)?;
        write_text(writer, &codec::encode(&tree)?)
    }

    /// Writes the configuration to `path`, replacing an existing file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = codec::encode(&codec::from_typed(&self.content)?)?;
        std::fs::write(path, text).map_err(ConfigError::WriteError)
    }

    /// Writes the configuration with secrets hidden. A secret table or array
    /// is replaced by a single `"*"`:
    ///
    /// ```toml
    /// id = "id0"
    /// secrets = "*"
    /// ```
    pub fn to_writer_secrets_hidden<W: Write>(&self, writer: W) -> Result<(), ConfigError> {
        self.write_redacted(writer, true)
    }

    /// Writes the configuration with secrets hidden, keeping the shape of
    /// secret tables and arrays:
    ///
    /// ```toml
    /// id = "id0"
    /// secrets = ["*******", "*******"]
    /// ```
    pub fn to_writer_secrets_hidden_structured<W: Write>(
        &self,
        writer: W,
    ) -> Result<(), ConfigError> {
        self.write_redacted(writer, false)
    }

    fn write_redacted<W: Write>(
        &self,
        writer: W,
        collapse_structure: bool,
    ) -> Result<(), ConfigError> {
        let mut tree = codec::from_typed(&self.content)?;
        redact(Some(&mut tree), collapse_structure, self.detector.as_ref());
        write_text(writer, &codec::encode(&tree)?)
    }
}

impl<T: fmt::Debug> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("content", &self.content)
            .finish_non_exhaustive()
    }
}

fn write_text<W: Write>(mut writer: W, text: &str) -> Result<(), ConfigError> {
    writer
        .write_all(text.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(ConfigError::WriteError)
}
