use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::codec;
use super::loaded::SharedDetector;
use super::source::ConfigSource;
use super::template::Expander;
use super::{Config, ConfigError, Validate};
use crate::redact::{DefaultDetector, SecretDetector};
use crate::tree::{merge, Tree};

/// Builder for loading configuration from layered TOML documents.
///
/// Sources are merged in registration order: the first one is the base, every
/// later one is an overlay on top of everything before it. Mappings merge key
/// by key, arrays are concatenated and scalars are replaced, but an overlay
/// must keep the shape and scalar types of the base. A conflict anywhere
/// aborts the whole load.
///
/// ## Templates
///
/// Every source is expanded before parsing:
///
/// ```toml
/// [database]
/// host = "${env:DB_HOST:-localhost}"
/// password = "${arg:db-password}"
/// ```
///
/// Use `$$` to escape a literal `$` (e.g., `$${VAR}` becomes `${VAR}`).
///
/// ## Example
///
/// ```no_run
/// use cfg_overlay::Config;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct MyConfig {
///     name: String,
///     port: u16,
/// }
///
/// let config = Config::builder()
///     .with_file("config/default.toml", true)
///     .with_file("config/local.toml", false)
///     .build::<MyConfig>()?;
///
/// println!("{} on {}", config.get().name, config.get().port);
/// # Ok::<(), cfg_overlay::ConfigError>(())
/// ```
#[must_use = "builders do nothing until .build() is called"]
pub struct ConfigBuilder {
    sources: Vec<ConfigSource>,
    args: Option<Vec<String>>,
    detector: SharedDetector,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            args: None,
            detector: Arc::new(DefaultDetector),
        }
    }
}

impl fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigBuilder")
            .field("sources", &self.sources)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a TOML file to be loaded.
    ///
    /// If `required` is `true`, the build will fail if the file doesn't exist.
    /// Optional files that are missing are skipped.
    pub fn with_file(mut self, path: impl AsRef<Path>, required: bool) -> Self {
        self.sources.push(ConfigSource::File {
            path: path.as_ref().to_path_buf(),
            required,
        });
        self
    }

    /// Adds in-memory TOML text; `name` identifies it in errors.
    pub fn with_str(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Text {
            name: name.into(),
            text: text.into(),
        });
        self
    }

    /// Adds a reader that is drained when the configuration is built.
    pub fn with_reader(
        mut self,
        name: impl Into<String>,
        reader: impl Read + Send + 'static,
    ) -> Self {
        self.sources.push(ConfigSource::Reader {
            name: name.into(),
            reader: Box::new(reader),
        });
        self
    }

    /// Arguments visible to `${arg:...}` references. Defaults to the process arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Replaces the detector used for secret-hidden output.
    pub fn with_secret_detector(
        mut self,
        detector: impl SecretDetector + Send + Sync + 'static,
    ) -> Self {
        self.detector = Arc::new(detector);
        self
    }

    /// Loads, expands and merges all sources into one document tree.
    pub fn build_tree(self) -> Result<Tree, ConfigError> {
        let expander = self.expander();
        load(self.sources, &expander)
    }

    /// Builds the configuration by loading, merging and deserializing.
    pub fn build<T: DeserializeOwned>(self) -> Result<Config<T>, ConfigError> {
        let expander = self.expander();
        let tree = load(self.sources, &expander)?;
        let content = codec::to_typed(&tree)?;
        Ok(Config::new(content, self.detector))
    }

    /// Like [`build`](Self::build), then runs [`Validate::validate`] once.
    pub fn build_validated<T>(self) -> Result<Config<T>, ConfigError>
    where
        T: DeserializeOwned + Validate,
    {
        let config = self.build::<T>()?;
        config
            .get()
            .validate()
            .map_err(|e| ConfigError::Validation(Box::new(e)))?;
        Ok(config)
    }

    fn expander(&self) -> Expander {
        match &self.args {
            Some(args) => Expander::new(args.clone()),
            None => Expander::from_process(),
        }
    }
}

/// Folds the sources left to right into a single tree.
fn load(sources: Vec<ConfigSource>, expander: &Expander) -> Result<Tree, ConfigError> {
    let mut merged: Option<Tree> = None;
    let mut loaded = 0;

    for source in sources {
        let name = source.name();
        let Some(text) = source.read()? else {
            continue;
        };
        debug!(source = %name, "loading config source");

        let text = expander
            .expand(&text)
            .map_err(|source| ConfigError::TemplateError {
                name: name.clone(),
                source,
            })?;
        let tree = codec::decode(&name, &text)?;
        merged = Some(match merged {
            None => tree,
            Some(base) => merge(Some(base), Some(tree))
                .map_err(|source| ConfigError::MergeError { name, source })?,
        });
        loaded += 1;
    }

    debug!(sources = loaded, "merged config sources");
    merged.ok_or(ConfigError::NoSources)
}
