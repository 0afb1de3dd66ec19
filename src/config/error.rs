use std::path::PathBuf;
use thiserror::Error;

use super::TemplateError;
use crate::tree::MergeError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("no configuration sources could be loaded")]
    NoSources,

    #[error("required config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config source '{name}': {source}")]
    ReadError {
        name: String,
        source: std::io::Error,
    },

    #[error("failed to parse config source '{name}': {source}")]
    ParseError {
        name: String,
        source: toml::de::Error,
    },

    #[error("failed to merge config source '{name}': {source}")]
    MergeError { name: String, source: MergeError },

    #[error("failed to deserialize config: {0}")]
    DeserializeError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("failed to write config: {0}")]
    WriteError(#[source] std::io::Error),

    #[error("config failed validation: {0}")]
    Validation(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("value at '{0}' cannot be represented in TOML")]
    Unrepresentable(String),

    #[error("failed to expand config source '{name}': {source}")]
    TemplateError { name: String, source: TemplateError },
}
