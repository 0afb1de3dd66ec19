//! Configuration loading, overlaying and secret-aware output.

mod builder;
pub(crate) mod codec;
mod error;
mod loaded;
mod source;
mod template;
mod validate;

pub use builder::ConfigBuilder;
pub use codec::{decode, encode};
pub use error::ConfigError;
pub use loaded::Config;
pub use source::ConfigSource;
pub use template::{Expander, TemplateError};
pub use validate::Validate;
