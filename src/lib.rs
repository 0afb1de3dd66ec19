pub mod config;
pub mod redact;
pub mod tree;

pub use config::{Config, ConfigBuilder, ConfigError, TemplateError, Validate};
pub use redact::{redact, DefaultDetector, Redactor, SecretDetector};
pub use tree::{merge, merge_all, MergeError, Node, NodeId, NodeKind, Tag, Tree};
