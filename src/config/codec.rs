//! TOML encoding and decoding of document trees.
//!
//! Tables become mappings, arrays become sequences and every other value a
//! tagged scalar. The root table is wrapped in a document node.

use serde::de::DeserializeOwned;
use serde::Serialize;
use toml::{Table, Value};

use super::ConfigError;
use crate::tree::{Node, NodeId, Tag, Tree};

/// Parses TOML text into a tree. `name` identifies the source in errors.
pub fn decode(name: &str, text: &str) -> Result<Tree, ConfigError> {
    let table: Table = toml::from_str(text).map_err(|source| ConfigError::ParseError {
        name: name.to_string(),
        source,
    })?;
    Ok(from_table(table))
}

/// Serializes a tree to TOML text.
pub fn encode(tree: &Tree) -> Result<String, ConfigError> {
    Ok(toml::to_string(&to_value(tree)?)?)
}

/// Builds a tree from any serializable value whose TOML form is a table.
pub fn from_typed<T: Serialize>(value: &T) -> Result<Tree, ConfigError> {
    match Value::try_from(value)? {
        Value::Table(table) => Ok(from_table(table)),
        _ => Err(ConfigError::Unrepresentable(".".to_string())),
    }
}

/// Deserializes a tree into the caller's type.
pub fn to_typed<T: DeserializeOwned>(tree: &Tree) -> Result<T, ConfigError> {
    to_value(tree)?
        .try_into()
        .map_err(ConfigError::DeserializeError)
}

pub fn from_table(table: Table) -> Tree {
    let mut tree = Tree::new();
    let root = push_value(&mut tree, Value::Table(table));
    tree.document(root);
    tree
}

fn push_value(tree: &mut Tree, value: Value) -> NodeId {
    let node = match value {
        Value::String(s) => Node::scalar(Tag::Str, s),
        Value::Integer(i) => Node::scalar(Tag::Int, i.to_string()),
        Value::Float(f) => Node::scalar(Tag::Float, f.to_string()),
        Value::Boolean(b) => Node::scalar(Tag::Bool, b.to_string()),
        Value::Datetime(dt) => Node::scalar(Tag::Timestamp, dt.to_string()),
        Value::Array(items) => Node::Sequence {
            items: items.into_iter().map(|item| push_value(tree, item)).collect(),
        },
        Value::Table(table) => Node::Mapping {
            entries: table
                .into_iter()
                .map(|(key, value)| {
                    let key = tree.string(key);
                    (key, push_value(tree, value))
                })
                .collect(),
        },
    };
    tree.push(node)
}

/// Converts the tree content to a TOML value, expanding aliases.
pub fn to_value(tree: &Tree) -> Result<Value, ConfigError> {
    match tree.content_root() {
        Some(root) => node_to_value(tree, root, &mut Vec::new(), &mut Vec::new()),
        None => Ok(Value::Table(Table::new())),
    }
}

fn node_to_value(
    tree: &Tree,
    id: NodeId,
    path: &mut Vec<String>,
    active: &mut Vec<NodeId>,
) -> Result<Value, ConfigError> {
    match tree.get(id) {
        None => Err(unrepresentable(path)),
        Some(Node::Document { root: None }) => Ok(Value::Table(Table::new())),
        Some(Node::Document { root: Some(root) }) => node_to_value(tree, *root, path, active),
        Some(Node::Mapping { entries }) => {
            let mut table = Table::new();
            for &(key, value) in entries {
                let name = tree
                    .scalar_text(key)
                    .ok_or_else(|| unrepresentable(path))?
                    .to_string();
                path.push(name.clone());
                let value = node_to_value(tree, value, path, active);
                path.pop();
                table.insert(name, value?);
            }
            Ok(Value::Table(table))
        }
        Some(Node::Sequence { items }) => items
            .iter()
            .map(|&item| node_to_value(tree, item, path, active))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Some(Node::Scalar { tag, value }) => {
            scalar_to_value(tag, value).ok_or_else(|| unrepresentable(path))
        }
        Some(Node::Alias { target }) => {
            if active.contains(target) {
                return Err(unrepresentable(path));
            }
            active.push(*target);
            let value = node_to_value(tree, *target, path, active);
            active.pop();
            value
        }
    }
}

fn scalar_to_value(tag: &Tag, text: &str) -> Option<Value> {
    match tag {
        Tag::Str | Tag::Custom(_) => Some(Value::String(text.to_string())),
        Tag::Int => text.parse().ok().map(Value::Integer),
        Tag::Float => text.parse().ok().map(Value::Float),
        Tag::Bool => text.parse().ok().map(Value::Boolean),
        Tag::Timestamp => text.parse().ok().map(Value::Datetime),
        Tag::Null => None,
    }
}

fn unrepresentable(path: &[String]) -> ConfigError {
    if path.is_empty() {
        ConfigError::Unrepresentable(".".to_string())
    } else {
        ConfigError::Unrepresentable(path.join("."))
    }
}
