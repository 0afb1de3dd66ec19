//! Syntax-independent document tree.
//!
//! A [`Tree`] owns all of its nodes in an arena and nodes refer to each other
//! by [`NodeId`]. An [`Node::Alias`] stores the id of its anchor target instead
//! of owning it, so every alias of one target observes the same node: masking
//! or replacing the target through the arena is visible through all aliases.

mod merge;

use std::collections::HashMap;
use std::fmt;

pub use merge::{merge, merge_all, MergeError};

/// Index of a node inside its owning [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Type marker of a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Null,
    Bool,
    Int,
    Float,
    Str,
    Timestamp,
    Custom(String),
}

impl Tag {
    pub fn as_str(&self) -> &str {
        match self {
            Tag::Null => "!!null",
            Tag::Bool => "!!bool",
            Tag::Int => "!!int",
            Tag::Float => "!!float",
            Tag::Str => "!!str",
            Tag::Timestamp => "!!timestamp",
            Tag::Custom(tag) => tag,
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a node, without its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Mapping,
    Sequence,
    Scalar,
    Alias,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Document => "document",
            NodeKind::Mapping => "mapping",
            NodeKind::Sequence => "sequence",
            NodeKind::Scalar => "scalar",
            NodeKind::Alias => "alias",
        };
        f.write_str(name)
    }
}

/// A single element of a document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Document root wrapper; `None` for a document without content.
    Document { root: Option<NodeId> },
    /// Ordered key/value pairs. Keys are nodes themselves, almost always scalars.
    Mapping { entries: Vec<(NodeId, NodeId)> },
    Sequence { items: Vec<NodeId> },
    /// Literal text of a scalar, not yet coerced to a native type.
    Scalar { tag: Tag, value: String },
    /// Non-owning reference to an anchored node of the same tree.
    Alias { target: NodeId },
}

impl Node {
    pub fn scalar(tag: Tag, value: impl Into<String>) -> Self {
        Node::Scalar {
            tag,
            value: value.into(),
        }
    }

    /// A `!!str` scalar.
    pub fn string(value: impl Into<String>) -> Self {
        Node::scalar(Tag::Str, value)
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Document { .. } => NodeKind::Document,
            Node::Mapping { .. } => NodeKind::Mapping,
            Node::Sequence { .. } => NodeKind::Sequence,
            Node::Scalar { .. } => NodeKind::Scalar,
            Node::Alias { .. } => NodeKind::Alias,
        }
    }

    /// Every node id referenced by this node, keys and alias targets included.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Node::Document { root } => root.iter().copied().collect(),
            Node::Mapping { entries } => entries.iter().flat_map(|&(k, v)| [k, v]).collect(),
            Node::Sequence { items } => items.clone(),
            Node::Scalar { .. } => Vec::new(),
            Node::Alias { target } => vec![*target],
        }
    }

    fn map_ids(self, f: impl Fn(NodeId) -> NodeId) -> Self {
        match self {
            Node::Document { root } => Node::Document { root: root.map(&f) },
            Node::Mapping { entries } => Node::Mapping {
                entries: entries.into_iter().map(|(k, v)| (f(k), f(v))).collect(),
            },
            Node::Sequence { items } => Node::Sequence {
                items: items.into_iter().map(&f).collect(),
            },
            scalar @ Node::Scalar { .. } => scalar,
            Node::Alias { target } => Node::Alias { target: f(target) },
        }
    }
}

/// Arena-backed document tree.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the arena without attaching it anywhere.
    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }

    /// Number of nodes in the arena, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn string(&mut self, value: impl Into<String>) -> NodeId {
        self.push(Node::string(value))
    }

    pub fn scalar(&mut self, tag: Tag, value: impl Into<String>) -> NodeId {
        self.push(Node::scalar(tag, value))
    }

    pub fn mapping(&mut self, entries: Vec<(NodeId, NodeId)>) -> NodeId {
        self.push(Node::Mapping { entries })
    }

    pub fn sequence(&mut self, items: Vec<NodeId>) -> NodeId {
        self.push(Node::Sequence { items })
    }

    pub fn alias(&mut self, target: NodeId) -> NodeId {
        self.push(Node::Alias { target })
    }

    /// Wraps `root` in a document node and makes that document the tree root.
    pub fn document(&mut self, root: NodeId) -> NodeId {
        let doc = self.push(Node::Document { root: Some(root) });
        self.root = Some(doc);
        doc
    }

    /// Follows alias chains until a non-alias node is reached.
    ///
    /// Returns `None` for dangling ids and alias cycles.
    pub fn resolve(&self, mut id: NodeId) -> Option<NodeId> {
        for _ in 0..=self.nodes.len() {
            match self.get(id)? {
                Node::Alias { target } => id = *target,
                _ => return Some(id),
            }
        }
        None
    }

    /// The content below the root document, or the root itself when it is not a document.
    pub fn content_root(&self) -> Option<NodeId> {
        let root = self.root?;
        match self.get(root)? {
            Node::Document { root } => *root,
            _ => Some(root),
        }
    }

    /// Text of a scalar, looking through aliases.
    pub fn scalar_text(&self, id: NodeId) -> Option<&str> {
        match self.get(self.resolve(id)?)? {
            Node::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Text of a mapping key: scalar text, or the rendered form of a complex key.
    ///
    /// Merging additionally compares scalar tags, so `1` and `"1"` stay distinct keys.
    pub fn key_text(&self, key: NodeId) -> String {
        match self.scalar_text(key) {
            Some(text) => text.to_string(),
            None => self.render(key),
        }
    }

    /// Value stored under `key` in `mapping`; the last occurrence wins.
    pub fn mapping_get(&self, mapping: NodeId, key: &str) -> Option<NodeId> {
        match self.get(self.resolve(mapping)?)? {
            Node::Mapping { entries } => entries
                .iter()
                .rev()
                .find(|(k, _)| self.scalar_text(*k) == Some(key))
                .map(|&(_, v)| v),
            _ => None,
        }
    }

    /// Walks mapping keys from the content root.
    pub fn lookup(&self, path: &[&str]) -> Option<NodeId> {
        let mut current = self.content_root()?;
        for key in path {
            current = self.mapping_get(current, key)?;
        }
        Some(current)
    }

    /// Compact flow-style rendering, mainly for diagnostics and tests.
    ///
    /// Aliases render as their target; an alias that re-enters its own target renders as `*`.
    pub fn render(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.render_into(id, &mut out, &mut Vec::new());
        out
    }

    fn render_into(&self, id: NodeId, out: &mut String, active: &mut Vec<NodeId>) {
        let Some(node) = self.get(id) else {
            out.push('?');
            return;
        };
        match node {
            Node::Document { root } => {
                if let Some(root) = root {
                    self.render_into(*root, out, active);
                }
            }
            Node::Mapping { entries } => {
                out.push('{');
                for (i, &(key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(key, out, active);
                    out.push_str(": ");
                    self.render_into(value, out, active);
                }
                out.push('}');
            }
            Node::Sequence { items } => {
                out.push('[');
                for (i, &item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render_into(item, out, active);
                }
                out.push(']');
            }
            Node::Scalar { value, .. } => out.push_str(value),
            Node::Alias { target } => {
                if active.contains(target) {
                    out.push('*');
                    return;
                }
                active.push(*target);
                self.render_into(*target, out, active);
                active.pop();
            }
        }
    }

    /// Moves all nodes of `other` into this arena and returns the relocated root of `other`.
    pub(crate) fn absorb(&mut self, other: Tree) -> Option<NodeId> {
        let offset = self.nodes.len();
        let shift = |id: NodeId| NodeId(id.0 + offset);
        self.nodes
            .extend(other.nodes.into_iter().map(|node| node.map_ids(shift)));
        other.root.map(shift)
    }

    /// Drops every node that is not reachable from the root.
    ///
    /// Ids are renumbered; ids obtained before compaction are invalid afterwards.
    pub fn compact(&mut self) {
        let Some(root) = self.root else {
            self.nodes.clear();
            return;
        };

        let mut remap: HashMap<NodeId, NodeId> = HashMap::new();
        let mut order = Vec::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if remap.contains_key(&id) {
                continue;
            }
            let Some(node) = self.get(id) else {
                continue;
            };
            remap.insert(id, NodeId(order.len()));
            order.push(id);
            stack.extend(node.children().into_iter().rev());
        }

        let relocate = |id: NodeId| remap.get(&id).copied().unwrap_or(id);
        self.nodes = order
            .iter()
            .map(|id| self.nodes[id.0].clone().map_ids(relocate))
            .collect();
        self.root = Some(relocate(root));
    }
}
