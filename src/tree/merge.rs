//! Overlay merge of document trees.
//!
//! Merge rules, by node kind:
//! - Documents: merge their root contents
//! - Mappings: deep-merge by key (tag and text), base key order first, then overlay-only keys
//! - Sequences: concatenate (base items, then overlay items)
//! - Scalars: overlay wins, but only between equal tags
//! - Aliases: merge the referenced targets; an anchor reached both from its
//!   definition and through aliases is merged once and stays shared
//!
//! Any kind mismatch is an error; nothing is coerced.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use super::{Node, NodeId, NodeKind, Tag, Tree};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MergeError {
    #[error("cannot merge a missing tree or node")]
    MissingOperand,

    #[error("cannot merge {left} with {right}")]
    KindMismatch { left: NodeKind, right: NodeKind },

    #[error("cannot merge {left} with {right} at '{path}'")]
    NestedKindMismatch {
        path: String,
        left: NodeKind,
        right: NodeKind,
    },

    #[error("cannot overlay {right} scalar on {left} scalar at '{path}'")]
    ScalarTagMismatch { path: String, left: Tag, right: Tag },

    #[error("document has no root content")]
    EmptyDocument,
}

/// Merges `overlay` on top of `base`.
///
/// Both trees are consumed; the result reuses their nodes. On error no tree is returned.
pub fn merge(base: Option<Tree>, overlay: Option<Tree>) -> Result<Tree, MergeError> {
    let (Some(mut tree), Some(overlay)) = (base, overlay) else {
        return Err(MergeError::MissingOperand);
    };

    let left = tree.root().ok_or(MergeError::MissingOperand)?;
    let right = tree.absorb(overlay).ok_or(MergeError::MissingOperand)?;

    let merged = tree.merge_nodes(left, right)?;
    tree.set_root(merged);
    tree.compact();
    Ok(tree)
}

/// Folds `trees` left to right: every tree is an overlay on the result of all earlier ones.
pub fn merge_all<I>(trees: I) -> Result<Tree, MergeError>
where
    I: IntoIterator<Item = Tree>,
{
    let mut trees = trees.into_iter();
    let base = trees.next().ok_or(MergeError::MissingOperand)?;

    trees
        .enumerate()
        .try_fold(base, |merged, (index, overlay)| {
            debug!(overlay = index + 1, "merging overlay document");
            merge(Some(merged), Some(overlay))
        })
}

impl Tree {
    /// Merges node `overlay` on top of node `base`, both living in this arena.
    ///
    /// Returns the id of the merged node. Nodes present on only one side are
    /// reused as they are. Unused nodes stay in the arena until [`Tree::compact`].
    pub fn merge_nodes(&mut self, base: NodeId, overlay: NodeId) -> Result<NodeId, MergeError> {
        Merger {
            tree: self,
            merged: HashMap::new(),
        }
        .merge(base, overlay, &mut Vec::new())
    }
}

/// Identity of a mapping key: the scalar tag (if any) and the key text.
type KeyId = (Option<Tag>, String);

struct Merger<'t> {
    tree: &'t mut Tree,
    /// Result per `(base, overlay)` pair. An anchor reached from its definition
    /// and through aliases merges once, so every path ends at the same node.
    merged: HashMap<(NodeId, NodeId), NodeId>,
}

impl Merger<'_> {
    fn merge(
        &mut self,
        base: NodeId,
        overlay: NodeId,
        path: &mut Vec<String>,
    ) -> Result<NodeId, MergeError> {
        if let Some(&merged) = self.merged.get(&(base, overlay)) {
            return Ok(merged);
        }

        let left = self.node(base)?;
        let right = self.node(overlay)?;

        let merged = match (left, right) {
            (Node::Document { root: left }, Node::Document { root: right }) => {
                let (Some(left), Some(right)) = (left, right) else {
                    return Err(MergeError::EmptyDocument);
                };
                let slot = self.reserve(base, overlay);
                let root = self.merge(left, right, path)?;
                self.fill(slot, Node::Document { root: Some(root) })
            }
            (Node::Mapping { entries: left }, Node::Mapping { entries: right }) => {
                let slot = self.reserve(base, overlay);
                let entries = self.merge_entries(left, right, path)?;
                self.fill(slot, Node::Mapping { entries })
            }
            (Node::Sequence { items: mut left }, Node::Sequence { items: right }) => {
                left.extend(right);
                self.tree.push(Node::Sequence { items: left })
            }
            (Node::Scalar { tag: left, .. }, Node::Scalar { tag: right, .. }) => {
                if left != right {
                    return Err(MergeError::ScalarTagMismatch {
                        path: display_path(path),
                        left,
                        right,
                    });
                }
                overlay
            }
            (Node::Alias { target: left }, Node::Alias { target: right }) => {
                if left == right {
                    base
                } else {
                    let target = self.merge(left, right, path)?;
                    self.tree.push(Node::Alias { target })
                }
            }
            (left, right) => return Err(mismatch(left.kind(), right.kind(), path)),
        };

        self.merged.insert((base, overlay), merged);
        Ok(merged)
    }

    /// Claims the result id of a collection merge before its children are
    /// merged, so a recursive anchor can refer back to it.
    fn reserve(&mut self, base: NodeId, overlay: NodeId) -> NodeId {
        let slot = self.tree.push(Node::Document { root: None });
        self.merged.insert((base, overlay), slot);
        slot
    }

    fn fill(&mut self, slot: NodeId, node: Node) -> NodeId {
        if let Some(target) = self.tree.get_mut(slot) {
            *target = node;
        }
        slot
    }

    fn merge_entries(
        &mut self,
        base: Vec<(NodeId, NodeId)>,
        overlay: Vec<(NodeId, NodeId)>,
        path: &mut Vec<String>,
    ) -> Result<Vec<(NodeId, NodeId)>, MergeError> {
        let base = self.keyed(base);
        let overlay = self.keyed(overlay);

        let overlay_index: HashMap<&KeyId, usize> = overlay
            .iter()
            .enumerate()
            .map(|(i, (id, _, _))| (id, i))
            .collect();
        let mut consumed = vec![false; overlay.len()];
        let mut entries = Vec::with_capacity(base.len() + overlay.len());

        for (id, key, value) in &base {
            let value = match overlay_index.get(id) {
                Some(&i) => {
                    consumed[i] = true;
                    path.push(id.1.clone());
                    let merged = self.merge(*value, overlay[i].2, path);
                    path.pop();
                    merged?
                }
                None => *value,
            };
            entries.push((*key, value));
        }

        entries.extend(
            overlay
                .iter()
                .zip(consumed)
                .filter(|(_, consumed)| !consumed)
                .map(|(&(_, key, value), _)| (key, value)),
        );

        Ok(entries)
    }

    /// Pairs each entry with its key identity. A repeated key keeps the
    /// position of its first occurrence and the value of its last.
    fn keyed(&self, entries: Vec<(NodeId, NodeId)>) -> Vec<(KeyId, NodeId, NodeId)> {
        let mut out: Vec<(KeyId, NodeId, NodeId)> = Vec::with_capacity(entries.len());
        let mut seen: HashMap<KeyId, usize> = HashMap::new();

        for (key, value) in entries {
            let id = self.key_id(key);
            match seen.get(&id) {
                Some(&i) => out[i].2 = value,
                None => {
                    seen.insert(id.clone(), out.len());
                    out.push((id, key, value));
                }
            }
        }

        out
    }

    fn key_id(&self, key: NodeId) -> KeyId {
        let tag = match self.tree.resolve(key).and_then(|id| self.tree.get(id)) {
            Some(Node::Scalar { tag, .. }) => Some(tag.clone()),
            _ => None,
        };
        (tag, self.tree.key_text(key))
    }

    fn node(&self, id: NodeId) -> Result<Node, MergeError> {
        self.tree.get(id).cloned().ok_or(MergeError::MissingOperand)
    }
}

fn mismatch(left: NodeKind, right: NodeKind, path: &[String]) -> MergeError {
    if path.is_empty() {
        MergeError::KindMismatch { left, right }
    } else {
        MergeError::NestedKindMismatch {
            path: display_path(path),
            left,
            right,
        }
    }
}

fn display_path(path: &[String]) -> String {
    if path.is_empty() {
        ".".to_string()
    } else {
        path.join(".")
    }
}
