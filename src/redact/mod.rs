//! In-place masking of secret values in a document tree.
//!
//! Mapping keys are checked against a [`SecretDetector`]; the value under a
//! matching key is masked together with everything below it. Masking is
//! destructive: callers who still need the original values must decode or
//! merge again.

mod detector;

use std::collections::{HashSet, VecDeque};

pub use detector::{DefaultDetector, SecretDetector, DEFAULT_SECRET_PATTERN};

use crate::tree::{Node, NodeId, Tag, Tree};

/// Scalars at least this long are replaced by a length placeholder instead of
/// one mask character per character.
pub const DEFAULT_LENGTH_CUTOFF: usize = 32;

const MASK: char = '*';

/// Masks secrets in `tree`. A missing tree is left alone.
///
/// With `collapse_structure` a secret mapping or sequence becomes the single
/// scalar `*`; without it the collection keeps its keys and length and only
/// its scalars are masked.
pub fn redact<D>(tree: Option<&mut Tree>, collapse_structure: bool, detector: &D)
where
    D: SecretDetector + ?Sized,
{
    if let Some(tree) = tree {
        Redactor::new(collapse_structure).redact(tree, detector);
    }
}

/// Masking settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redactor {
    collapse_structure: bool,
    length_cutoff: usize,
}

impl Redactor {
    pub fn new(collapse_structure: bool) -> Self {
        Self {
            collapse_structure,
            length_cutoff: DEFAULT_LENGTH_CUTOFF,
        }
    }

    /// Sets the scalar length from which the placeholder `**N**` is used.
    #[must_use]
    pub fn with_length_cutoff(mut self, length_cutoff: usize) -> Self {
        self.length_cutoff = length_cutoff;
        self
    }

    /// Breadth-first walk over `(node, secret)` work items, starting at the root.
    ///
    /// Every pair is handled once, so shared anchor targets are masked once
    /// and recursive anchors cannot loop.
    pub fn redact<D>(&self, tree: &mut Tree, detector: &D)
    where
        D: SecretDetector + ?Sized,
    {
        let Some(root) = tree.root() else {
            return;
        };

        let mut queue = VecDeque::from([(root, false)]);
        let mut done = HashSet::new();

        while let Some((id, secret)) = queue.pop_front() {
            if !done.insert((id, secret)) {
                continue;
            }
            if secret {
                self.mask(tree, id, &mut queue);
            } else {
                classify(tree, id, detector, &mut queue);
            }
        }
    }

    fn mask(&self, tree: &mut Tree, id: NodeId, queue: &mut VecDeque<(NodeId, bool)>) {
        let Some(node) = tree.get_mut(id) else {
            return;
        };

        let collection = matches!(
            node,
            Node::Document { .. } | Node::Mapping { .. } | Node::Sequence { .. }
        );
        if collection && self.collapse_structure {
            *node = Node::string(MASK);
            return;
        }

        match node {
            Node::Scalar { tag, value } => {
                *tag = Tag::Str;
                *value = self.mask_text(value);
            }
            // the target is shared, masking it covers every alias
            Node::Alias { target } => queue.push_back((*target, true)),
            Node::Mapping { entries } => {
                queue.extend(entries.iter().map(|&(_, value)| (value, true)));
            }
            Node::Sequence { items } => queue.extend(items.iter().map(|&item| (item, true))),
            Node::Document { root } => queue.extend(root.map(|root| (root, true))),
        }
    }

    fn mask_text(&self, text: &str) -> String {
        let len = text.chars().count();
        if len < self.length_cutoff {
            MASK.to_string().repeat(len)
        } else {
            format!("{MASK}{MASK}{len}{MASK}{MASK}")
        }
    }
}

/// Schedules the children of a node that is not secret itself.
fn classify<D>(tree: &Tree, id: NodeId, detector: &D, queue: &mut VecDeque<(NodeId, bool)>)
where
    D: SecretDetector + ?Sized,
{
    match tree.get(id) {
        Some(Node::Mapping { entries }) => {
            for &(key, value) in entries {
                queue.push_back((value, detector.is_secret(&tree.key_text(key))));
            }
        }
        Some(Node::Sequence { items }) => queue.extend(items.iter().map(|&item| (item, false))),
        Some(Node::Document { root: Some(root) }) => queue.push_back((*root, false)),
        Some(Node::Alias { target }) => queue.push_back((*target, false)),
        Some(Node::Document { root: None } | Node::Scalar { .. }) | None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::codec::decode;

    fn hidden(text: &str, collapse: bool) -> String {
        let mut tree = decode("test", text).unwrap();
        redact(Some(&mut tree), collapse, &DefaultDetector);
        tree.render(tree.root().unwrap())
    }

    /// `{open: &ref value, <keys...>: *ref}`
    fn anchored(keys: &[&str]) -> Tree {
        let mut tree = Tree::new();
        let open = tree.string("open");
        let value = tree.string("value");
        let mut entries = vec![(open, value)];
        for key in keys {
            let key = tree.string(*key);
            let alias = tree.alias(value);
            entries.push((key, alias));
        }
        let map = tree.mapping(entries);
        tree.document(map);
        tree
    }

    #[test]
    fn test_absent_tree_is_noop() {
        redact(None, true, &DefaultDetector);
        let mut empty = Tree::new();
        redact(Some(&mut empty), false, &DefaultDetector);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_non_secret_untouched() {
        assert_eq!(hidden("hello = \"world\"", true), "{hello: world}");
        assert_eq!(hidden("list = [\"a\", \"b\"]", true), "{list: [a, b]}");
    }

    #[test]
    fn test_root_scalar_never_masked() {
        let mut tree = Tree::new();
        let root = tree.string("secret");
        tree.set_root(root);
        redact(Some(&mut tree), true, &DefaultDetector);
        assert_eq!(tree.render(root), "secret");
    }

    #[test]
    fn test_masks_only_matched_keys() {
        let text = "[[connections]]\nuser = \"us\"\npass = \"pa\"";
        assert_eq!(hidden(text, false), "{connections: [{user: us, pass: **}]}");
        assert_eq!(hidden(text, true), "{connections: [{user: us, pass: **}]}");
    }

    #[test]
    fn test_collapse_structure() {
        let text = "[secrets]\nuser = \"us\"\npass = \"pa\"";
        assert_eq!(hidden(text, true), "{secrets: *}");

        let text = "[connections]\nuser = \"us\"\nsecrets = [\"a\", \"b\", \"c\"]";
        assert_eq!(hidden(text, true), "{connections: {user: us, secrets: *}}");
    }

    #[test]
    fn test_preserve_structure() {
        let text = "[connections]\nuser = \"us\"\nsecrets = [\"a\", \"bb\", \"ccc\"]";
        assert_eq!(
            hidden(text, false),
            "{connections: {user: us, secrets: [*, **, ***]}}"
        );

        let text = "[secrets]\nuser = \"us\"\nnested = { deep = \"abc\" }";
        assert_eq!(hidden(text, false), "{secrets: {user: **, nested: {deep: ***}}}");
    }

    #[test]
    fn test_many_items_preserved() {
        let items: Vec<String> = (0..103).map(|i| format!("\"*{i}\"")).collect();
        let text = format!("secrets = [{}]", items.join(", "));
        let mut tree = decode("test", &text).unwrap();
        redact(Some(&mut tree), false, &DefaultDetector);

        let seq = tree.lookup(&["secrets"]).unwrap();
        let Some(Node::Sequence { items }) = tree.get(seq) else {
            panic!("expected sequence");
        };
        assert_eq!(items.len(), 103);
        for (i, &item) in items.iter().enumerate() {
            let want = "*".repeat(i.to_string().len() + 1);
            assert_eq!(tree.scalar_text(item), Some(want.as_str()));
        }
    }

    #[test]
    fn test_length_cutoff() {
        let long = "x".repeat(34);
        assert_eq!(hidden(&format!("token = \"{long}\""), false), "{token: **34**}");

        let short = "x".repeat(31);
        assert_eq!(
            hidden(&format!("token = \"{short}\""), false),
            format!("{{token: {}}}", "*".repeat(31))
        );
        assert_eq!(
            hidden(&format!("token = \"{}\"", "x".repeat(32)), false),
            "{token: **32**}"
        );
    }

    #[test]
    fn test_custom_length_cutoff() {
        let mut tree = decode("test", "pass = \"abcdef\"").unwrap();
        Redactor::new(false)
            .with_length_cutoff(4)
            .redact(&mut tree, &DefaultDetector);
        assert_eq!(tree.render(tree.root().unwrap()), "{pass: **6**}");
    }

    #[test]
    fn test_mask_counts_characters() {
        assert_eq!(hidden("pass = \"äöü\"", false), "{pass: ***}");
    }

    #[test]
    fn test_non_string_scalars_masked_as_strings() {
        let mut tree = decode("test", "pass = 12345\nsecret = true").unwrap();
        redact(Some(&mut tree), false, &DefaultDetector);

        for key in ["pass", "secret"] {
            let id = tree.lookup(&[key]).unwrap();
            assert!(matches!(
                tree.get(id),
                Some(Node::Scalar { tag: Tag::Str, .. })
            ));
        }
        assert_eq!(tree.render(tree.root().unwrap()), "{pass: *****, secret: ****}");
    }

    #[test]
    fn test_deeply_nested_mixed() {
        let text = r#"
[lvl1]
meta = "keep"
arr = [
    { user = "alice", password = "wonderland" },
    [{ certificate = "pemdata" }, { note = "not a secret" }],
]
"#;
        assert_eq!(
            hidden(text, false),
            "{lvl1: {meta: keep, arr: [{user: alice, password: **********}, \
             [{certificate: *******}, {note: not a secret}]]}}"
        );
    }

    #[test]
    fn test_alias_secret_masks_target() {
        let mut tree = anchored(&["pass"]);
        redact(Some(&mut tree), true, &DefaultDetector);
        assert_eq!(tree.render(tree.root().unwrap()), "{open: *****, pass: *****}");
    }

    #[test]
    fn test_reused_anchor_masked_once() {
        let mut tree = anchored(&["pass", "secret", "normal"]);
        let target = tree.lookup(&["open"]).unwrap();
        redact(Some(&mut tree), true, &DefaultDetector);

        assert_eq!(tree.scalar_text(target), Some("*****"));
        for key in ["pass", "secret", "normal"] {
            let alias = tree.lookup(&[key]).unwrap();
            assert_eq!(tree.resolve(alias), Some(target));
            assert_eq!(tree.scalar_text(alias), Some("*****"));
        }
    }

    #[test]
    fn test_redaction_is_idempotent() {
        let mut tree = anchored(&["pass"]);
        redact(Some(&mut tree), false, &DefaultDetector);
        let once = tree.render(tree.root().unwrap());
        redact(Some(&mut tree), false, &DefaultDetector);
        assert_eq!(tree.render(tree.root().unwrap()), once);
    }

    #[test]
    fn test_non_secret_alias_descends_to_target() {
        let mut tree = Tree::new();
        let (kp, vp) = (tree.string("password"), tree.string("hunter2"));
        let inner = tree.mapping(vec![(kp, vp)]);
        let (ka, kb) = (tree.string("a"), tree.string("b"));
        let alias = tree.alias(inner);
        let root = tree.mapping(vec![(ka, inner), (kb, alias)]);
        tree.document(root);

        redact(Some(&mut tree), false, &|key: &str| key == "password");
        assert_eq!(tree.render(root), "{a: {password: *******}, b: {password: *******}}");
    }

    #[test]
    fn test_recursive_alias_terminates() {
        let mut tree = Tree::new();
        let map = tree.mapping(vec![]);
        let key = tree.string("secret");
        let alias = tree.alias(map);
        if let Some(Node::Mapping { entries }) = tree.get_mut(map) {
            entries.push((key, alias));
        }
        tree.document(map);

        redact(Some(&mut tree), false, &DefaultDetector);
        assert_eq!(tree.render(map), "{secret: *}");
    }

    #[test]
    fn test_regex_detector() {
        let re = regex::Regex::new(DEFAULT_SECRET_PATTERN).unwrap();
        let mut tree = decode("test", "compass = \"north\"\nname = \"n\"").unwrap();
        redact(Some(&mut tree), true, &re);
        assert_eq!(tree.render(tree.root().unwrap()), "{compass: *****, name: n}");
    }
}
