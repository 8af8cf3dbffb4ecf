//! Immutable UI-tree snapshots.
//!
//! The platform hands us a tree of accessibility nodes. We copy it into an
//! arena with index-based child lists so traversal never touches the
//! platform's (recycled) node objects.

use crate::types::Rect;
use serde::Deserialize;

/// Index of a node inside a [`UiTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A single accessibility node
#[derive(Debug, Clone, PartialEq)]
pub struct UiNode {
    /// Text exposed by the node, if any
    pub text: Option<String>,
    /// Whether the platform reports the node as visible to the user
    pub visible: bool,
    /// Bounds in screen coordinates
    pub bounds: Rect,
    children: Vec<NodeId>,
}

impl UiNode {
    /// Visible node without text
    pub fn new(bounds: Rect) -> Self {
        Self {
            text: None,
            visible: true,
            bounds,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Nested wire form of a node, as delivered by the host
#[derive(Debug, Clone, Deserialize)]
pub struct UiNodeSpec {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub bounds: Rect,
    #[serde(default)]
    pub children: Vec<UiNodeSpec>,
}

fn default_visible() -> bool {
    true
}

/// Read-only snapshot of a window's node tree; node 0 is the root
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "UiNodeSpec")]
pub struct UiTree {
    nodes: Vec<UiNode>,
}

impl UiTree {
    /// Create a tree containing only `root`
    pub fn new(root: UiNode) -> Self {
        let mut root = root;
        root.children.clear();
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append `node` as the last child of `parent`
    ///
    /// # Panics
    ///
    /// Panics if `parent` does not belong to this tree.
    pub fn push_child(&mut self, parent: NodeId, node: UiNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = node;
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&UiNode> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Depth-first pre-order walk from the root
    pub fn iter_preorder(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root()],
        }
    }
}

impl From<UiNodeSpec> for UiTree {
    fn from(spec: UiNodeSpec) -> Self {
        let UiNodeSpec {
            text,
            visible,
            bounds,
            children,
        } = spec;

        let mut tree = UiTree::new(UiNode {
            text,
            visible,
            bounds,
            children: Vec::new(),
        });

        // Explicit stack keeps deeply nested snapshots off the call stack
        let mut pending: Vec<(NodeId, std::vec::IntoIter<UiNodeSpec>)> =
            vec![(tree.root(), children.into_iter())];

        while let Some((parent, mut iter)) = pending.pop() {
            if let Some(child) = iter.next() {
                let UiNodeSpec {
                    text,
                    visible,
                    bounds,
                    children,
                } = child;
                let id = tree.push_child(
                    parent,
                    UiNode {
                        text,
                        visible,
                        bounds,
                        children: Vec::new(),
                    },
                );
                pending.push((parent, iter));
                pending.push((id, children.into_iter()));
            }
        }

        tree
    }
}

/// Pre-order iterator over a [`UiTree`]
pub struct PreOrder<'a> {
    tree: &'a UiTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = (NodeId, &'a UiNode);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.get(id)?;
        self.stack.extend(node.children.iter().rev().copied());
        Some((id, node))
    }
}
