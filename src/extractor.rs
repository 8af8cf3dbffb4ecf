//! Visible-text extraction from UI-tree snapshots.
//!
//! The extractor walks the tree depth-first in pre-order and keeps the text of
//! every node that is visible, has non-empty text and lies (at least partly)
//! on screen. Children are always visited, even when their parent is skipped.

use crate::tree::{UiNode, UiTree};
use crate::types::{CapturedText, Rect, ScreenSize};
use tracing::trace;

/// Collects the on-screen text of a snapshot
#[derive(Debug, Clone, Copy)]
pub struct TextExtractor {
    screen: Rect,
}

impl TextExtractor {
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            screen: screen.bounds(),
        }
    }

    /// Extract the visible text from a snapshot.
    ///
    /// Returns empty text when there is no root.
    pub fn extract(&self, root: Option<&UiTree>) -> CapturedText {
        let Some(tree) = root else {
            trace!("No root node available, nothing to extract");
            return CapturedText::default();
        };

        let mut parts: Vec<&str> = Vec::new();
        for (id, node) in tree.iter_preorder() {
            if let Some(text) = self.included_text(node) {
                parts.push(text);
            } else {
                trace!("Skipping node {}", id.index());
            }
        }

        trace!("Collected {} text nodes from {} nodes", parts.len(), tree.len());
        CapturedText::new(parts.join("\n"))
    }

    /// The node's text if it passes the visibility rule
    pub fn included_text<'a>(&self, node: &'a UiNode) -> Option<&'a str> {
        if !node.visible || !node.bounds.intersects(&self.screen) {
            return None;
        }
        node.text.as_deref().filter(|text| !text.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeId;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const SCREEN: ScreenSize = ScreenSize {
        width: 1080,
        height: 1920,
    };

    fn on_screen() -> Rect {
        Rect::new(10, 10, 200, 60)
    }

    fn off_screen() -> Rect {
        Rect::new(2000, 3000, 2100, 3100)
    }

    #[test]
    fn test_no_root_is_empty() {
        let extractor = TextExtractor::new(SCREEN);
        assert!(extractor.extract(None).is_empty());
    }

    #[test]
    fn test_single_visible_node() {
        let tree = UiTree::new(UiNode::new(on_screen()).with_text("I love this"));
        let text = TextExtractor::new(SCREEN).extract(Some(&tree));
        assert_eq!(text.as_str(), "I love this");
    }

    #[test]
    fn test_joins_in_preorder_with_newlines() {
        let mut tree = UiTree::new(UiNode::new(Rect::new(0, 0, 1080, 1920)));
        let list = tree.push_child(tree.root(), UiNode::new(on_screen()).with_text("header"));
        tree.push_child(list, UiNode::new(on_screen()).with_text("first"));
        tree.push_child(list, UiNode::new(on_screen()).with_text("second"));
        tree.push_child(tree.root(), UiNode::new(on_screen()).with_text("footer"));

        let text = TextExtractor::new(SCREEN).extract(Some(&tree));
        assert_eq!(text.as_str(), "header\nfirst\nsecond\nfooter");
    }

    #[test]
    fn test_hidden_parent_still_visits_children() {
        let mut tree = UiTree::new(
            UiNode::new(on_screen())
                .with_text("hidden parent")
                .with_visible(false),
        );
        tree.push_child(tree.root(), UiNode::new(on_screen()).with_text("child"));

        let text = TextExtractor::new(SCREEN).extract(Some(&tree));
        assert_eq!(text.as_str(), "child");
    }

    #[test]
    fn test_offscreen_and_empty_text_are_excluded() {
        let mut tree = UiTree::new(UiNode::new(Rect::new(0, 0, 1080, 1920)));
        tree.push_child(tree.root(), UiNode::new(off_screen()).with_text("far away"));
        tree.push_child(tree.root(), UiNode::new(on_screen()).with_text(""));
        tree.push_child(tree.root(), UiNode::new(Rect::new(-50, -50, 5, 5)).with_text("corner"));

        let text = TextExtractor::new(SCREEN).extract(Some(&tree));
        assert_eq!(text.as_str(), "corner");
    }

    #[test]
    fn test_node_touching_screen_edge_is_excluded() {
        let tree = UiTree::new(UiNode::new(Rect::new(1080, 0, 1200, 100)).with_text("edge"));
        assert!(TextExtractor::new(SCREEN).extract(Some(&tree)).is_empty());
    }

    // ============================================================================
    // Property tests: inclusion rule over synthetic trees
    // ============================================================================

    #[derive(Debug, Clone)]
    struct NodeGen {
        text: Option<String>,
        visible: bool,
        bounds: Rect,
        parent: usize,
    }

    fn rect_strategy() -> impl Strategy<Value = Rect> {
        prop_oneof![
            // Fully on screen
            (0i32..1000, 0i32..1800, 1i32..80, 1i32..120)
                .prop_map(|(x, y, w, h)| Rect::new(x, y, x + w, y + h)),
            // Fully off screen
            (1100i32..4000, 2000i32..5000, 1i32..80, 1i32..120)
                .prop_map(|(x, y, w, h)| Rect::new(x, y, x + w, y + h)),
            // Partially overlapping the top-left corner
            (-200i32..0, -200i32..0, 1i32..400, 1i32..400)
                .prop_map(|(x, y, w, h)| Rect::new(x, y, x + w, y + h)),
        ]
    }

    fn node_strategy() -> impl Strategy<Value = NodeGen> {
        (
            proptest::option::of("[a-z ]{0,8}"),
            any::<bool>(),
            rect_strategy(),
            any::<usize>(),
        )
            .prop_map(|(text, visible, bounds, parent)| NodeGen {
                text,
                visible,
                bounds,
                parent,
            })
    }

    fn build(nodes: &[NodeGen]) -> (UiTree, Vec<NodeId>) {
        let first = &nodes[0];
        let mut root = UiNode::new(first.bounds).with_visible(first.visible);
        root.text = first.text.clone();
        let mut tree = UiTree::new(root);
        let mut ids = vec![tree.root()];

        for spec in &nodes[1..] {
            // Attach to any earlier node: yields nested and sibling shapes
            let parent = ids[spec.parent % ids.len()];
            let mut node = UiNode::new(spec.bounds).with_visible(spec.visible);
            node.text = spec.text.clone();
            ids.push(tree.push_child(parent, node));
        }
        (tree, ids)
    }

    fn expected_included(node: &UiNode) -> bool {
        let screen = SCREEN.bounds();
        let overlaps = node.bounds.left < screen.right
            && screen.left < node.bounds.right
            && node.bounds.top < screen.bottom
            && screen.top < node.bounds.bottom;
        node.visible && node.text.as_deref().is_some_and(|t| !t.is_empty()) && overlaps
    }

    proptest! {
        #[test]
        fn prop_inclusion_rule(nodes in proptest::collection::vec(node_strategy(), 1..40)) {
            let (tree, _) = build(&nodes);
            let extractor = TextExtractor::new(SCREEN);

            let expected: Vec<String> = tree
                .iter_preorder()
                .filter(|(_, node)| expected_included(node))
                .filter_map(|(_, node)| node.text.clone())
                .collect();

            let text = extractor.extract(Some(&tree));
            prop_assert_eq!(text.as_str(), expected.join("\n"));
        }

        #[test]
        fn prop_every_node_is_visited(nodes in proptest::collection::vec(node_strategy(), 1..40)) {
            let (tree, ids) = build(&nodes);
            prop_assert_eq!(tree.iter_preorder().count(), ids.len());
        }

        #[test]
        fn prop_offscreen_nodes_never_included(
            text in "[a-z]{1,10}",
            rect in (1100i32..4000, 2000i32..5000, 1i32..80, 1i32..120)
                .prop_map(|(x, y, w, h)| Rect::new(x, y, x + w, y + h)),
        ) {
            let tree = UiTree::new(UiNode::new(rect).with_text(text));
            prop_assert!(TextExtractor::new(SCREEN).extract(Some(&tree)).is_empty());
        }
    }
}
