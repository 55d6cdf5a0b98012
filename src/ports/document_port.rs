//! Read-only document tree port.
//!
//! Extraction never touches a live page. It walks any structure that can
//! answer these navigation questions, which keeps the label scans testable
//! against synthetic trees.

/// Handle to a node inside one [`DocumentTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

pub trait DocumentTree {
    /// The document node. `None` means the tree could not be read at all.
    fn root(&self) -> Option<NodeId>;

    /// Lowercase tag name for elements, `None` for text nodes.
    fn tag_name(&self, node: NodeId) -> Option<&str>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Child nodes (elements and text) in document order.
    fn children(&self, node: NodeId) -> &[NodeId];

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Text carried directly by a text node; `None` for elements.
    fn text(&self, node: NodeId) -> Option<&str>;

    fn is_element(&self, node: NodeId) -> bool {
        self.tag_name(node).is_some()
    }

    fn has_tag(&self, node: NodeId, tag: &str) -> bool {
        self.tag_name(node) == Some(tag)
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map(|v| v.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Concatenated text of the node and all its descendants, untrimmed.
    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if let Some(text) = self.text(current) {
                out.push_str(text);
            }
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.children(node)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    fn next_element_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        self.children(parent)
            .iter()
            .copied()
            .skip_while(|c| *c != node)
            .skip(1)
            .find(|c| self.is_element(*c))
    }

    /// Descendants of `node` in document order, excluding `node` itself.
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// Every element in the document matching `predicate`, in document order.
    fn find_all(&self, predicate: &dyn Fn(NodeId) -> bool) -> Vec<NodeId> {
        match self.root() {
            Some(root) => {
                let mut nodes = vec![root];
                nodes.extend(self.descendants(root));
                nodes
                    .into_iter()
                    .filter(|n| self.is_element(*n) && predicate(*n))
                    .collect()
            }
            None => Vec::new(),
        }
    }

    /// Descendant elements of `node` matching `predicate`, in document order.
    fn find_within(&self, node: NodeId, predicate: &dyn Fn(NodeId) -> bool) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|n| self.is_element(*n) && predicate(*n))
            .collect()
    }

    fn find_first_within(
        &self,
        node: NodeId,
        predicate: &dyn Fn(NodeId) -> bool,
    ) -> Option<NodeId> {
        self.descendants(node)
            .into_iter()
            .find(|n| self.is_element(*n) && predicate(*n))
    }

    /// The nearest element named `tag`, starting from `node` itself.
    fn closest(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(n) = current {
            if self.has_tag(n, tag) {
                return Some(n);
            }
            current = self.parent(n);
        }
        None
    }
}
