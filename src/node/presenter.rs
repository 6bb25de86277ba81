//! The presentation slot container.

use parking_lot::Mutex;

use super::{same_node, HostError, NodeRef};

/// Container the engine keeps populated with the current node.
///
/// During an animated hand-off both the outgoing and incoming nodes are
/// children; at rest there is at most one.
pub trait Presenter: Send + Sync {
    /// Current children in insertion order.
    fn children(&self) -> Vec<NodeRef>;

    /// Add a node as the top-most child.
    fn insert(&self, node: NodeRef) -> Result<(), HostError>;

    /// Remove a node if present.
    fn remove(&self, node: &NodeRef) -> Result<(), HostError>;

    fn contains(&self, node: &NodeRef) -> bool {
        self.children().iter().any(|child| same_node(child, node))
    }
}

/// In-memory presenter for headless hosts and tests.
#[derive(Debug, Default)]
pub struct PresentationSlot {
    children: Mutex<Vec<NodeRef>>,
}

impl PresentationSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.children.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.lock().is_empty()
    }
}

impl Presenter for PresentationSlot {
    fn children(&self) -> Vec<NodeRef> {
        self.children.lock().clone()
    }

    fn insert(&self, node: NodeRef) -> Result<(), HostError> {
        let mut children = self.children.lock();
        if !children.iter().any(|child| same_node(child, &node)) {
            children.push(node);
        }
        Ok(())
    }

    fn remove(&self, node: &NodeRef) -> Result<(), HostError> {
        self.children.lock().retain(|child| !same_node(child, node));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TextNode;
    use std::sync::Arc;

    #[test]
    fn insert_is_idempotent() {
        let slot = PresentationSlot::new();
        let node: NodeRef = Arc::new(TextNode::new("a"));

        slot.insert(node.clone()).unwrap();
        slot.insert(node.clone()).unwrap();

        assert_eq!(slot.len(), 1);
        assert!(slot.contains(&node));
    }

    #[test]
    fn remove_only_drops_matching_node() {
        let slot = PresentationSlot::new();
        let a: NodeRef = Arc::new(TextNode::new("a"));
        let b: NodeRef = Arc::new(TextNode::new("b"));
        slot.insert(a.clone()).unwrap();
        slot.insert(b.clone()).unwrap();

        slot.remove(&a).unwrap();

        assert!(!slot.contains(&a));
        assert!(slot.contains(&b));
        assert!(!slot.is_empty());
    }
}
