//! Declarative state entries.

use std::fmt;
use std::sync::Arc;

use crate::node::{DataRef, NodeRef};

/// Builds a fresh node for a state entry.
pub type NodeBuilder = Arc<dyn Fn() -> NodeRef + Send + Sync>;

/// Builds a fresh data context paired with a built node.
pub type ContextBuilder = Arc<dyn Fn() -> DataRef + Send + Sync>;

/// One named state of a state-machine style switcher.
///
/// An entry either carries a pre-built node, or declares how to build one
/// (optionally with a paired data context). An entry with neither shows a
/// placeholder.
pub struct StateEntry {
    key: String,
    content: Option<NodeRef>,
    node_type: Option<NodeBuilder>,
    context_type: Option<ContextBuilder>,
}

impl StateEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content: None,
            node_type: None,
            context_type: None,
        }
    }

    /// Attach a pre-built node.
    pub fn with_content(mut self, node: NodeRef) -> Self {
        self.content = Some(node);
        self
    }

    /// Declare the node to instantiate when the state is first shown.
    pub fn with_node_type<F>(mut self, build: F) -> Self
    where
        F: Fn() -> NodeRef + Send + Sync + 'static,
    {
        self.node_type = Some(Arc::new(build));
        self
    }

    /// Declare the data context paired with the built node.
    pub fn with_context_type<F>(mut self, build: F) -> Self
    where
        F: Fn() -> DataRef + Send + Sync + 'static,
    {
        self.context_type = Some(Arc::new(build));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content(&self) -> Option<&NodeRef> {
        self.content.as_ref()
    }

    pub fn node_type(&self) -> Option<&NodeBuilder> {
        self.node_type.as_ref()
    }

    pub fn context_type(&self) -> Option<&ContextBuilder> {
        self.context_type.as_ref()
    }
}

impl fmt::Debug for StateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateEntry")
            .field("key", &self.key)
            .field("content", &self.content)
            .field("node_type", &self.node_type.is_some())
            .field("context_type", &self.context_type.is_some())
            .finish()
    }
}
