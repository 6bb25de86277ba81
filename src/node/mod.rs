//! Visual node abstraction.
//!
//! The engine never renders anything itself. Hosts expose their widgets
//! through [`VisualNode`] and their container through [`Presenter`]; the
//! engine only moves shared handles between the cache, the factory and the
//! presentation slot.

mod context;
mod item;
mod presenter;
mod text;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::lifecycle::Lifecycle;
use crate::transition::Easing;

pub use context::ContextSlot;
pub use item::{DataRef, Item, ItemData};
pub(crate) use item::same_optional_item;
pub use presenter::{PresentationSlot, Presenter};
pub use text::TextNode;

/// Shared handle to a host node. Identity is pointer identity.
pub type NodeRef = Arc<dyn VisualNode>;

/// Errors raised by the visual host while attaching or detaching nodes.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The host is tearing down the node's platform handle.
    #[error("Visual host is busy tearing down '{node}': {reason}")]
    TeardownRace { node: String, reason: String },

    /// The host refused the operation.
    #[error("Visual host rejected operation on '{node}': {reason}")]
    Rejected { node: String, reason: String },
}

/// A node that can occupy the presentation slot.
///
/// Everything beyond the data context is optional: the defaults describe a
/// node with no platform handle, no animations and no lifecycle hooks.
#[async_trait]
pub trait VisualNode: Send + Sync + fmt::Debug + 'static {
    /// The node's current binding context.
    fn data_context(&self) -> Option<DataRef>;

    /// Replace the node's binding context.
    fn set_data_context(&self, context: Option<DataRef>);

    /// Lifecycle hooks implemented by the node itself.
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }

    /// Remove the node from whatever parent currently holds it.
    ///
    /// Hosts may fail with [`HostError::TeardownRace`] while a previous
    /// parent is still releasing the node; the engine retries once after
    /// [`VisualNode::disconnect_handle`].
    fn detach_from_parent(&self) -> Result<(), HostError> {
        Ok(())
    }

    /// Forcibly disconnect the platform handle backing this node.
    fn disconnect_handle(&self) {}

    /// Stop any running animation on this node.
    fn cancel_animations(&self) {}

    /// Set opacity immediately.
    fn set_opacity(&self, _opacity: f32) {}

    /// Animate opacity. Hosts own frame pacing; the default jumps straight
    /// to the target value.
    async fn fade_to(&self, opacity: f32, _duration: Duration, _easing: Easing) -> anyhow::Result<()> {
        self.set_opacity(opacity);
        Ok(())
    }
}

/// Pointer identity of a node, usable as a map key.
pub(crate) fn node_key(node: &NodeRef) -> usize {
    Arc::as_ptr(node) as *const () as usize
}

/// True when both handles point at the same node.
pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    node_key(a) == node_key(b)
}

/// [`same_node`] lifted over optional handles; two absent nodes are the same.
pub fn same_optional_node(a: Option<&NodeRef>, b: Option<&NodeRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => same_node(a, b),
        (None, None) => true,
        _ => false,
    }
}
