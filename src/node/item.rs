//! Backing items for switchable entries.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::lifecycle::Lifecycle;
use crate::registry::StateEntry;

use super::{same_node, NodeRef, VisualNode};

/// Shared handle to plain item data (also used as a node's data context).
pub type DataRef = Arc<dyn ItemData>;

/// Plain data that can back an entry or serve as a binding context.
pub trait ItemData: Any + Send + Sync + fmt::Debug {
    /// Access for downcasting in [`ItemData::equals`] implementations.
    fn as_any(&self) -> &dyn Any;

    /// String form shown by the fallback text node.
    fn display_text(&self) -> String;

    /// Explicit state key supplied by the item itself.
    fn state_key(&self) -> Option<&str> {
        None
    }

    /// Value equality against another item. Reference equality is always
    /// checked first by the engine; the default reports no value equality.
    fn equals(&self, _other: &dyn ItemData) -> bool {
        false
    }

    /// Lifecycle hooks implemented by this data (when used as a context).
    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        None
    }
}

impl ItemData for String {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn display_text(&self) -> String {
        self.clone()
    }

    fn equals(&self, other: &dyn ItemData) -> bool {
        other.as_any().downcast_ref::<String>() == Some(self)
            || other.as_any().downcast_ref::<&'static str>().copied() == Some(self.as_str())
    }
}

impl ItemData for &'static str {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn display_text(&self) -> String {
        (*self).to_string()
    }

    fn equals(&self, other: &dyn ItemData) -> bool {
        other.as_any().downcast_ref::<&'static str>() == Some(self)
            || other.as_any().downcast_ref::<String>().map(String::as_str) == Some(*self)
    }
}

/// What an entry is backed by.
#[derive(Clone)]
pub enum Item {
    /// The item is already a visual node.
    Node(NodeRef),
    /// Plain data, rendered through templates or factories.
    Data(DataRef),
    /// An explicit state entry.
    State(Arc<StateEntry>),
}

impl Item {
    /// Wrap plain data.
    pub fn data(value: impl ItemData) -> Self {
        Item::Data(Arc::new(value))
    }

    /// Wrap a node.
    pub fn node(node: impl VisualNode) -> Self {
        Item::Node(Arc::new(node))
    }

    pub fn as_node(&self) -> Option<&NodeRef> {
        match self {
            Item::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataRef> {
        match self {
            Item::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Key carried by the item itself, if any.
    pub fn state_key(&self) -> Option<&str> {
        match self {
            Item::State(entry) => Some(entry.key()),
            Item::Data(data) => data.state_key(),
            Item::Node(_) => None,
        }
    }

    /// String form used by the fallback node and automation text.
    pub fn display_text(&self) -> String {
        match self {
            Item::Node(node) => format!("{node:?}"),
            Item::Data(data) => data.display_text(),
            Item::State(entry) => entry.key().to_string(),
        }
    }

    /// Reference equality, falling back to [`ItemData::equals`] for data.
    pub fn matches(&self, other: &Item) -> bool {
        match (self, other) {
            (Item::Node(a), Item::Node(b)) => same_node(a, b),
            (Item::State(a), Item::State(b)) => Arc::ptr_eq(a, b),
            (Item::Data(a), Item::Data(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const () || a.equals(b.as_ref())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Item::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Item::Data(data) => f.debug_tuple("Data").field(data).finish(),
            Item::State(entry) => f.debug_tuple("State").field(&entry.key()).finish(),
        }
    }
}

/// Optional-item equality used when comparing snapshots.
pub(crate) fn same_optional_item(a: Option<&Item>, b: Option<&Item>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.matches(b),
        (None, None) => true,
        _ => false,
    }
}
