use std::sync::Arc;

use crate::node::{Item, NodeRef};

use super::entry::StateEntry;

/// One switchable entry, rebuilt from scratch on every registry rebuild.
#[derive(Debug, Clone)]
pub struct ItemDescriptor {
    pub index: usize,
    pub item: Item,
    pub state_key: Option<String>,
    /// Node supplied directly by the caller for this entry.
    pub inline_view: Option<NodeRef>,
    /// The state entry this descriptor was built from, if any.
    pub state_entry: Option<Arc<StateEntry>>,
}

impl ItemDescriptor {
    pub(crate) fn from_state_entry(index: usize, entry: Arc<StateEntry>) -> Self {
        Self {
            index,
            item: Item::State(entry.clone()),
            state_key: Some(entry.key().to_string()),
            inline_view: entry.content().cloned(),
            state_entry: Some(entry),
        }
    }

    pub(crate) fn from_item(index: usize, item: Item) -> Self {
        Self {
            index,
            state_key: item.state_key().map(str::to_string),
            inline_view: item.as_node().cloned(),
            item,
            state_entry: None,
        }
    }

    pub(crate) fn from_view(index: usize, view: NodeRef) -> Self {
        Self {
            index,
            item: Item::Node(view.clone()),
            state_key: None,
            inline_view: Some(view),
            state_entry: None,
        }
    }

    /// The key used for lookups and caching, ignoring blank keys.
    pub fn lookup_key(&self) -> Option<&str> {
        self.state_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }
}
