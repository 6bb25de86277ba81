//! Descriptor registry: the ordered list of switchable entries.
//!
//! Exactly one source is authoritative at a time, in precedence order:
//! explicit state entries, then the items source, then inline views.

mod descriptor;
mod entry;

use std::collections::HashMap;
use std::sync::Arc;

use crate::node::{same_node, Item, NodeRef};
use crate::selection::{IndexBehavior, SelectionSnapshot};

pub use descriptor::ItemDescriptor;
pub use entry::{ContextBuilder, NodeBuilder, StateEntry};

/// Which collection the current descriptors were built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptorSource {
    #[default]
    Empty,
    StateEntries,
    ItemsSource,
    Views,
}

/// Owns the three candidate collections and the descriptors built from them.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    state_entries: Vec<Arc<StateEntry>>,
    items_source: Option<Vec<Item>>,
    views: Vec<NodeRef>,
    descriptors: Vec<ItemDescriptor>,
    key_lookup: HashMap<String, usize>,
    source: DescriptorSource,
    generation: u64,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_state_entries(&mut self, entries: Vec<StateEntry>) {
        self.state_entries = entries.into_iter().map(Arc::new).collect();
        self.rebuild();
    }

    /// Mutate the state entries in place and rebuild.
    pub fn modify_state_entries(&mut self, f: impl FnOnce(&mut Vec<Arc<StateEntry>>)) {
        f(&mut self.state_entries);
        self.rebuild();
    }

    pub fn set_items_source(&mut self, items: Option<Vec<Item>>) {
        self.items_source = items;
        self.rebuild();
    }

    /// Mutate the items source in place and rebuild. Assigns an empty
    /// source first if none is set.
    pub fn modify_items_source(&mut self, f: impl FnOnce(&mut Vec<Item>)) {
        f(self.items_source.get_or_insert_with(Vec::new));
        self.rebuild();
    }

    pub fn set_views(&mut self, views: Vec<NodeRef>) {
        self.views = views;
        self.rebuild();
    }

    /// Mutate the inline views in place and rebuild.
    pub fn modify_views(&mut self, f: impl FnOnce(&mut Vec<NodeRef>)) {
        f(&mut self.views);
        self.rebuild();
    }

    pub fn state_entries(&self) -> &[Arc<StateEntry>] {
        &self.state_entries
    }

    pub fn items_source(&self) -> Option<&[Item]> {
        self.items_source.as_deref()
    }

    pub fn views(&self) -> &[NodeRef] {
        &self.views
    }

    /// Rebuild descriptors from the authoritative source.
    pub fn rebuild(&mut self) {
        self.descriptors.clear();
        self.key_lookup.clear();
        self.generation += 1;

        if !self.state_entries.is_empty() {
            self.source = DescriptorSource::StateEntries;
            self.descriptors = self
                .state_entries
                .iter()
                .enumerate()
                .map(|(index, entry)| ItemDescriptor::from_state_entry(index, entry.clone()))
                .collect();
        } else if let Some(items) = &self.items_source {
            self.source = DescriptorSource::ItemsSource;
            self.descriptors = items
                .iter()
                .enumerate()
                .map(|(index, item)| ItemDescriptor::from_item(index, item.clone()))
                .collect();
        } else if !self.views.is_empty() {
            self.source = DescriptorSource::Views;
            self.descriptors = self
                .views
                .iter()
                .enumerate()
                .map(|(index, view)| ItemDescriptor::from_view(index, view.clone()))
                .collect();
        } else {
            self.source = DescriptorSource::Empty;
        }

        for descriptor in &self.descriptors {
            if let Some(key) = descriptor.lookup_key() {
                self.key_lookup.insert(key.to_string(), descriptor.index);
            }
        }

        tracing::debug!(
            source = ?self.source,
            count = self.descriptors.len(),
            generation = self.generation,
            "Descriptor registry rebuilt"
        );
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ItemDescriptor> {
        self.descriptors.get(index)
    }

    pub fn descriptors(&self) -> &[ItemDescriptor] {
        &self.descriptors
    }

    pub fn source(&self) -> DescriptorSource {
        self.source
    }

    /// Incremented on every rebuild.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn index_of_key(&self, key: &str) -> Option<usize> {
        if key.trim().is_empty() {
            return None;
        }
        self.key_lookup.get(key).copied()
    }

    pub fn index_of_item(&self, item: &Item) -> Option<usize> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.item.matches(item))
            .map(|descriptor| descriptor.index)
    }

    /// True when a live explicit collection entry still references `node`:
    /// an inline view, a state entry's pre-built content, or an item that is
    /// itself the node.
    pub fn owns(&self, node: &NodeRef) -> bool {
        self.views.iter().any(|view| same_node(view, node))
            || self
                .state_entries
                .iter()
                .filter_map(|entry| entry.content())
                .any(|content| same_node(content, node))
            || self
                .items_source
                .iter()
                .flatten()
                .filter_map(Item::as_node)
                .any(|item| same_node(item, node))
    }

    /// Re-resolve a selection after a rebuild: exact key, then item match,
    /// then the normalized previous index, then the first entry.
    pub fn reselect(&self, previous: &SelectionSnapshot, behavior: IndexBehavior) -> Option<usize> {
        if let Some(index) = previous
            .state_key
            .as_deref()
            .and_then(|key| self.index_of_key(key))
        {
            return Some(index);
        }

        if let Some(index) = previous.item.as_ref().and_then(|item| self.index_of_item(item)) {
            return Some(index);
        }

        if let Some(current) = previous.index {
            if let Ok(Some(index)) = behavior.normalize(current as i64, self.len(), previous.index) {
                if index < self.len() {
                    return Some(index);
                }
            }
        }

        if self.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}
