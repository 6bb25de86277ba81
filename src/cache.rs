//! Recycling cache for created nodes.
//!
//! Two independent maps: entries with a state key are cached by key,
//! everything else by index. When disabled, lookups always miss and stores
//! are no-ops so callers fall through to the factory.

use std::collections::HashMap;

use crate::node::{same_node, NodeRef};

#[derive(Debug)]
pub struct ViewCache {
    enabled: bool,
    by_index: HashMap<usize, NodeRef>,
    by_key: HashMap<String, NodeRef>,
}

impl Default for ViewCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ViewCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            by_index: HashMap::new(),
            by_key: HashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Toggle caching. Disabling evicts everything and returns the evicted
    /// nodes so the caller can dispose them.
    pub fn set_enabled(&mut self, enabled: bool) -> Vec<NodeRef> {
        self.enabled = enabled;
        if enabled {
            Vec::new()
        } else {
            self.clear()
        }
    }

    pub fn get_by_index(&self, index: usize) -> Option<NodeRef> {
        if !self.enabled {
            return None;
        }
        self.by_index.get(&index).cloned()
    }

    pub fn get_by_key(&self, key: &str) -> Option<NodeRef> {
        if !self.enabled {
            return None;
        }
        self.by_key.get(key).cloned()
    }

    pub fn store_by_index(&mut self, index: usize, node: NodeRef) {
        if self.enabled {
            self.by_index.insert(index, node);
        }
    }

    pub fn store_by_key(&mut self, key: impl Into<String>, node: NodeRef) {
        if self.enabled {
            self.by_key.insert(key.into(), node);
        }
    }

    /// True when any entry references `node`.
    pub fn contains(&self, node: &NodeRef) -> bool {
        self.by_index.values().any(|cached| same_node(cached, node))
            || self.by_key.values().any(|cached| same_node(cached, node))
    }

    /// Scrub every entry pointing at `node`.
    pub fn remove(&mut self, node: &NodeRef) {
        self.by_index.retain(|_, cached| !same_node(cached, node));
        self.by_key.retain(|_, cached| !same_node(cached, node));
    }

    /// Empty both maps, returning each distinct evicted node once.
    pub fn clear(&mut self) -> Vec<NodeRef> {
        let mut evicted: Vec<NodeRef> = Vec::new();
        for node in self.by_index.drain().map(|(_, node)| node).chain(self.by_key.drain().map(|(_, node)| node)) {
            if !evicted.iter().any(|seen| same_node(seen, &node)) {
                evicted.push(node);
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.by_index.len() + self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_index.is_empty() && self.by_key.is_empty()
    }

    /// Every cached node, each once.
    pub fn nodes(&self) -> Vec<NodeRef> {
        let mut nodes: Vec<NodeRef> = Vec::new();
        for node in self.by_index.values().chain(self.by_key.values()) {
            if !nodes.iter().any(|seen| same_node(seen, node)) {
                nodes.push(node.clone());
            }
        }
        nodes
    }
}
