//! Produces a node for a descriptor.
//!
//! Resolution order, first match wins:
//! 1. pre-built state entry content
//! 2. declared node type (with optional paired context type)
//! 3. caller-supplied inline view
//! 4. the item itself when it is a node
//! 5. custom per-item factory
//! 6. template selector, or the item template
//! 7. a text node showing the item's string form

use std::fmt;
use std::sync::Arc;

use crate::error::SwitcherError;
use crate::node::{Item, NodeRef, TextNode};
use crate::registry::{ItemDescriptor, StateEntry};

/// What a template produces when instantiated.
pub enum TemplateContent {
    /// A node ready to present.
    Node(NodeRef),
    /// A cell wrapper around an optional node; the wrapper itself is discarded.
    Cell(Option<NodeRef>),
    /// The template produced nothing usable.
    Empty,
}

/// A reusable recipe for producing nodes.
#[derive(Clone)]
pub struct ItemTemplate(Arc<dyn Fn() -> TemplateContent + Send + Sync>);

impl ItemTemplate {
    pub fn new<F>(create: F) -> Self
    where
        F: Fn() -> TemplateContent + Send + Sync + 'static,
    {
        Self(Arc::new(create))
    }

    pub fn create_content(&self) -> TemplateContent {
        (self.0)()
    }
}

impl fmt::Debug for ItemTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ItemTemplate")
    }
}

/// Picks a template per item.
pub type TemplateSelector = Arc<dyn Fn(&Item, usize) -> Option<ItemTemplate> + Send + Sync>;

/// Custom item-to-node callback. Returning `None` is a configuration error.
pub type ItemNodeFactory = Arc<dyn Fn(&Item) -> Option<NodeRef> + Send + Sync>;

#[derive(Clone, Default)]
pub struct ViewFactory {
    item_template: Option<ItemTemplate>,
    item_template_selector: Option<TemplateSelector>,
    item_node_factory: Option<ItemNodeFactory>,
}

impl fmt::Debug for ViewFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewFactory")
            .field("item_template", &self.item_template.is_some())
            .field("item_template_selector", &self.item_template_selector.is_some())
            .field("item_node_factory", &self.item_node_factory.is_some())
            .finish()
    }
}

impl ViewFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_item_template(&mut self, template: Option<ItemTemplate>) {
        self.item_template = template;
    }

    pub fn set_item_template_selector(&mut self, selector: Option<TemplateSelector>) {
        self.item_template_selector = selector;
    }

    pub fn set_item_node_factory(&mut self, factory: Option<ItemNodeFactory>) {
        self.item_node_factory = factory;
    }

    pub fn create_node(&self, descriptor: &ItemDescriptor) -> Result<NodeRef, SwitcherError> {
        if let Some(entry) = &descriptor.state_entry {
            return Ok(self.create_from_state_entry(entry));
        }

        if let Some(view) = &descriptor.inline_view {
            return Ok(view.clone());
        }

        if let Item::Node(node) = &descriptor.item {
            return Ok(node.clone());
        }

        if let Some(factory) = &self.item_node_factory {
            return factory(&descriptor.item).ok_or_else(|| {
                tracing::warn!(index = descriptor.index, "Custom item node factory returned no node");
                SwitcherError::FactoryReturnedNothing {
                    index: descriptor.index,
                }
            });
        }

        if let Some(template) = self.resolve_template(&descriptor.item, descriptor.index) {
            match template.create_content() {
                TemplateContent::Node(node) => return Ok(node),
                TemplateContent::Cell(Some(node)) => return Ok(node),
                TemplateContent::Cell(None) | TemplateContent::Empty => {}
            }
        }

        Ok(Arc::new(TextNode::new(descriptor.item.display_text())))
    }

    fn create_from_state_entry(&self, entry: &StateEntry) -> NodeRef {
        if let Some(content) = entry.content() {
            return content.clone();
        }

        let node: NodeRef = match entry.node_type() {
            Some(build) => build(),
            None => Arc::new(TextNode::new(String::new())),
        };

        if node.data_context().is_none() {
            if let Some(build_context) = entry.context_type() {
                node.set_data_context(Some(build_context()));
            }
        }

        node
    }

    fn resolve_template(&self, item: &Item, index: usize) -> Option<ItemTemplate> {
        match &self.item_template_selector {
            Some(select) => select(item, index),
            None => self.item_template.clone(),
        }
    }
}
