//! Minimal text-displaying node used as the factory fallback.

use std::fmt;

use parking_lot::Mutex;

use super::context::ContextSlot;
use super::item::DataRef;
use super::VisualNode;

/// A node that shows a single line of text.
pub struct TextNode {
    text: Mutex<String>,
    opacity: Mutex<f32>,
    context: ContextSlot,
}

impl TextNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(text.into()),
            opacity: Mutex::new(1.0),
            context: ContextSlot::new(),
        }
    }

    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock() = text.into();
    }

    pub fn opacity(&self) -> f32 {
        *self.opacity.lock()
    }
}

impl fmt::Debug for TextNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextNode").field("text", &*self.text.lock()).finish()
    }
}

impl VisualNode for TextNode {
    fn data_context(&self) -> Option<DataRef> {
        self.context.get()
    }

    fn set_data_context(&self, context: Option<DataRef>) {
        self.context.set(context);
    }

    fn set_opacity(&self, opacity: f32) {
        *self.opacity.lock() = opacity.clamp(0.0, 1.0);
    }
}
