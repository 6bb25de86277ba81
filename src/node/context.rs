//! Interior-mutable storage for a node's binding context.

use parking_lot::Mutex;

use super::item::DataRef;

/// Holds a node's data context behind a lock so `VisualNode` implementors
/// can expose `data_context`/`set_data_context` through `&self`.
#[derive(Debug, Default)]
pub struct ContextSlot {
    inner: Mutex<Option<DataRef>>,
}

impl ContextSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot pre-populated with an explicit context.
    pub fn with(context: DataRef) -> Self {
        Self {
            inner: Mutex::new(Some(context)),
        }
    }

    pub fn get(&self) -> Option<DataRef> {
        self.inner.lock().clone()
    }

    pub fn set(&self, context: Option<DataRef>) {
        *self.inner.lock() = context;
    }
}
