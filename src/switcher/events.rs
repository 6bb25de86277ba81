//! Change notifications raised by the switcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::selection::SelectionSnapshot;

use super::ViewSwitcher;

/// Raised before a selection is committed. Any handler may veto it.
#[derive(Debug)]
pub struct SelectionChanging {
    pub old: SelectionSnapshot,
    pub new: SelectionSnapshot,
    cancel: AtomicBool,
}

impl SelectionChanging {
    pub(crate) fn new(old: SelectionSnapshot, new: SelectionSnapshot) -> Self {
        Self {
            old,
            new,
            cancel: AtomicBool::new(false),
        }
    }

    /// Veto the pending selection.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }
}

/// Raised after a selection has been presented.
#[derive(Debug, Clone)]
pub struct SelectionChanged {
    pub old: SelectionSnapshot,
    pub new: SelectionSnapshot,
}

/// Observable properties of the switcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitcherProperty {
    SelectedIndex,
    SelectedItem,
    SelectedStateKey,
    CanGoNext,
    CanGoPrevious,
    AutomationDescription,
}

pub type ChangingHandler = Arc<dyn Fn(&ViewSwitcher, &SelectionChanging) -> anyhow::Result<()> + Send + Sync>;
pub type ChangedHandler = Arc<dyn Fn(&ViewSwitcher, &SelectionChanged) -> anyhow::Result<()> + Send + Sync>;
pub type PropertyObserver = Arc<dyn Fn(&ViewSwitcher, SwitcherProperty) -> anyhow::Result<()> + Send + Sync>;

/// Registered handlers. Invoked without any engine lock held, so handlers
/// may call back into the switcher.
#[derive(Default)]
pub(crate) struct Handlers {
    changing: RwLock<Vec<ChangingHandler>>,
    changed: RwLock<Vec<ChangedHandler>>,
    property: RwLock<Vec<PropertyObserver>>,
}

impl Handlers {
    pub(crate) fn add_changing(&self, handler: ChangingHandler) {
        self.changing.write().push(handler);
    }

    pub(crate) fn add_changed(&self, handler: ChangedHandler) {
        self.changed.write().push(handler);
    }

    pub(crate) fn add_property(&self, observer: PropertyObserver) {
        self.property.write().push(observer);
    }

    /// Returns true when some handler vetoed the change.
    pub(crate) fn raise_changing(&self, switcher: &ViewSwitcher, args: &SelectionChanging) -> bool {
        let handlers = self.changing.read().clone();
        for handler in handlers {
            if let Err(err) = handler(switcher, args) {
                tracing::warn!(error = %err, "Selection changing handler failed");
            }
        }
        args.is_cancelled()
    }

    pub(crate) fn raise_changed(&self, switcher: &ViewSwitcher, args: &SelectionChanged) {
        let handlers = self.changed.read().clone();
        for handler in handlers {
            if let Err(err) = handler(switcher, args) {
                tracing::warn!(error = %err, "Selection changed handler failed");
            }
        }
    }

    pub(crate) fn raise_property(&self, switcher: &ViewSwitcher, property: SwitcherProperty) {
        let observers = self.property.read().clone();
        for observer in observers {
            if let Err(err) = observer(switcher, property) {
                tracing::warn!(property = ?property, error = %err, "Property observer failed");
            }
        }
    }
}
