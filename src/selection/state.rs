//! Authoritative selection snapshot and re-entrancy guards.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use scopeguard::ScopeGuard;

use crate::error::SwitcherError;
use crate::node::Item;

use super::behavior::IndexBehavior;

/// Which bindable property a selection request came through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionSource {
    Index,
    Item,
    StateKey,
}

/// The single source of truth for what is selected.
#[derive(Debug, Clone, Default)]
pub struct SelectionSnapshot {
    /// `None` means no selection.
    pub index: Option<usize>,
    pub item: Option<Item>,
    pub state_key: Option<String>,
}

impl SelectionSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Scope that keeps an "updating from source" flag raised until dropped.
pub type UpdateScope<'a> = ScopeGuard<&'a AtomicBool, fn(&AtomicBool)>;

/// Selection snapshot plus per-source update flags.
///
/// The flags are atomics so a property-change observer can consult them
/// while the engine is in the middle of pushing values, without taking a
/// lock the observer might already hold.
#[derive(Debug)]
pub struct SelectionState {
    snapshot: RwLock<SelectionSnapshot>,
    behavior: RwLock<IndexBehavior>,
    updating_index: AtomicBool,
    updating_item: AtomicBool,
    updating_state_key: AtomicBool,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new(IndexBehavior::default())
    }
}

impl SelectionState {
    pub fn new(behavior: IndexBehavior) -> Self {
        Self {
            snapshot: RwLock::new(SelectionSnapshot::empty()),
            behavior: RwLock::new(behavior),
            updating_index: AtomicBool::new(false),
            updating_item: AtomicBool::new(false),
            updating_state_key: AtomicBool::new(false),
        }
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        self.snapshot.read().clone()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.snapshot.read().index
    }

    pub fn selected_item(&self) -> Option<Item> {
        self.snapshot.read().item.clone()
    }

    pub fn selected_state_key(&self) -> Option<String> {
        self.snapshot.read().state_key.clone()
    }

    pub fn index_behavior(&self) -> IndexBehavior {
        *self.behavior.read()
    }

    pub fn set_index_behavior(&self, behavior: IndexBehavior) {
        *self.behavior.write() = behavior;
    }

    /// True while the engine itself is assigning the property for `source`.
    pub fn should_ignore(&self, source: SelectionSource) -> bool {
        self.flag(source).load(Ordering::SeqCst)
    }

    /// Raise the update flag for `source` until the returned scope drops.
    pub fn begin_update(&self, source: SelectionSource) -> UpdateScope<'_> {
        let flag = self.flag(source);
        flag.store(true, Ordering::SeqCst);
        scopeguard::guard(flag, lower_flag as fn(&AtomicBool))
    }

    /// Normalize against the current policy and selection.
    pub fn normalize_index(&self, requested: i64, total: usize) -> Result<Option<usize>, SwitcherError> {
        self.index_behavior()
            .normalize(requested, total, self.selected_index())
    }

    pub fn update_snapshot(&self, snapshot: SelectionSnapshot) {
        *self.snapshot.write() = snapshot;
    }

    pub fn reset(&self) {
        *self.snapshot.write() = SelectionSnapshot::empty();
    }

    fn flag(&self, source: SelectionSource) -> &AtomicBool {
        match source {
            SelectionSource::Index => &self.updating_index,
            SelectionSource::Item => &self.updating_item,
            SelectionSource::StateKey => &self.updating_state_key,
        }
    }
}

fn lower_flag(flag: &AtomicBool) {
    flag.store(false, Ordering::SeqCst);
}
