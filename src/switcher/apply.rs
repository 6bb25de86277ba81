//! The serialized apply-selection routine.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::SwitcherError;
use crate::node::{node_key, same_optional_item, same_optional_node, Item, NodeRef};
use crate::registry::ItemDescriptor;
use crate::selection::{SelectionSnapshot, SelectionSource};

use super::events::{SelectionChanged, SelectionChanging, SwitcherProperty};
use super::queue::SelectionOutcome;
use super::{EngineState, Presented, Request, ViewSwitcher};

/// Where a request points once resolved against the registry.
enum Target {
    /// A normalized index; `None` is no selection.
    Index(Option<usize>),
    /// A key or item that matches no entry.
    Unresolved,
}

impl ViewSwitcher {
    pub(super) async fn apply_selection(
        &self,
        request: Request,
        animate: Option<bool>,
        cancel: CancellationToken,
    ) -> Result<SelectionOutcome, SwitcherError> {
        if cancel.is_cancelled() {
            return Err(SwitcherError::Cancelled);
        }

        let shared = &self.shared;
        let previous = shared.selection.snapshot();
        let reconcile = matches!(request, Request::Reconcile);

        let resolved = {
            let state = shared.state.lock();
            self.resolve_target(&state, &request, &previous)
        };
        let index = match resolved {
            Ok(Target::Index(index)) => index,
            Ok(Target::Unresolved) => {
                tracing::debug!(request = ?request, "Selection request matched no entry");
                self.revert_properties();
                self.drain_pending_disposal().await;
                return Ok(SelectionOutcome::Unchanged);
            }
            Err(err) => {
                tracing::warn!(request = ?request, error = %err, "Selection request rejected");
                self.revert_properties();
                return Err(err);
            }
        };

        let (target, descriptor, presented, already_presented) = {
            let state = shared.state.lock();
            let descriptor = index.and_then(|index| state.registry.get(index)).cloned();
            let target = match &descriptor {
                Some(descriptor) => SelectionSnapshot {
                    index: Some(descriptor.index),
                    item: Some(descriptor.item.clone()),
                    state_key: descriptor.lookup_key().map(str::to_string),
                },
                None => SelectionSnapshot::empty(),
            };
            let presented = Presented {
                index: target.index,
                generation: state.registry.generation(),
            };
            let already_presented = state.presented == presented;
            (target, descriptor, presented, already_presented)
        };

        if already_presented {
            self.push_properties(&previous, &target);
            self.drain_pending_disposal().await;
            return Ok(SelectionOutcome::Unchanged);
        }

        if !reconcile {
            let args = SelectionChanging::new(previous.clone(), target.clone());
            if shared.handlers.raise_changing(self, &args) {
                tracing::debug!(old_index = ?previous.index, new_index = ?target.index, "Selection change vetoed");
                self.revert_properties();
                return Ok(SelectionOutcome::Vetoed);
            }
            if cancel.is_cancelled() {
                self.revert_properties();
                return Err(SwitcherError::Cancelled);
            }
        }

        let incoming = match &descriptor {
            Some(descriptor) => match self.resolve_node(descriptor, presented.generation).await {
                Ok(node) => Some(node),
                Err(err) => {
                    self.revert_properties();
                    return Err(err);
                }
            },
            None => None,
        };

        shared.selection.update_snapshot(target.clone());
        self.push_properties(&previous, &target);
        self.refresh_navigation();
        self.refresh_automation(&target);

        let outgoing = shared.transitions.current();
        let differs = !same_optional_node(outgoing.as_ref(), incoming.as_ref());
        let is_initial = shared.state.lock().is_initial;

        let staged = async {
            if differs {
                if let Some(old) = &outgoing {
                    shared.lifecycle.disappearing(old, &cancel).await?;
                }
            }
            if let Some(new) = &incoming {
                shared.lifecycle.ensure_initialized(new, &cancel).await?;
            }
            shared
                .transitions
                .switch(incoming.clone(), is_initial, animate, &cancel)
                .await?;
            Ok::<(), SwitcherError>(())
        }
        .await;

        if let Err(err) = staged {
            self.roll_back(&previous, outgoing.as_ref(), incoming.as_ref(), differs).await;
            return Err(err);
        }

        let appeared = match (&incoming, differs) {
            (Some(new), true) => shared.lifecycle.appearing(new, &cancel).await,
            _ => Ok(()),
        };

        self.settle(outgoing.as_ref(), incoming.as_ref(), presented).await;
        appeared?;
        if cancel.is_cancelled() {
            return Err(SwitcherError::Cancelled);
        }

        if !differs && !snapshot_differs(&previous, &target) {
            return Ok(SelectionOutcome::Unchanged);
        }

        tracing::debug!(
            old_index = ?previous.index,
            new_index = ?target.index,
            state_key = ?target.state_key,
            "Selection applied"
        );
        let changed = SelectionChanged {
            old: previous,
            new: target,
        };
        shared.handlers.raise_changed(self, &changed);
        Ok(SelectionOutcome::Applied)
    }

    fn resolve_target(
        &self,
        state: &EngineState,
        request: &Request,
        previous: &SelectionSnapshot,
    ) -> Result<Target, SwitcherError> {
        let registry = &state.registry;
        let found = |index: Option<usize>| index.map_or(Target::Unresolved, |index| Target::Index(Some(index)));

        match request {
            Request::Index(requested) => self
                .shared
                .selection
                .normalize_index(*requested, registry.len())
                .map(Target::Index),
            Request::StateKey(key) => Ok(found(registry.index_of_key(key))),
            Request::Item(item) => Ok(found(registry.index_of_item(item))),
            Request::Reconcile => Ok(Target::Index(
                registry.reselect(previous, self.shared.selection.index_behavior()),
            )),
        }
    }

    /// Cached node for the descriptor, or a fresh one from the factory.
    /// Fails with [`SwitcherError::Cancelled`] when the registry was rebuilt
    /// after `generation` was read, since the descriptor is then stale.
    async fn resolve_node(&self, descriptor: &ItemDescriptor, generation: u64) -> Result<NodeRef, SwitcherError> {
        let key = descriptor.lookup_key();
        let factory = {
            let state = self.shared.state.lock();
            if state.registry.generation() != generation {
                return Err(SwitcherError::Cancelled);
            }
            let cached = match key {
                Some(key) => state.cache.get_by_key(key),
                None => state.cache.get_by_index(descriptor.index),
            };
            if let Some(node) = cached {
                return Ok(node);
            }
            state.factory.clone()
        };

        // Factories run host code, so no engine lock is held here.
        let node = factory.create_node(descriptor)?;

        let orphaned = {
            let mut state = self.shared.state.lock();
            if state.registry.generation() == generation {
                bind_context(&mut state, &node, &descriptor.item);
                match key {
                    Some(key) => state.cache.store_by_key(key, node.clone()),
                    None => state.cache.store_by_index(descriptor.index, node.clone()),
                }
                return Ok(node);
            }
            !state.retains(&node)
        };

        tracing::debug!(index = descriptor.index, "Registry rebuilt while creating node, discarding it");
        if orphaned {
            self.dispose_node(&node).await;
        }
        Err(SwitcherError::Cancelled)
    }

    /// Undo a commit whose hand-off failed or was cancelled. The outgoing
    /// node is still in the slot.
    async fn roll_back(
        &self,
        previous: &SelectionSnapshot,
        outgoing: Option<&NodeRef>,
        incoming: Option<&NodeRef>,
        differs: bool,
    ) {
        let shared = &self.shared;
        shared.selection.update_snapshot(previous.clone());
        self.revert_properties();
        self.refresh_navigation();
        self.refresh_automation(previous);

        if !differs {
            return;
        }

        if let Some(old) = outgoing {
            if same_optional_node(shared.transitions.current().as_ref(), Some(old)) {
                if let Err(err) = shared.lifecycle.appearing(old, &CancellationToken::new()).await {
                    tracing::warn!(error = %err, "Restoring outgoing node failed");
                }
            }
        }

        if let Some(new) = incoming {
            let retained = shared.state.lock().retains(new);
            if !retained {
                self.dispose_node(new).await;
            }
        }
    }

    /// Book-keeping after a committed hand-off.
    async fn settle(&self, outgoing: Option<&NodeRef>, incoming: Option<&NodeRef>, presented: Presented) {
        let dispose = {
            let mut state = self.shared.state.lock();
            if incoming.is_some() {
                state.is_initial = false;
            }
            state.presented = presented;
            match outgoing {
                Some(old) if !same_optional_node(Some(old), incoming) && !state.retains(old) => {
                    let key = node_key(old);
                    state.pending_disposal.retain(|node| node_key(node) != key);
                    Some(old.clone())
                }
                _ => None,
            }
        };

        if let Some(old) = dispose {
            self.dispose_node(&old).await;
        }
        self.drain_pending_disposal().await;
    }

    /// Publish the properties that differ between `old` and `new`.
    fn push_properties(&self, old: &SelectionSnapshot, new: &SelectionSnapshot) {
        let selection = &self.shared.selection;
        if old.index != new.index {
            let _scope = selection.begin_update(SelectionSource::Index);
            self.raise_property(SwitcherProperty::SelectedIndex);
        }
        if !same_optional_item(old.item.as_ref(), new.item.as_ref()) {
            let _scope = selection.begin_update(SelectionSource::Item);
            self.raise_property(SwitcherProperty::SelectedItem);
        }
        if old.state_key != new.state_key {
            let _scope = selection.begin_update(SelectionSource::StateKey);
            self.raise_property(SwitcherProperty::SelectedStateKey);
        }
    }

    /// Re-publish all three properties from the authoritative snapshot so
    /// bound hosts drop whatever value they pushed.
    fn revert_properties(&self) {
        let selection = &self.shared.selection;
        for (source, property) in [
            (SelectionSource::Index, SwitcherProperty::SelectedIndex),
            (SelectionSource::Item, SwitcherProperty::SelectedItem),
            (SelectionSource::StateKey, SwitcherProperty::SelectedStateKey),
        ] {
            let _scope = selection.begin_update(source);
            self.raise_property(property);
        }
    }
}

/// Keep an explicit context, else bind plain data items, else inherit the
/// ambient context.
fn bind_context(state: &mut EngineState, node: &NodeRef, item: &Item) {
    if node.data_context().is_some() {
        return;
    }
    if let Item::Data(data) = item {
        node.set_data_context(Some(data.clone()));
        return;
    }
    node.set_data_context(state.ambient_context.clone());
    state.inherited.insert(node_key(node), Arc::downgrade(node));
}

fn snapshot_differs(a: &SelectionSnapshot, b: &SelectionSnapshot) -> bool {
    a.index != b.index || a.state_key != b.state_key || !same_optional_item(a.item.as_ref(), b.item.as_ref())
}
