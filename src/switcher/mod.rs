//! The view switcher facade.
//!
//! Every trigger (explicit call, bound property push, collection mutation)
//! becomes a request on the single-slot queue and runs through the same
//! serialized apply routine.

mod apply;
mod builder;
mod events;
mod queue;

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::cache::ViewCache;
use crate::config::SwitcherConfig;
use crate::error::SwitcherError;
use crate::factory::{ItemNodeFactory, ItemTemplate, TemplateSelector, ViewFactory};
use crate::lifecycle::LifecycleCoordinator;
use crate::node::{node_key, same_node, DataRef, Item, NodeRef, Presenter, VisualNode};
use crate::registry::{DescriptorRegistry, DescriptorSource, StateEntry};
use crate::selection::{IndexBehavior, SelectionSnapshot, SelectionSource, SelectionState};
use crate::transition::{Easing, TransitionCoordinator, ViewTransition};

pub use builder::ViewSwitcherBuilder;
pub use events::{
    ChangedHandler, ChangingHandler, PropertyObserver, SelectionChanged, SelectionChanging, SwitcherProperty,
};
pub use queue::{OperationStatus, SelectionOutcome};

use events::Handlers;
use queue::{SelectionQueue, Ticket};

/// Per-call options for awaited selection requests.
#[derive(Debug, Clone, Default)]
pub struct SwitchOptions {
    /// Overrides the switcher's animation flag for this request only.
    pub animate: Option<bool>,
    /// Caller-owned cancellation linked into the operation.
    pub cancel: Option<CancellationToken>,
}

impl SwitchOptions {
    pub fn animated(animate: bool) -> Self {
        Self {
            animate: Some(animate),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

#[derive(Debug, Clone)]
enum Request {
    Index(i64),
    StateKey(String),
    Item(Item),
    /// Re-resolve the selection against a rebuilt registry.
    Reconcile,
}

/// What is currently in the slot, as of which registry generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Presented {
    index: Option<usize>,
    generation: u64,
}

struct EngineState {
    registry: DescriptorRegistry,
    cache: ViewCache,
    factory: ViewFactory,
    ambient_context: Option<DataRef>,
    /// Nodes whose context was inherited from the ambient context.
    inherited: HashMap<usize, Weak<dyn VisualNode>>,
    /// Evicted nodes waiting to leave the slot before disposal.
    pending_disposal: Vec<NodeRef>,
    is_initial: bool,
    presented: Presented,
    automation_template: Option<String>,
    automation_description: Option<String>,
    can_go_next: bool,
    can_go_previous: bool,
}

impl EngineState {
    /// Still referenced by the cache or a live explicit collection entry.
    fn retains(&self, node: &NodeRef) -> bool {
        self.cache.contains(node) || self.registry.owns(node)
    }

    fn evict_cache(&mut self) {
        let evicted = self.cache.clear();
        self.pending_disposal.extend(evicted);
    }
}

struct Shared {
    runtime: Handle,
    selection: SelectionState,
    queue: SelectionQueue,
    transitions: TransitionCoordinator,
    lifecycle: LifecycleCoordinator,
    handlers: Handlers,
    state: Mutex<EngineState>,
}

/// Multiplexes one presentation slot among many candidate nodes.
///
/// Cheap to clone; clones share the same engine.
#[derive(Clone)]
pub struct ViewSwitcher {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ViewSwitcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewSwitcher")
            .field("selection", &self.shared.selection.snapshot())
            .field("status", &self.shared.queue.status())
            .field("current", &self.shared.transitions.current())
            .finish()
    }
}

impl ViewSwitcher {
    pub fn builder(presenter: Arc<dyn Presenter>) -> ViewSwitcherBuilder {
        ViewSwitcherBuilder::new(presenter)
    }

    /// Switcher with default settings on the current Tokio runtime.
    pub fn new(presenter: Arc<dyn Presenter>) -> Result<Self, SwitcherError> {
        Self::builder(presenter).build()
    }

    // Selection requests

    pub async fn switch_to(&self, index: i64) -> Result<SelectionOutcome, SwitcherError> {
        self.switch_to_with(index, SwitchOptions::default()).await
    }

    pub async fn switch_to_with(&self, index: i64, options: SwitchOptions) -> Result<SelectionOutcome, SwitcherError> {
        self.request(Request::Index(index), options).await
    }

    /// Select the entry with `key`. Unknown or blank keys leave the
    /// selection unchanged.
    pub async fn switch_to_state(&self, key: &str) -> Result<SelectionOutcome, SwitcherError> {
        self.switch_to_state_with(key, SwitchOptions::default()).await
    }

    pub async fn switch_to_state_with(
        &self,
        key: &str,
        options: SwitchOptions,
    ) -> Result<SelectionOutcome, SwitcherError> {
        self.request(Request::StateKey(key.to_string()), options).await
    }

    /// Select the entry backed by `item` (reference or value equality).
    pub async fn select_item(&self, item: Item) -> Result<SelectionOutcome, SwitcherError> {
        self.request(Request::Item(item), SwitchOptions::default()).await
    }

    /// Advance one entry; from no selection, go to the first.
    pub async fn next(&self) -> Result<SelectionOutcome, SwitcherError> {
        let target = match self.selected_index() {
            Some(index) => index as i64 + 1,
            None => 0,
        };
        self.switch_to(target).await
    }

    /// Go back one entry; from the first entry this requests no selection.
    pub async fn previous(&self) -> Result<SelectionOutcome, SwitcherError> {
        let target = match self.selected_index() {
            Some(index) if index > 0 => index as i64 - 1,
            _ => -1,
        };
        self.switch_to(target).await
    }

    // Bindable properties

    pub fn selected_index(&self) -> Option<usize> {
        self.shared.selection.selected_index()
    }

    pub fn selected_item(&self) -> Option<Item> {
        self.shared.selection.selected_item()
    }

    pub fn selected_state_key(&self) -> Option<String> {
        self.shared.selection.selected_state_key()
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        self.shared.selection.snapshot()
    }

    /// Property push from a host binding. Ignored while the engine itself
    /// is publishing the index.
    pub fn set_selected_index(&self, index: i64) {
        if self.shared.selection.should_ignore(SelectionSource::Index) {
            return;
        }
        self.enqueue(Request::Index(index));
    }

    /// Property push from a host binding. `None` clears the selection.
    pub fn set_selected_item(&self, item: Option<Item>) {
        if self.shared.selection.should_ignore(SelectionSource::Item) {
            return;
        }
        match item {
            Some(item) => self.enqueue(Request::Item(item)),
            None => self.enqueue(Request::Index(-1)),
        }
    }

    /// Property push from a host binding. `None` and blank keys are ignored.
    pub fn set_selected_state_key(&self, key: Option<String>) {
        if self.shared.selection.should_ignore(SelectionSource::StateKey) {
            return;
        }
        if let Some(key) = key.filter(|key| !key.trim().is_empty()) {
            self.enqueue(Request::StateKey(key));
        }
    }

    // Collections

    pub fn set_views(&self, views: Vec<NodeRef>) {
        self.restructure(|state| state.registry.set_views(views));
    }

    pub fn modify_views(&self, modify: impl FnOnce(&mut Vec<NodeRef>)) {
        self.restructure(|state| state.registry.modify_views(modify));
    }

    pub fn set_items_source(&self, items: Option<Vec<Item>>) {
        self.restructure(|state| state.registry.set_items_source(items));
    }

    pub fn modify_items_source(&self, modify: impl FnOnce(&mut Vec<Item>)) {
        self.restructure(|state| state.registry.modify_items_source(modify));
    }

    pub fn set_state_entries(&self, entries: Vec<StateEntry>) {
        self.restructure(|state| state.registry.set_state_entries(entries));
    }

    pub fn modify_state_entries(&self, modify: impl FnOnce(&mut Vec<Arc<StateEntry>>)) {
        self.restructure(|state| state.registry.modify_state_entries(modify));
    }

    /// Number of switchable entries.
    pub fn len(&self) -> usize {
        self.shared.state.lock().registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.state.lock().registry.is_empty()
    }

    pub fn descriptor_source(&self) -> DescriptorSource {
        self.shared.state.lock().registry.source()
    }

    // Navigation

    pub fn can_go_next(&self) -> bool {
        self.shared.state.lock().can_go_next
    }

    pub fn can_go_previous(&self) -> bool {
        self.shared.state.lock().can_go_previous
    }

    // Presentation

    /// The node currently committed to the slot.
    pub fn current_node(&self) -> Option<NodeRef> {
        self.shared.transitions.current()
    }

    pub fn presenter(&self) -> &Arc<dyn Presenter> {
        self.shared.transitions.presenter()
    }

    pub fn automation_description(&self) -> Option<String> {
        self.shared.state.lock().automation_description.clone()
    }

    pub fn operation_status(&self) -> OperationStatus {
        self.shared.queue.status()
    }

    /// Wait until no selection request is queued or running.
    pub async fn settled(&self) {
        self.shared.queue.settled().await;
    }

    // Runtime configuration

    pub fn cache_views(&self) -> bool {
        self.shared.state.lock().cache.is_enabled()
    }

    /// Toggle recycling. Disabling evicts every cached node; nodes not in
    /// the slot are disposed right away, the presented one once it leaves.
    pub fn set_cache_views(&self, enabled: bool) {
        let evicted = {
            let mut state = self.shared.state.lock();
            let evicted = state.cache.set_enabled(enabled);
            let any = !evicted.is_empty();
            state.pending_disposal.extend(evicted);
            any
        };
        if evicted {
            self.schedule_disposal();
        }
    }

    pub fn animate(&self) -> bool {
        self.shared.transitions.settings().animate
    }

    pub fn set_animate(&self, animate: bool) {
        self.shared.transitions.update_settings(|settings| settings.animate = animate);
    }

    pub fn transition_duration(&self) -> Duration {
        self.shared.transitions.settings().duration
    }

    pub fn set_transition_duration(&self, duration: Duration) {
        self.shared.transitions.update_settings(|settings| settings.duration = duration);
    }

    pub fn easing(&self) -> Easing {
        self.shared.transitions.settings().easing
    }

    pub fn set_easing(&self, easing: Easing) {
        self.shared.transitions.update_settings(|settings| settings.easing = easing);
    }

    pub fn set_transition_strategy(&self, strategy: Arc<dyn ViewTransition>) {
        self.shared.transitions.update_settings(|settings| settings.strategy = strategy);
    }

    pub fn index_behavior(&self) -> IndexBehavior {
        self.shared.selection.index_behavior()
    }

    pub fn set_index_behavior(&self, behavior: IndexBehavior) {
        self.shared.selection.set_index_behavior(behavior);
        self.refresh_navigation();
    }

    pub fn set_item_template(&self, template: Option<ItemTemplate>) {
        self.restructure(|state| {
            state.factory.set_item_template(template);
            state.registry.rebuild();
        });
    }

    pub fn set_item_template_selector(&self, selector: Option<TemplateSelector>) {
        self.restructure(|state| {
            state.factory.set_item_template_selector(selector);
            state.registry.rebuild();
        });
    }

    pub fn set_item_node_factory(&self, factory: Option<ItemNodeFactory>) {
        self.restructure(|state| {
            state.factory.set_item_node_factory(factory);
            state.registry.rebuild();
        });
    }

    pub fn set_automation_description_template(&self, template: Option<String>) {
        self.shared.state.lock().automation_template = template;
        self.refresh_automation(&self.snapshot());
    }

    pub fn ambient_context(&self) -> Option<DataRef> {
        self.shared.state.lock().ambient_context.clone()
    }

    /// Replace the context inherited by nodes that have no context of their
    /// own. Nodes still bound to the previous ambient context are re-bound.
    pub fn set_ambient_context(&self, context: Option<DataRef>) {
        let mut state = self.shared.state.lock();
        let previous = std::mem::replace(&mut state.ambient_context, context.clone());
        state.inherited.retain(|_, node| {
            let Some(node) = node.upgrade() else {
                return false;
            };
            if !same_context(node.data_context().as_ref(), previous.as_ref()) {
                return false;
            }
            node.set_data_context(context.clone());
            true
        });
    }

    /// Apply every runtime-adjustable value from `config`.
    pub fn apply_config(&self, config: &SwitcherConfig) {
        self.set_cache_views(config.cache_views);
        self.shared.transitions.update_settings(|settings| {
            settings.animate = config.animate;
            settings.duration = config.transition_duration();
            settings.easing = config.easing;
        });
        self.set_index_behavior(config.index_behavior);
        self.set_automation_description_template(config.automation_description_template.clone());
    }

    // Handlers

    pub fn on_selection_changing<F>(&self, handler: F)
    where
        F: Fn(&ViewSwitcher, &SelectionChanging) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared.handlers.add_changing(Arc::new(handler));
    }

    pub fn on_selection_changed<F>(&self, handler: F)
    where
        F: Fn(&ViewSwitcher, &SelectionChanged) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared.handlers.add_changed(Arc::new(handler));
    }

    pub fn on_property_changed<F>(&self, observer: F)
    where
        F: Fn(&ViewSwitcher, SwitcherProperty) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.shared.handlers.add_property(Arc::new(observer));
    }

    /// Cancel pending work, take the current node out of the slot and
    /// dispose every node the engine created. Further requests fail with
    /// [`SwitcherError::ShutDown`].
    pub async fn shutdown(&self) {
        if self.shared.queue.is_shut_down() {
            return;
        }
        self.shared.queue.shutdown();
        self.shared.transitions.cancel_pending();
        self.shared.queue.settled().await;

        let current = self.shared.transitions.clear();
        if let Some(node) = &current {
            if let Err(err) = self.shared.lifecycle.disappearing(node, &CancellationToken::new()).await {
                tracing::warn!(error = %err, "Disappearing hook failed during shutdown");
            }
        }

        let doomed = {
            let mut state = self.shared.state.lock();
            let mut nodes = state.cache.clear();
            nodes.append(&mut std::mem::take(&mut state.pending_disposal));
            nodes.extend(current);
            let mut doomed: Vec<NodeRef> = Vec::new();
            for node in nodes {
                if !state.registry.owns(&node) && !doomed.iter().any(|seen| same_node(seen, &node)) {
                    doomed.push(node);
                }
            }
            doomed
        };

        for node in &doomed {
            self.dispose_node(node).await;
        }
        tracing::info!(disposed = doomed.len(), "View switcher shut down");
    }

    // Internals

    async fn request(&self, request: Request, options: SwitchOptions) -> Result<SelectionOutcome, SwitcherError> {
        let ticket = self.shared.queue.begin(options.cancel.as_ref())?;
        let handle = self.spawn(ticket, request, options.animate);
        match handle.await {
            Ok(result) => result,
            Err(err) => Err(SwitcherError::OperationPanicked {
                message: err.to_string(),
            }),
        }
    }

    /// Fire-and-forget request; failures are logged.
    fn enqueue(&self, request: Request) {
        let ticket = match self.shared.queue.begin(None) {
            Ok(ticket) => ticket,
            Err(err) => {
                tracing::debug!(request = ?request, error = %err, "Selection request dropped");
                return;
            }
        };
        let handle = self.spawn(ticket, request, None);
        self.shared.runtime.spawn(async move {
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => tracing::warn!(error = %err, "Selection request failed"),
                Err(err) => tracing::warn!(error = %err, "Selection request panicked"),
            }
        });
    }

    fn spawn(
        &self,
        ticket: Ticket,
        request: Request,
        animate: Option<bool>,
    ) -> tokio::task::JoinHandle<Result<SelectionOutcome, SwitcherError>> {
        let this = self.clone();
        self.shared.runtime.spawn(async move {
            let body = this.clone();
            this.shared
                .queue
                .execute(ticket, move |token| async move { body.apply_selection(request, animate, token).await })
                .await
        })
    }

    /// Mutate the registry or factory, evict the cache and re-resolve the
    /// selection.
    fn restructure(&self, mutate: impl FnOnce(&mut EngineState)) {
        {
            let mut state = self.shared.state.lock();
            mutate(&mut state);
            state.evict_cache();
        }
        self.refresh_navigation();
        self.enqueue(Request::Reconcile);
    }

    fn schedule_disposal(&self) {
        let reservation = self.shared.queue.reserve();
        let this = self.clone();
        self.shared.runtime.spawn(async move {
            this.shared
                .queue
                .serialized(reservation, this.drain_pending_disposal())
                .await;
        });
    }

    /// Dispose evicted nodes that have left the slot and are not held
    /// anywhere else.
    async fn drain_pending_disposal(&self) {
        let current = self.shared.transitions.current();
        let doomed = {
            let mut state = self.shared.state.lock();
            let pending = std::mem::take(&mut state.pending_disposal);
            let mut doomed: Vec<NodeRef> = Vec::new();
            for node in pending {
                if current.as_ref().is_some_and(|current| same_node(current, &node)) {
                    state.pending_disposal.push(node);
                } else if !state.retains(&node) && !doomed.iter().any(|seen| same_node(seen, &node)) {
                    doomed.push(node);
                }
            }
            doomed
        };

        for node in &doomed {
            self.dispose_node(node).await;
        }
    }

    async fn dispose_node(&self, node: &NodeRef) {
        self.shared.state.lock().inherited.remove(&node_key(node));
        self.shared.lifecycle.dispose(node).await;
    }

    fn raise_property(&self, property: SwitcherProperty) {
        self.shared.handlers.raise_property(self, property);
    }

    fn refresh_navigation(&self) {
        let behavior = self.shared.selection.index_behavior();
        let current = self.shared.selection.selected_index();
        let (next_changed, previous_changed) = {
            let mut state = self.shared.state.lock();
            let total = state.registry.len();
            let can_go_next = behavior.can_go_next(current, total);
            let can_go_previous = behavior.can_go_previous(current, total);
            let changed = (
                can_go_next != state.can_go_next,
                can_go_previous != state.can_go_previous,
            );
            state.can_go_next = can_go_next;
            state.can_go_previous = can_go_previous;
            changed
        };
        if next_changed {
            self.raise_property(SwitcherProperty::CanGoNext);
        }
        if previous_changed {
            self.raise_property(SwitcherProperty::CanGoPrevious);
        }
    }

    fn refresh_automation(&self, snapshot: &SelectionSnapshot) {
        let changed = {
            let mut state = self.shared.state.lock();
            let description = describe(state.automation_template.as_deref(), snapshot);
            let changed = description != state.automation_description;
            state.automation_description = description;
            changed
        };
        if changed {
            self.raise_property(SwitcherProperty::AutomationDescription);
        }
    }
}

/// Fill `{0}` in the template with the state key, else the item text.
fn describe(template: Option<&str>, snapshot: &SelectionSnapshot) -> Option<String> {
    let template = template.filter(|template| !template.trim().is_empty())?;
    let placeholder = snapshot
        .state_key
        .clone()
        .or_else(|| snapshot.item.as_ref().map(Item::display_text))
        .unwrap_or_default();
    Some(template.replace("{0}", &placeholder))
}

fn same_context(a: Option<&DataRef>, b: Option<&DataRef>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const (),
        (None, None) => true,
        _ => false,
    }
}
