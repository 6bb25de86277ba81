//! Mock nodes, contexts and strategies for driving the switcher in tests.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use viewswitch::lifecycle::Lifecycle;
use viewswitch::node::{ContextSlot, DataRef, ItemData, NodeRef, VisualNode};
use viewswitch::transition::{AnimationCoordinator, AnimationOptions, TransitionError, TransitionRequest, ViewTransition};

/// Counts every lifecycle hook invocation.
#[derive(Debug, Default)]
pub struct HookCounts {
    initialize: AtomicUsize,
    appearing: AtomicUsize,
    disappearing: AtomicUsize,
    dispose: AtomicUsize,
    fail_appearing: AtomicBool,
}

impl HookCounts {
    pub fn initialize(&self) -> usize {
        self.initialize.load(Ordering::SeqCst)
    }

    pub fn appearing(&self) -> usize {
        self.appearing.load(Ordering::SeqCst)
    }

    pub fn disappearing(&self) -> usize {
        self.disappearing.load(Ordering::SeqCst)
    }

    pub fn dispose(&self) -> usize {
        self.dispose.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.initialize() + self.appearing() + self.disappearing() + self.dispose()
    }

    /// Make `appearing` fail after counting.
    pub fn fail_appearing(&self) {
        self.fail_appearing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Lifecycle for HookCounts {
    async fn initialize(&self) -> anyhow::Result<()> {
        self.initialize.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn appearing(&self) -> anyhow::Result<()> {
        self.appearing.fetch_add(1, Ordering::SeqCst);
        if self.fail_appearing.load(Ordering::SeqCst) {
            anyhow::bail!("appearing failed");
        }
        Ok(())
    }

    async fn disappearing(&self) -> anyhow::Result<()> {
        self.disappearing.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dispose(&self) -> anyhow::Result<()> {
        self.dispose.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A node that records hooks, opacity and cancelled animations.
pub struct MockNode {
    label: String,
    context: ContextSlot,
    opacity: Mutex<f32>,
    cancelled_animations: AtomicUsize,
    pub hooks: HookCounts,
}

impl MockNode {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            context: ContextSlot::new(),
            opacity: Mutex::new(1.0),
            cancelled_animations: AtomicUsize::new(0),
            hooks: HookCounts::default(),
        }
    }

    /// Node created with an explicit binding context.
    pub fn with_context(label: impl Into<String>, context: DataRef) -> Self {
        let node = Self::new(label);
        node.context.set(Some(context));
        node
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn opacity(&self) -> f32 {
        *self.opacity.lock()
    }

    pub fn cancelled_animations(&self) -> usize {
        self.cancelled_animations.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for MockNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MockNode({})", self.label)
    }
}

impl VisualNode for MockNode {
    fn data_context(&self) -> Option<DataRef> {
        self.context.get()
    }

    fn set_data_context(&self, context: Option<DataRef>) {
        self.context.set(context);
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(&self.hooks)
    }

    fn cancel_animations(&self) {
        self.cancelled_animations.fetch_add(1, Ordering::SeqCst);
    }

    fn set_opacity(&self, opacity: f32) {
        *self.opacity.lock() = opacity;
    }
}

/// Data context with its own hooks.
#[derive(Debug, Default)]
pub struct MockContext {
    pub name: String,
    pub hooks: HookCounts,
}

impl MockContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: HookCounts::default(),
        }
    }
}

impl ItemData for MockContext {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn display_text(&self) -> String {
        self.name.clone()
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        Some(&self.hooks)
    }
}

/// Strategy that holds every non-initial hand-off until released.
#[derive(Debug, Default)]
pub struct GatedTransition {
    started: AtomicUsize,
    completed: AtomicUsize,
    release: Notify,
}

impl GatedTransition {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Let one blocked (or the next) hand-off finish.
    pub fn release_one(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl ViewTransition for GatedTransition {
    async fn run(&self, request: &TransitionRequest, cancel: &CancellationToken) -> Result<(), TransitionError> {
        if request.old.is_none() && request.new.is_none() {
            return Ok(());
        }
        if request.is_initial {
            return Ok(());
        }

        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = cancel.cancelled() => Err(TransitionError::Cancelled),
            _ = self.release.notified() => {
                self.completed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

/// Host animation coordinator that records what it was asked to play.
#[derive(Debug, Default)]
pub struct RecordingCoordinator {
    plays: Mutex<Vec<(String, Option<String>, Option<String>)>>,
}

impl RecordingCoordinator {
    /// `(key, entering, exiting)` per play, nodes rendered with `Debug`.
    pub fn plays(&self) -> Vec<(String, Option<String>, Option<String>)> {
        self.plays.lock().clone()
    }
}

#[async_trait]
impl AnimationCoordinator for RecordingCoordinator {
    async fn play_transition(
        &self,
        key: &str,
        entering: Option<&NodeRef>,
        exiting: Option<&NodeRef>,
        _options: AnimationOptions,
        _cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        self.plays.lock().push((
            key.to_string(),
            entering.map(|node| format!("{node:?}")),
            exiting.map(|node| format!("{node:?}")),
        ));
        Ok(())
    }
}
