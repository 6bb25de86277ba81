//! Lifecycle hooks for presented nodes and their data contexts.
//!
//! Hooks are optional on both the node and, independently, its data
//! context. `initialize` runs once per instance, `appearing`/`disappearing`
//! once per entry into and exit from the slot, and `dispose` once when the
//! instance is permanently evicted.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::SwitcherError;
use crate::node::{DataRef, ItemData, NodeRef, VisualNode};

/// Optional lifecycle capability. Every hook defaults to a no-op.
#[async_trait]
pub trait Lifecycle: Send + Sync {
    async fn initialize(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn appearing(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn disappearing(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn dispose(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Which hook is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Initialize,
    Appearing,
    Disappearing,
    Dispose,
}

enum Target {
    Node(NodeRef),
    Context(DataRef),
}

impl Target {
    fn key(&self) -> usize {
        match self {
            Target::Node(node) => Arc::as_ptr(node) as *const () as usize,
            Target::Context(context) => Arc::as_ptr(context) as *const () as usize,
        }
    }

    fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        match self {
            Target::Node(node) => node.lifecycle(),
            Target::Context(context) => context.lifecycle(),
        }
    }

    fn downgrade(&self) -> WeakTarget {
        match self {
            Target::Node(node) => WeakTarget::Node(Arc::downgrade(node)),
            Target::Context(context) => WeakTarget::Context(Arc::downgrade(context)),
        }
    }
}

// Holding a weak reference pins the allocation, so a tracked address is
// never reused by a different instance while its entry exists.
enum WeakTarget {
    Node(Weak<dyn VisualNode>),
    Context(Weak<dyn ItemData>),
}

impl WeakTarget {
    fn is_alive(&self) -> bool {
        match self {
            WeakTarget::Node(node) => node.strong_count() > 0,
            WeakTarget::Context(context) => context.strong_count() > 0,
        }
    }
}

struct Tracked {
    target: WeakTarget,
    initialized: bool,
    appeared: bool,
    disposed: bool,
}

/// Tracks per-instance hook state and runs hooks under cancellation.
#[derive(Default)]
pub struct LifecycleCoordinator {
    tracked: Mutex<HashMap<usize, Tracked>>,
}

impl std::fmt::Debug for LifecycleCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleCoordinator")
            .field("tracked", &self.tracked.lock().len())
            .finish()
    }
}

impl LifecycleCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `initialize` on the node and its context unless already done.
    pub async fn ensure_initialized(&self, node: &NodeRef, cancel: &CancellationToken) -> Result<(), SwitcherError> {
        for target in targets(node) {
            let run = self.transition(&target, |tracked| {
                if tracked.initialized {
                    return false;
                }
                tracked.disposed = false;
                true
            });
            if !run {
                continue;
            }
            if invoke(&target, Hook::Initialize, Some(cancel)).await? {
                self.update(&target, |tracked| tracked.initialized = true);
            }
        }
        Ok(())
    }

    /// Run `appearing` on the node and its context if they are not already visible.
    pub async fn appearing(&self, node: &NodeRef, cancel: &CancellationToken) -> Result<(), SwitcherError> {
        for target in targets(node) {
            if !self.transition(&target, |tracked| !tracked.appeared) {
                continue;
            }
            invoke(&target, Hook::Appearing, Some(cancel)).await?;
            self.update(&target, |tracked| tracked.appeared = true);
        }
        Ok(())
    }

    /// Run `disappearing` on the node and its context if they are visible.
    pub async fn disappearing(&self, node: &NodeRef, cancel: &CancellationToken) -> Result<(), SwitcherError> {
        for target in targets(node) {
            if !self.transition(&target, |tracked| tracked.appeared) {
                continue;
            }
            invoke(&target, Hook::Disappearing, Some(cancel)).await?;
            self.update(&target, |tracked| tracked.appeared = false);
        }
        Ok(())
    }

    /// Run `dispose` on the node and its context exactly once.
    pub async fn dispose(&self, node: &NodeRef) {
        for target in targets(node) {
            if !self.transition(&target, |tracked| !tracked.disposed) {
                continue;
            }
            self.update(&target, |tracked| {
                tracked.disposed = true;
                tracked.initialized = false;
                tracked.appeared = false;
            });
            if let Err(err) = invoke(&target, Hook::Dispose, None).await {
                tracing::warn!(instance = target.key(), error = %err, "Dispose hook failed");
            }
        }
    }

    pub fn is_initialized(&self, node: &NodeRef) -> bool {
        let key = Target::Node(node.clone()).key();
        self.tracked
            .lock()
            .get(&key)
            .is_some_and(|tracked| tracked.initialized && tracked.target.is_alive())
    }

    /// Forget every tracked instance.
    pub fn clear(&self) {
        self.tracked.lock().clear();
    }

    /// Check `decide` against the tracked state of `target`, creating the
    /// entry on first sight. Targets without hooks are never tracked.
    fn transition(&self, target: &Target, decide: impl FnOnce(&mut Tracked) -> bool) -> bool {
        if target.lifecycle().is_none() {
            return false;
        }
        let mut tracked = self.tracked.lock();
        tracked.retain(|_, entry| entry.target.is_alive());
        let entry = tracked.entry(target.key()).or_insert_with(|| Tracked {
            target: target.downgrade(),
            initialized: false,
            appeared: false,
            disposed: false,
        });
        decide(entry)
    }

    fn update(&self, target: &Target, apply: impl FnOnce(&mut Tracked)) {
        if let Some(entry) = self.tracked.lock().get_mut(&target.key()) {
            apply(entry);
        }
    }
}

fn targets(node: &NodeRef) -> Vec<Target> {
    let mut targets = vec![Target::Node(node.clone())];
    if let Some(context) = node.data_context() {
        targets.push(Target::Context(context));
    }
    targets
}

/// Invoke one hook. Returns `Ok(true)` when the hook succeeded, `Ok(false)`
/// when it failed (logged), and `Err(Cancelled)` when cancelled first.
async fn invoke(target: &Target, hook: Hook, cancel: Option<&CancellationToken>) -> Result<bool, SwitcherError> {
    let Some(lifecycle) = target.lifecycle() else {
        return Ok(true);
    };

    let call = async {
        match hook {
            Hook::Initialize => lifecycle.initialize().await,
            Hook::Appearing => lifecycle.appearing().await,
            Hook::Disappearing => lifecycle.disappearing().await,
            Hook::Dispose => lifecycle.dispose().await,
        }
    };

    let result = match cancel {
        Some(cancel) => {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SwitcherError::Cancelled),
                result = call => result,
            }
        }
        None => call.await,
    };

    match result {
        Ok(()) => Ok(true),
        Err(err) => {
            let owner = match target {
                Target::Node(_) => "node",
                Target::Context(_) => "data context",
            };
            tracing::warn!(hook = ?hook, owner, error = %err, "Lifecycle hook failed");
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ContextSlot;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Counting {
        initialize: AtomicUsize,
        appearing: AtomicUsize,
        disappearing: AtomicUsize,
        dispose: AtomicUsize,
        fail_initialize: bool,
    }

    #[async_trait]
    impl Lifecycle for Counting {
        async fn initialize(&self) -> anyhow::Result<()> {
            self.initialize.fetch_add(1, Ordering::SeqCst);
            if self.fail_initialize {
                anyhow::bail!("initialize failed");
            }
            Ok(())
        }

        async fn appearing(&self) -> anyhow::Result<()> {
            self.appearing.fetch_add(1, Ordering::SeqCst);
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

    #[derive(Debug, Default)]
    struct HookedNode {
        hooks: Counting,
        context: ContextSlot,
    }

    impl VisualNode for HookedNode {
        fn data_context(&self) -> Option<DataRef> {
            self.context.get()
        }

        fn set_data_context(&self, context: Option<DataRef>) {
            self.context.set(context);
        }

        fn lifecycle(&self) -> Option<&dyn Lifecycle> {
            Some(&self.hooks)
        }
    }

    #[derive(Debug, Default)]
    struct HookedContext {
        hooks: Counting,
    }

    impl ItemData for HookedContext {
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn display_text(&self) -> String {
            "context".to_string()
        }

        fn lifecycle(&self) -> Option<&dyn Lifecycle> {
            Some(&self.hooks)
        }
    }

    fn hooked() -> (Arc<HookedNode>, NodeRef) {
        let node = Arc::new(HookedNode::default());
        let as_ref: NodeRef = node.clone();
        (node, as_ref)
    }

    #[tokio::test]
    async fn initialize_runs_once() {
        let coordinator = LifecycleCoordinator::new();
        let cancel = CancellationToken::new();
        let (node, node_ref) = hooked();

        coordinator.ensure_initialized(&node_ref, &cancel).await.unwrap();
        coordinator.ensure_initialized(&node_ref, &cancel).await.unwrap();

        assert_eq!(node.hooks.initialize.load(Ordering::SeqCst), 1);
        assert!(coordinator.is_initialized(&node_ref));
    }

    #[tokio::test]
    async fn failed_initialize_is_retried_next_time() {
        let coordinator = LifecycleCoordinator::new();
        let cancel = CancellationToken::new();
        let node = Arc::new(HookedNode {
            hooks: Counting {
                fail_initialize: true,
                ..Counting::default()
            },
            context: ContextSlot::new(),
        });
        let node_ref: NodeRef = node.clone();

        coordinator.ensure_initialized(&node_ref, &cancel).await.unwrap();
        assert!(!coordinator.is_initialized(&node_ref));
        coordinator.ensure_initialized(&node_ref, &cancel).await.unwrap();
        assert_eq!(node.hooks.initialize.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn appearing_and_disappearing_pair_up() {
        let coordinator = LifecycleCoordinator::new();
        let cancel = CancellationToken::new();
        let (node, node_ref) = hooked();

        coordinator.disappearing(&node_ref, &cancel).await.unwrap();
        coordinator.appearing(&node_ref, &cancel).await.unwrap();
        coordinator.appearing(&node_ref, &cancel).await.unwrap();
        coordinator.disappearing(&node_ref, &cancel).await.unwrap();
        coordinator.disappearing(&node_ref, &cancel).await.unwrap();

        assert_eq!(node.hooks.appearing.load(Ordering::SeqCst), 1);
        assert_eq!(node.hooks.disappearing.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn context_hooks_run_independently() {
        let coordinator = LifecycleCoordinator::new();
        let cancel = CancellationToken::new();
        let (node, node_ref) = hooked();
        let context = Arc::new(HookedContext::default());
        node.set_data_context(Some(context.clone()));

        coordinator.ensure_initialized(&node_ref, &cancel).await.unwrap();
        coordinator.dispose(&node_ref).await;
        coordinator.dispose(&node_ref).await;

        assert_eq!(context.hooks.initialize.load(Ordering::SeqCst), 1);
        assert_eq!(context.hooks.dispose.load(Ordering::SeqCst), 1);
        assert_eq!(node.hooks.dispose.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_hook_reports_cancellation() {
        let coordinator = LifecycleCoordinator::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (node, node_ref) = hooked();

        let result = coordinator.ensure_initialized(&node_ref, &cancel).await;

        assert!(matches!(result, Err(SwitcherError::Cancelled)));
        assert_eq!(node.hooks.initialize.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nodes_without_hooks_are_ignored() {
        let coordinator = LifecycleCoordinator::new();
        let cancel = CancellationToken::new();
        let node: NodeRef = Arc::new(crate::node::TextNode::new("plain"));

        coordinator.ensure_initialized(&node, &cancel).await.unwrap();
        coordinator.appearing(&node, &cancel).await.unwrap();
        coordinator.dispose(&node).await;

        assert!(!coordinator.is_initialized(&node));
    }
}
