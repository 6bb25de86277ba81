//! Serialized, cancelable hand-off of the presentation slot.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::node::{same_optional_node, NodeRef, Presenter};

use super::animation::{AnimationCoordinator, AnimationOptions, CROSS_FADE_KEY};
use super::easing::Easing;
use super::error::TransitionError;
use super::strategy::{CrossFadeTransition, TransitionRequest, ViewTransition};

/// Where the in-flight hand-off currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPhase {
    #[default]
    Idle,
    Requested,
    Attaching,
    Animating,
    Settling,
}

/// Result of a successful hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandOff {
    /// The slot now holds the requested node.
    Committed,
    /// The requested node was already current.
    Unchanged,
}

/// Animation settings applied to every hand-off.
#[derive(Debug, Clone)]
pub struct TransitionSettings {
    pub animate: bool,
    pub duration: Duration,
    pub easing: Easing,
    pub strategy: Arc<dyn ViewTransition>,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        Self {
            animate: true,
            duration: Duration::from_millis(250),
            easing: Easing::default(),
            strategy: Arc::new(CrossFadeTransition),
        }
    }
}

#[derive(Default)]
struct PendingScope {
    generation: u64,
    token: Option<CancellationToken>,
}

pub struct TransitionCoordinator {
    presenter: Arc<dyn Presenter>,
    animation: Option<Arc<dyn AnimationCoordinator>>,
    settings: Mutex<TransitionSettings>,
    gate: tokio::sync::Mutex<()>,
    pending: Mutex<PendingScope>,
    current: Mutex<Option<NodeRef>>,
    phase: Mutex<TransitionPhase>,
}

impl fmt::Debug for TransitionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionCoordinator")
            .field("settings", &*self.settings.lock())
            .field("has_animation_coordinator", &self.animation.is_some())
            .field("current", &*self.current.lock())
            .field("phase", &*self.phase.lock())
            .finish()
    }
}

impl TransitionCoordinator {
    pub fn new(
        presenter: Arc<dyn Presenter>,
        animation: Option<Arc<dyn AnimationCoordinator>>,
        settings: TransitionSettings,
    ) -> Self {
        Self {
            presenter,
            animation,
            settings: Mutex::new(settings),
            gate: tokio::sync::Mutex::new(()),
            pending: Mutex::new(PendingScope::default()),
            current: Mutex::new(None),
            phase: Mutex::new(TransitionPhase::Idle),
        }
    }

    pub fn presenter(&self) -> &Arc<dyn Presenter> {
        &self.presenter
    }

    pub fn settings(&self) -> TransitionSettings {
        self.settings.lock().clone()
    }

    pub fn update_settings(&self, update: impl FnOnce(&mut TransitionSettings)) {
        update(&mut self.settings.lock());
    }

    /// The node committed by the last successful hand-off.
    pub fn current(&self) -> Option<NodeRef> {
        self.current.lock().clone()
    }

    pub fn phase(&self) -> TransitionPhase {
        *self.phase.lock()
    }

    /// Cancel whatever hand-off is still pending.
    pub fn cancel_pending(&self) {
        if let Some(token) = self.pending.lock().token.take() {
            token.cancel();
        }
    }

    /// Hand the slot to `next`.
    ///
    /// Starting a hand-off cancels the previous pending one before waiting
    /// for the slot, so the latest request wins. On cancellation or failure
    /// the previous node stays current and `next` is removed from the slot.
    pub async fn switch(
        &self,
        next: Option<NodeRef>,
        is_initial: bool,
        animate: Option<bool>,
        cancel: &CancellationToken,
    ) -> Result<HandOff, TransitionError> {
        let scope = cancel.child_token();
        let generation = {
            let mut pending = self.pending.lock();
            if let Some(previous) = pending.token.replace(scope.clone()) {
                previous.cancel();
            }
            pending.generation += 1;
            pending.generation
        };
        self.set_phase(TransitionPhase::Requested);

        let gate = tokio::select! {
            biased;
            _ = scope.cancelled() => None,
            guard = self.gate.lock() => Some(guard),
        };

        let result = match gate {
            Some(_guard) => {
                let result = self.hand_off(next, is_initial, animate, &scope).await;
                self.set_phase(TransitionPhase::Idle);
                result
            }
            None => Err(TransitionError::Cancelled),
        };

        let mut pending = self.pending.lock();
        if pending.generation == generation {
            pending.token = None;
        }
        result
    }

    /// Take the current node out of the slot without animating.
    pub fn clear(&self) -> Option<NodeRef> {
        self.cancel_pending();
        let current = self.current.lock().take();
        if let Some(node) = &current {
            node.cancel_animations();
            self.remove_from_slot(node);
        }
        current
    }

    async fn hand_off(
        &self,
        next: Option<NodeRef>,
        is_initial: bool,
        animate: Option<bool>,
        scope: &CancellationToken,
    ) -> Result<HandOff, TransitionError> {
        if scope.is_cancelled() {
            return Err(TransitionError::Cancelled);
        }

        let previous = self.current();
        if same_optional_node(previous.as_ref(), next.as_ref()) {
            if let Some(node) = &next {
                if !self.presenter.contains(node) {
                    self.attach(node)?;
                }
                node.set_opacity(1.0);
            }
            return Ok(HandOff::Unchanged);
        }

        let settings = self.settings();
        if let Some(node) = &next {
            self.set_phase(TransitionPhase::Attaching);
            self.attach(node)?;
        }

        self.set_phase(TransitionPhase::Animating);
        let request = TransitionRequest {
            old: previous.clone(),
            new: next.clone(),
            is_initial,
            animate: animate.unwrap_or(settings.animate),
            duration: settings.duration,
            easing: settings.easing,
        };

        let outcome = tokio::select! {
            biased;
            _ = scope.cancelled() => Err(TransitionError::Cancelled),
            result = self.animate(&request, settings.strategy.as_ref(), scope) => result,
        };

        match outcome {
            Ok(()) => {
                self.set_phase(TransitionPhase::Settling);
                if let Some(old) = &previous {
                    self.remove_from_slot(old);
                    old.set_opacity(1.0);
                }
                if let Some(node) = &next {
                    node.set_opacity(1.0);
                }
                *self.current.lock() = next.clone();
                tracing::debug!(
                    old_node = ?previous,
                    new_node = ?next,
                    is_initial,
                    animated = !request.is_instant(),
                    "Presentation slot handed off"
                );
                Ok(HandOff::Committed)
            }
            Err(err) => {
                self.roll_back(previous.as_ref(), next.as_ref());
                if matches!(err, TransitionError::Cancelled) {
                    tracing::debug!(new_node = ?next, "Hand-off cancelled before commit");
                } else {
                    tracing::warn!(new_node = ?next, error = %err, "Hand-off failed, keeping previous node");
                }
                Err(err)
            }
        }
    }

    async fn animate(
        &self,
        request: &TransitionRequest,
        strategy: &dyn ViewTransition,
        scope: &CancellationToken,
    ) -> Result<(), TransitionError> {
        if !request.animate {
            if let Some(node) = &request.new {
                node.set_opacity(1.0);
            }
            return Ok(());
        }

        if strategy.is_cross_fade() && !request.is_initial {
            if let Some(coordinator) = &self.animation {
                let options = AnimationOptions {
                    duration: request.duration,
                    easing: request.easing,
                };
                return coordinator
                    .play_transition(
                        CROSS_FADE_KEY,
                        request.new.as_ref(),
                        request.old.as_ref(),
                        options,
                        scope,
                    )
                    .await
                    .map_err(TransitionError::Strategy);
            }
        }

        strategy.run(request, scope).await
    }

    /// Attach `node` to the slot, detaching it from any previous parent.
    /// A failed detach is retried once after disconnecting the platform
    /// handle; if that fails too the attach goes ahead anyway.
    fn attach(&self, node: &NodeRef) -> Result<(), TransitionError> {
        if self.presenter.contains(node) {
            return Ok(());
        }

        if let Err(err) = node.detach_from_parent() {
            tracing::warn!(node = ?node, error = %err, "Detach failed, disconnecting platform handle and retrying");
            node.disconnect_handle();
            if let Err(err) = node.detach_from_parent() {
                tracing::warn!(node = ?node, error = %err, "Detach retry failed, attaching anyway");
            }
        }

        self.presenter.insert(node.clone())?;
        Ok(())
    }

    fn remove_from_slot(&self, node: &NodeRef) {
        if let Err(err) = self.presenter.remove(node) {
            tracing::warn!(node = ?node, error = %err, "Removing node failed, disconnecting platform handle and retrying");
            node.disconnect_handle();
            if let Err(err) = self.presenter.remove(node) {
                tracing::warn!(node = ?node, error = %err, "Node could not be removed from the slot");
            }
        }
    }

    fn roll_back(&self, previous: Option<&NodeRef>, next: Option<&NodeRef>) {
        if let Some(node) = next {
            node.cancel_animations();
        }
        if let Some(node) = previous {
            node.cancel_animations();
            node.set_opacity(1.0);
        }
        if let Some(node) = next {
            if !same_optional_node(previous, Some(node)) {
                self.remove_from_slot(node);
            }
        }
    }

    fn set_phase(&self, phase: TransitionPhase) {
        *self.phase.lock() = phase;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{same_node, HostError, PresentationSlot, TextNode, VisualNode};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn node(text: &str) -> NodeRef {
        Arc::new(TextNode::new(text))
    }

    fn coordinator(strategy: Arc<dyn ViewTransition>) -> (Arc<PresentationSlot>, Arc<TransitionCoordinator>) {
        let slot = Arc::new(PresentationSlot::new());
        let settings = TransitionSettings {
            strategy,
            ..TransitionSettings::default()
        };
        let coordinator = Arc::new(TransitionCoordinator::new(slot.clone(), None, settings));
        (slot, coordinator)
    }

    /// Blocks until released, so a hand-off can be caught mid-flight.
    #[derive(Debug, Default)]
    struct Gated {
        release: Notify,
        started: AtomicUsize,
    }

    #[async_trait]
    impl ViewTransition for Gated {
        async fn run(&self, _request: &TransitionRequest, cancel: &CancellationToken) -> Result<(), TransitionError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::select! {
                _ = cancel.cancelled() => Err(TransitionError::Cancelled),
                _ = self.release.notified() => Ok(()),
            }
        }
    }

    #[derive(Debug)]
    struct Failing;

    #[async_trait]
    impl ViewTransition for Failing {
        async fn run(&self, _request: &TransitionRequest, _cancel: &CancellationToken) -> Result<(), TransitionError> {
            Err(TransitionError::Strategy(anyhow::anyhow!("boom")))
        }
    }

    #[tokio::test]
    async fn first_hand_off_commits_and_fills_slot() {
        let (slot, coordinator) = coordinator(Arc::new(CrossFadeTransition));
        let a = node("a");

        let result = coordinator.switch(Some(a.clone()), true, None, &CancellationToken::new()).await;

        assert_eq!(result.unwrap(), HandOff::Committed);
        assert!(same_node(&coordinator.current().unwrap(), &a));
        assert_eq!(slot.len(), 1);
        assert_eq!(coordinator.phase(), TransitionPhase::Idle);
    }

    #[tokio::test]
    async fn switching_to_current_node_is_unchanged() {
        let (slot, coordinator) = coordinator(Arc::new(CrossFadeTransition));
        let a = node("a");
        let cancel = CancellationToken::new();

        coordinator.switch(Some(a.clone()), true, None, &cancel).await.unwrap();
        let result = coordinator.switch(Some(a), false, None, &cancel).await.unwrap();

        assert_eq!(result, HandOff::Unchanged);
        assert_eq!(slot.len(), 1);
    }

    #[tokio::test]
    async fn switching_to_none_empties_slot() {
        let (slot, coordinator) = coordinator(Arc::new(CrossFadeTransition));
        let cancel = CancellationToken::new();

        coordinator.switch(Some(node("a")), true, None, &cancel).await.unwrap();
        coordinator.switch(None, false, None, &cancel).await.unwrap();

        assert!(slot.is_empty());
        assert!(coordinator.current().is_none());
    }

    #[tokio::test]
    async fn newer_hand_off_supersedes_pending_one() {
        let gated = Arc::new(Gated::default());
        let (slot, coordinator) = coordinator(gated.clone());
        let cancel = CancellationToken::new();
        let a = node("a");
        let b = node("b");
        let c = node("c");

        coordinator.switch(Some(a.clone()), true, Some(false), &cancel).await.unwrap();

        let first = {
            let coordinator = coordinator.clone();
            let b = b.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { coordinator.switch(Some(b), false, None, &cancel).await })
        };
        while gated.started.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        let second = {
            let coordinator = coordinator.clone();
            let c = c.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { coordinator.switch(Some(c), false, None, &cancel).await })
        };
        while gated.started.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
        gated.release.notify_one();

        assert!(matches!(first.await.unwrap(), Err(TransitionError::Cancelled)));
        assert_eq!(second.await.unwrap().unwrap(), HandOff::Committed);
        assert!(same_node(&coordinator.current().unwrap(), &c));
        assert!(!slot.contains(&b));
        assert!(!slot.contains(&a));
        assert_eq!(slot.len(), 1);
    }

    #[tokio::test]
    async fn failed_strategy_keeps_previous_node() {
        let (slot, coordinator) = coordinator(Arc::new(Failing));
        let cancel = CancellationToken::new();
        let a = node("a");
        let b = node("b");

        coordinator.switch(Some(a.clone()), true, Some(false), &cancel).await.unwrap();
        let result = coordinator.switch(Some(b.clone()), false, None, &cancel).await;

        assert!(matches!(result, Err(TransitionError::Strategy(_))));
        assert!(same_node(&coordinator.current().unwrap(), &a));
        assert!(slot.contains(&a));
        assert!(!slot.contains(&b));
    }

    #[derive(Debug, Default)]
    struct Sticky {
        detach_attempts: AtomicUsize,
        disconnects: AtomicUsize,
    }

    impl VisualNode for Sticky {
        fn data_context(&self) -> Option<crate::node::DataRef> {
            None
        }

        fn set_data_context(&self, _context: Option<crate::node::DataRef>) {}

        fn detach_from_parent(&self) -> Result<(), HostError> {
            if self.detach_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(HostError::TeardownRace {
                    node: "sticky".to_string(),
                    reason: "previous parent still releasing".to_string(),
                });
            }
            Ok(())
        }

        fn disconnect_handle(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn detach_is_retried_after_disconnect() {
        let (slot, coordinator) = coordinator(Arc::new(CrossFadeTransition));
        let sticky = Arc::new(Sticky::default());

        coordinator
            .switch(Some(sticky.clone()), true, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(sticky.detach_attempts.load(Ordering::SeqCst), 2);
        assert_eq!(sticky.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(slot.len(), 1);
    }

    #[tokio::test]
    async fn clear_takes_current_out_of_slot() {
        let (slot, coordinator) = coordinator(Arc::new(CrossFadeTransition));
        let a = node("a");
        coordinator.switch(Some(a.clone()), true, None, &CancellationToken::new()).await.unwrap();

        let cleared = coordinator.clear();

        assert!(same_node(&cleared.unwrap(), &a));
        assert!(slot.is_empty());
    }
}
