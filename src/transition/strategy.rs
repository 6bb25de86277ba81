//! Pluggable hand-off strategies.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::node::NodeRef;

use super::easing::Easing;
use super::error::TransitionError;

/// Everything a strategy needs for one hand-off. Built once per switch.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub old: Option<NodeRef>,
    pub new: Option<NodeRef>,
    /// First presentation of the switcher; strategies should not animate.
    pub is_initial: bool,
    pub animate: bool,
    pub duration: Duration,
    pub easing: Easing,
}

impl TransitionRequest {
    /// True when the strategy should swap without animating.
    pub fn is_instant(&self) -> bool {
        !self.animate || self.is_initial || self.duration.is_zero()
    }
}

/// Performs the visual part of a hand-off. Both nodes are already children
/// of the presenter when `run` is called; the coordinator removes the old
/// one afterwards.
#[async_trait]
pub trait ViewTransition: Send + Sync + fmt::Debug {
    /// True for the stock cross-fade, which may be delegated to a host
    /// animation coordinator.
    fn is_cross_fade(&self) -> bool {
        false
    }

    /// Run the hand-off. Must be a no-op when both nodes are absent and
    /// should return [`TransitionError::Cancelled`] once `cancel` fires.
    async fn run(&self, request: &TransitionRequest, cancel: &CancellationToken) -> Result<(), TransitionError>;
}

/// Default strategy: fade the incoming node in while the outgoing fades out.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossFadeTransition;

#[async_trait]
impl ViewTransition for CrossFadeTransition {
    fn is_cross_fade(&self) -> bool {
        true
    }

    async fn run(&self, request: &TransitionRequest, cancel: &CancellationToken) -> Result<(), TransitionError> {
        if request.old.is_none() && request.new.is_none() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(TransitionError::Cancelled);
        }

        if request.is_instant() {
            if let Some(new) = &request.new {
                new.set_opacity(1.0);
            }
            return Ok(());
        }

        if let Some(new) = &request.new {
            new.set_opacity(0.0);
        }

        let fade_in = async {
            match &request.new {
                Some(node) => node.fade_to(1.0, request.duration, request.easing).await,
                None => Ok(()),
            }
        };
        let fade_out = async {
            match &request.old {
                Some(node) => node.fade_to(0.0, request.duration, request.easing).await,
                None => Ok(()),
            }
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransitionError::Cancelled),
            result = async { tokio::join!(fade_in, fade_out) } => result,
        };

        match result {
            (Ok(()), Ok(())) => Ok(()),
            (Err(err), _) | (_, Err(err)) => Err(TransitionError::Strategy(err)),
        }
    }
}

/// Swaps nodes without animating.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantTransition;

#[async_trait]
impl ViewTransition for InstantTransition {
    async fn run(&self, request: &TransitionRequest, cancel: &CancellationToken) -> Result<(), TransitionError> {
        if cancel.is_cancelled() {
            return Err(TransitionError::Cancelled);
        }
        if let Some(new) = &request.new {
            new.set_opacity(1.0);
        }
        Ok(())
    }
}
