use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::node::NodeRef;

use super::easing::Easing;

/// Key under which the stock cross-fade is requested from a host coordinator.
pub const CROSS_FADE_KEY: &str = "view-switcher.cross-fade";

/// Timing handed to the host coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationOptions {
    pub duration: Duration,
    pub easing: Easing,
}

/// Host-provided animation service shared across controls.
///
/// When injected, the default cross-fade is played through it instead of
/// through the node fade primitive.
#[async_trait]
pub trait AnimationCoordinator: Send + Sync {
    async fn play_transition(
        &self,
        key: &str,
        entering: Option<&NodeRef>,
        exiting: Option<&NodeRef>,
        options: AnimationOptions,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()>;
}
