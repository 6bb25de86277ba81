use thiserror::Error;

use crate::node::HostError;

/// Errors raised while handing the slot from one node to the next.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The hand-off was cancelled or superseded by a newer one.
    #[error("Transition was cancelled")]
    Cancelled,

    /// The strategy or animation coordinator failed.
    #[error("Transition strategy failed: {0}")]
    Strategy(#[source] anyhow::Error),

    /// The visual host refused to attach the incoming node.
    #[error("Visual host error: {0}")]
    Host(#[from] HostError),
}
