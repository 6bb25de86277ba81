//! Error types surfaced by the view switcher facade.

use thiserror::Error;

use crate::transition::TransitionError;

/// Errors that can occur while resolving or applying a selection.
#[derive(Debug, Error)]
pub enum SwitcherError {
    /// The requested index is past the end of the list under the `Throw` policy.
    #[error("Requested index {requested} is outside the available range (0..{total})")]
    IndexOutOfRange { requested: i64, total: usize },

    /// A non-negative index was requested while no entries exist under the `Throw` policy.
    #[error("Requested index {requested} cannot be selected: no items are available")]
    NoItems { requested: i64 },

    /// The custom per-item factory produced nothing.
    #[error("Custom item node factory returned no node for index {index}")]
    FactoryReturnedNothing { index: usize },

    /// The hand-off into the presentation slot failed.
    #[error("Transition failed: {0}")]
    Transition(#[source] TransitionError),

    /// Cooperative abort. Swallowed by the selection queue.
    #[error("Selection operation was cancelled")]
    Cancelled,

    /// The switcher has been shut down and accepts no further requests.
    #[error("View switcher has been shut down")]
    ShutDown,

    /// The switcher was built outside a Tokio runtime.
    #[error("No Tokio runtime is available to run selection operations")]
    NoRuntime,

    /// The selection task panicked; the previous node stays presented.
    #[error("Selection operation panicked: {message}")]
    OperationPanicked { message: String },
}

impl SwitcherError {
    /// True for cooperative cancellation, which callers should not treat as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SwitcherError::Cancelled)
    }
}

impl From<TransitionError> for SwitcherError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Cancelled => SwitcherError::Cancelled,
            other => SwitcherError::Transition(other),
        }
    }
}
