//! Selection state machine.
//!
//! Index, item and state key are three bindable views of one snapshot.
//! The snapshot only changes through [`SelectionState::update_snapshot`];
//! the per-source update scopes stop an engine-driven property push from
//! re-entering the apply routine.

mod behavior;
mod state;

pub use behavior::IndexBehavior;
pub use state::{SelectionSnapshot, SelectionSource, SelectionState, UpdateScope};
