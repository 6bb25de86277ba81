//! Hand-off of the presentation slot between nodes.

mod animation;
mod coordinator;
mod easing;
mod error;
mod strategy;

pub use animation::{AnimationCoordinator, AnimationOptions, CROSS_FADE_KEY};
pub use coordinator::{HandOff, TransitionCoordinator, TransitionPhase, TransitionSettings};
pub use easing::Easing;
pub use error::TransitionError;
pub use strategy::{CrossFadeTransition, InstantTransition, TransitionRequest, ViewTransition};
