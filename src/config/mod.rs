//! Switcher configuration.

mod loader;
mod types;

pub use loader::ConfigError;
pub use types::{SwitcherConfig, MAX_TRANSITION_DURATION_MS};
