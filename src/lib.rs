//! A view-switching engine: one presentation slot multiplexed among many
//! candidate nodes, with recycling, lifecycle hooks and cancelable animated
//! hand-offs.

pub mod cache;
pub mod config;
pub mod error;
pub mod factory;
pub mod lifecycle;
pub mod node;
pub mod registry;
pub mod selection;
pub mod switcher;
pub mod transition;

pub use config::{ConfigError, SwitcherConfig};
pub use error::SwitcherError;
pub use node::{Item, ItemData, NodeRef, PresentationSlot, Presenter, TextNode, VisualNode};
pub use switcher::{SelectionOutcome, SwitchOptions, ViewSwitcher};

/// Install the fmt subscriber used by the demo binary.
///
/// Reads the filter from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
}
