//! Shared test utilities and mock infrastructure.

#![allow(dead_code, unused_imports)]

pub mod mock_node;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use viewswitch::config::SwitcherConfig;
use viewswitch::node::{NodeRef, PresentationSlot};
use viewswitch::transition::InstantTransition;
use viewswitch::ViewSwitcher;

pub use mock_node::{GatedTransition, HookCounts, MockNode, RecordingCoordinator};

/// Switcher over an in-memory slot with an instant strategy.
pub fn switcher() -> (Arc<PresentationSlot>, ViewSwitcher) {
    switcher_with(SwitcherConfig::default())
}

pub fn switcher_with(config: SwitcherConfig) -> (Arc<PresentationSlot>, ViewSwitcher) {
    let slot = Arc::new(PresentationSlot::new());
    let switcher = ViewSwitcher::builder(slot.clone())
        .config(config)
        .transition_strategy(Arc::new(InstantTransition))
        .build()
        .expect("Failed to build switcher");
    (slot, switcher)
}

/// Mock nodes labelled `labels`, plus the same nodes as `NodeRef`s.
pub fn mock_nodes(labels: &[&str]) -> (Vec<Arc<MockNode>>, Vec<NodeRef>) {
    let mocks: Vec<Arc<MockNode>> = labels.iter().map(|label| Arc::new(MockNode::new(*label))).collect();
    let refs = mocks.iter().map(|mock| mock.clone() as NodeRef).collect();
    (mocks, refs)
}

/// Write `content` to a config file inside a fresh temp dir.
pub fn temp_config(content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, content).expect("Failed to write config");
    (temp_dir, config_path)
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    condition()
}
