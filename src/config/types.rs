use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::selection::IndexBehavior;
use crate::transition::Easing;

/// Longest transition accepted by validation, in milliseconds.
pub const MAX_TRANSITION_DURATION_MS: u64 = 60_000;

/// Settings applied when a switcher is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitcherConfig {
    /// Recycle created nodes across selections (default: true).
    #[serde(default = "default_cache_views")]
    pub cache_views: bool,
    /// Animate hand-offs after the first presentation (default: true).
    #[serde(default = "default_animate")]
    pub animate: bool,
    /// Hand-off duration in milliseconds (default: 250).
    #[serde(default = "default_transition_duration_ms")]
    pub transition_duration_ms: u64,
    #[serde(default)]
    pub easing: Easing,
    #[serde(default)]
    pub index_behavior: IndexBehavior,
    /// Accessibility description; `{0}` is replaced by the selected state
    /// key or item text.
    #[serde(default)]
    pub automation_description_template: Option<String>,
}

fn default_cache_views() -> bool {
    true
}

fn default_animate() -> bool {
    true
}

fn default_transition_duration_ms() -> u64 {
    250
}

impl Default for SwitcherConfig {
    fn default() -> Self {
        Self {
            cache_views: default_cache_views(),
            animate: default_animate(),
            transition_duration_ms: default_transition_duration_ms(),
            easing: Easing::default(),
            index_behavior: IndexBehavior::default(),
            automation_description_template: None,
        }
    }
}

impl SwitcherConfig {
    pub fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.transition_duration_ms)
    }
}
