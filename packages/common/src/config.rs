use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for a document graph instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Maximum number of undo entries kept before the oldest is evicted
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Patches pushed with `merge` within this window join the previous undo entry
    #[serde(default = "default_merge_window_ms")]
    pub merge_window_ms: u64,

    /// Delay before a range wrap resolves, giving the view layer one paint cycle
    #[serde(default = "default_wrap_settle_ms")]
    pub wrap_settle_ms: u64,

    /// Preview graphs turn this off so they never touch an undo stack
    #[serde(default = "default_record_history")]
    pub record_history: bool,

    /// Seed mixed into generated identifiers
    #[serde(default = "default_id_seed")]
    pub id_seed: String,
}

fn default_history_capacity() -> usize {
    500
}

fn default_merge_window_ms() -> u64 {
    1000
}

fn default_wrap_settle_ms() -> u64 {
    16
}

fn default_record_history() -> bool {
    true
}

fn default_id_seed() -> String {
    "pageweave".to_string()
}

impl EngineConfig {
    pub fn merge_window(&self) -> Duration {
        Duration::from_millis(self.merge_window_ms)
    }

    pub fn wrap_settle(&self) -> Duration {
        Duration::from_millis(self.wrap_settle_ms)
    }

    /// Configuration used for template and preview graphs
    pub fn preview() -> Self {
        Self {
            record_history: false,
            id_seed: "preview".to_string(),
            ..Self::default()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            merge_window_ms: default_merge_window_ms(),
            wrap_settle_ms: default_wrap_settle_ms(),
            record_history: default_record_history(),
            id_seed: default_id_seed(),
        }
    }
}
