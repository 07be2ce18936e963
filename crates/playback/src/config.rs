//! Playback configuration.

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Frame interval in normal playback
    pub base_interval_ms: u64,
    /// Frame interval while background batches are still being fetched
    pub loading_interval_ms: u64,
    /// Frame interval once more than `fast_threshold` timesteps are loaded
    pub fast_interval_ms: u64,
    pub fast_threshold: usize,
    /// Cross-fade duration
    pub fade_ms: u64,
    /// Quiet period before a viewport change is rendered
    pub viewport_debounce_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: 500,
            loading_interval_ms: 1000,
            fast_interval_ms: 250,
            fast_threshold: 48,
            fade_ms: 150,
            viewport_debounce_ms: 16,
        }
    }
}

impl PlaybackConfig {
    pub fn fade(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }

    pub fn viewport_debounce(&self) -> Duration {
        Duration::from_millis(self.viewport_debounce_ms)
    }
}
