//! Frame interval selection.

use std::time::Duration;

use crate::config::PlaybackConfig;

/// Picks the frame interval from data availability.
///
/// This is a fixed heuristic: slower while batches are still arriving,
/// faster once the series is long. It does not measure render time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePacing {
    base: Duration,
    loading: Duration,
    fast: Duration,
    fast_threshold: usize,
}

impl FramePacing {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_interval_ms),
            loading: Duration::from_millis(config.loading_interval_ms),
            fast: Duration::from_millis(config.fast_interval_ms),
            fast_threshold: config.fast_threshold,
        }
    }

    pub fn interval(&self, loaded_timesteps: usize, fetching: bool) -> Duration {
        if fetching {
            self.loading
        } else if loaded_timesteps > self.fast_threshold {
            self.fast
        } else {
            self.base
        }
    }
}
