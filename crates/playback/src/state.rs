//! Observable playback state.

use serde::Serialize;

/// Where the animation state machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationPhase {
    Stopped,
    Playing,
    /// A cross-fade is in flight. No other fade starts until it completes.
    Transitioning,
}

/// Snapshot of the controller for status lines and the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub phase: AnimationPhase,
    /// Position of the displayed timestep among loaded timesteps
    pub current_index: Option<usize>,
    pub current_time: Option<i64>,
    pub loaded_timesteps: usize,
    pub playing: bool,
    pub interval_ms: u64,
    pub variable: String,
}
