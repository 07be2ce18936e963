//! Animated playback over a growing forecast time series.
//!
//! The [`AnimationController`] walks the loaded timesteps of a
//! [`ingestion::TimeSeriesReader`], rasterizes them with a
//! [`renderer::GridRasterizer`] and hands frames to a [`FramePresenter`],
//! cross-fading between consecutive frames.

pub mod config;
pub mod controller;
pub mod pacing;
pub mod presenter;
pub mod state;
pub mod transition;

pub use config::PlaybackConfig;
pub use controller::AnimationController;
pub use pacing::FramePacing;
pub use presenter::FramePresenter;
pub use state::{AnimationPhase, PlaybackState};
pub use transition::Transition;
