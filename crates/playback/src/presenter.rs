//! The surface frames are shown on.

use renderer::RasterFrame;

/// Receives frames from the animation controller.
///
/// The controller owns every frame; presenters only borrow them for the
/// duration of a call and get ownership back through [`dispose`] once a
/// frame leaves the screen.
///
/// [`dispose`]: FramePresenter::dispose
pub trait FramePresenter {
    /// Show `frame` at full opacity, replacing whatever is displayed.
    fn present(&mut self, frame: &RasterFrame);

    /// Show `from` faded to `1 - progress` under `to` at `progress`.
    fn blend(&mut self, from: &RasterFrame, to: &RasterFrame, progress: f32);

    /// `frame` is no longer displayed.
    fn dispose(&mut self, frame: RasterFrame) {
        drop(frame);
    }
}
