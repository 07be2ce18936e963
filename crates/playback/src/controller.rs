//! The animation controller.
//!
//! Drives playback over the loaded timesteps of a dataset that may still be
//! growing. Time is always passed in by the caller, so the controller can be
//! ticked from a real clock or stepped deterministically.
//!
//! Rendered frames are identified by a [`FrameKey`]: the timestep, the
//! selection version (bumped on every variable or viewport change) and the
//! dataset generation (bumped when the dataset is replaced or cleared). A
//! frame whose key no longer matches is never shown.

use std::time::Instant;

use ingestion::{DatasetSnapshot, TimeSeriesReader};
use projection::Viewport;
use renderer::{GridRasterizer, HoverInfo, ProcessedGrid, RasterFrame, ValueRange};
use tracing::{debug, info};

use crate::config::PlaybackConfig;
use crate::pacing::FramePacing;
use crate::presenter::FramePresenter;
use crate::state::{AnimationPhase, PlaybackState};
use crate::transition::Transition;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameKey {
    time: i64,
    selection: u64,
    generation: u64,
}

struct RenderedFrame {
    key: FrameKey,
    processed: ProcessedGrid,
    frame: RasterFrame,
}

struct Fade {
    target: RenderedFrame,
    transition: Transition,
}

pub struct AnimationController<P> {
    reader: TimeSeriesReader,
    rasterizer: GridRasterizer,
    presenter: P,
    config: PlaybackConfig,
    pacing: FramePacing,

    variable: String,
    viewport: Option<Viewport>,
    pending_viewport: Option<(Viewport, Instant)>,
    selection: u64,
    generation: u64,

    playing: bool,
    fetching: bool,
    current_time: Option<i64>,
    last_advance: Option<Instant>,

    displayed: Option<RenderedFrame>,
    fade: Option<Fade>,
    prerendered: Option<RenderedFrame>,
}

impl<P: FramePresenter> AnimationController<P> {
    pub fn new(
        reader: TimeSeriesReader,
        rasterizer: GridRasterizer,
        presenter: P,
        config: PlaybackConfig,
        variable: impl Into<String>,
    ) -> Self {
        let generation = reader.snapshot().generation;
        let pacing = FramePacing::from_config(&config);
        Self {
            reader,
            rasterizer,
            presenter,
            config,
            pacing,
            variable: variable.into(),
            viewport: None,
            pending_viewport: None,
            selection: 0,
            generation,
            playing: false,
            fetching: false,
            current_time: None,
            last_advance: None,
            displayed: None,
            fade: None,
            prerendered: None,
        }
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn viewport(&self) -> Option<&Viewport> {
        self.viewport.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Time index of the timestep playback is positioned on.
    pub fn current_time(&self) -> Option<i64> {
        self.current_time
    }

    /// Time index of the frame fully on screen.
    pub fn displayed_time(&self) -> Option<i64> {
        self.displayed.as_ref().map(|d| d.key.time)
    }

    pub fn phase(&self) -> AnimationPhase {
        if self.fade.is_some() {
            AnimationPhase::Transitioning
        } else if self.playing {
            AnimationPhase::Playing
        } else {
            AnimationPhase::Stopped
        }
    }

    pub fn state(&self) -> PlaybackState {
        let snapshot = self.reader.snapshot();
        PlaybackState {
            phase: self.phase(),
            current_index: self.current_time.and_then(|t| snapshot.position_of(t)),
            current_time: self.current_time,
            loaded_timesteps: snapshot.len(),
            playing: self.playing,
            interval_ms: self.pacing.interval(snapshot.len(), self.fetching).as_millis() as u64,
            variable: self.variable.clone(),
        }
    }

    /// Start playing. Does nothing while no timestep is loaded.
    pub fn play(&mut self, now: Instant) -> bool {
        let snapshot = self.reader.snapshot();
        if snapshot.is_empty() {
            debug!("Ignoring play, no timesteps loaded");
            return false;
        }
        self.playing = true;
        self.last_advance = Some(now);
        self.reconcile(&snapshot, now);
        true
    }

    /// Stop playing. An in-flight cross-fade snaps to its target.
    pub fn pause(&mut self) {
        self.playing = false;
        if let Some(fade) = self.fade.take() {
            self.finish_fade(fade);
        }
    }

    /// Jump to the `index`-th loaded timestep.
    pub fn seek(&mut self, index: usize, now: Instant) -> bool {
        let snapshot = self.reader.snapshot();
        let Some(record) = snapshot.timestep_by_position(index) else {
            return false;
        };
        self.current_time = Some(record.time);
        self.last_advance = Some(now);
        self.reconcile(&snapshot, now);
        true
    }

    pub fn set_variable(&mut self, variable: &str, now: Instant) {
        if self.variable == variable {
            return;
        }
        info!(from = %self.variable, to = %variable, "Switching variable");
        self.variable = variable.to_string();
        self.invalidate();

        let snapshot = self.reader.snapshot();
        self.reconcile(&snapshot, now);
    }

    /// Request a viewport change. The first viewport applies immediately;
    /// later ones are rendered once no newer change arrived within the
    /// debounce period.
    pub fn set_viewport(&mut self, viewport: Viewport, now: Instant) {
        if self.viewport.is_none() {
            self.viewport = Some(viewport);
            self.invalidate();
            let snapshot = self.reader.snapshot();
            self.reconcile(&snapshot, now);
        } else {
            self.pending_viewport = Some((viewport, now));
        }
    }

    /// Advance the animation to `now`.
    ///
    /// `fetching` reports whether background batches are still in flight and
    /// only affects frame pacing.
    pub fn tick(&mut self, now: Instant, fetching: bool) {
        self.fetching = fetching;
        let snapshot = self.reader.snapshot();

        if snapshot.generation != self.generation {
            debug!(generation = snapshot.generation, "Dataset replaced");
            self.generation = snapshot.generation;
            self.prerendered = None;
            if let Some(fade) = self.fade.take() {
                self.cancel_fade(fade);
            }
        }

        if snapshot.is_empty() {
            self.stop_and_clear();
            return;
        }

        if let Some((viewport, requested)) = self.pending_viewport.take() {
            if now.saturating_duration_since(requested) >= self.config.viewport_debounce() {
                self.viewport = Some(viewport);
                self.invalidate();
            } else {
                self.pending_viewport = Some((viewport, requested));
            }
        }

        if let Some(fade) = self.fade.take() {
            if fade.transition.is_complete(now) {
                self.finish_fade(fade);
            } else {
                if let Some(displayed) = &self.displayed {
                    self.presenter.blend(
                        &displayed.frame,
                        &fade.target.frame,
                        fade.transition.progress(now),
                    );
                }
                self.fade = Some(fade);
                return;
            }
        }

        if self.playing {
            let interval = self.pacing.interval(snapshot.len(), fetching);
            let due = self
                .last_advance
                .map_or(true, |last| now.saturating_duration_since(last) >= interval);
            if due {
                self.current_time = next_time(&snapshot, self.current_time);
                self.last_advance = Some(now);
            }
        }

        self.reconcile(&snapshot, now);
    }

    /// Values under the pointer in the displayed frame.
    pub fn hover(&self, lat: f64, lon: f64) -> Option<HoverInfo> {
        let displayed = self.displayed.as_ref()?;
        let zoom = self.viewport.as_ref()?.zoom();
        self.rasterizer.hover(&displayed.processed, lat, lon, zoom)
    }

    /// Min/max of the displayed frame.
    pub fn current_stats(&self) -> Option<ValueRange> {
        self.displayed.as_ref().and_then(|d| d.frame.range)
    }

    /// Bring the screen in line with the current position and selection.
    /// Does nothing while a fade is in flight; the tick that completes the
    /// fade reconciles again.
    fn reconcile(&mut self, snapshot: &DatasetSnapshot, now: Instant) {
        if self.fade.is_some() {
            return;
        }
        let Some(time) = resolve_time(snapshot, self.current_time) else {
            return;
        };
        self.current_time = Some(time);

        let key = self.key_for(time);
        if self.displayed.as_ref().map_or(true, |d| d.key != key) {
            if let Some(target) = self.take_or_render(snapshot, key) {
                self.show(target, now);
            }
        }

        if self.playing {
            self.prerender_next(snapshot);
        }
    }

    fn show(&mut self, target: RenderedFrame, now: Instant) {
        match self.displayed.take() {
            Some(displayed) if same_placement(&displayed.frame, &target.frame) => {
                self.presenter.blend(&displayed.frame, &target.frame, 0.0);
                self.displayed = Some(displayed);
                self.fade = Some(Fade {
                    target,
                    transition: Transition::new(now, self.config.fade()),
                });
            }
            previous => {
                self.presenter.present(&target.frame);
                self.displayed = Some(target);
                if let Some(previous) = previous {
                    self.presenter.dispose(previous.frame);
                }
            }
        }
    }

    fn finish_fade(&mut self, fade: Fade) {
        self.presenter.present(&fade.target.frame);
        if let Some(previous) = self.displayed.replace(fade.target) {
            self.presenter.dispose(previous.frame);
        }
    }

    fn cancel_fade(&mut self, fade: Fade) {
        self.presenter.dispose(fade.target.frame);
        if let Some(displayed) = &self.displayed {
            self.presenter.present(&displayed.frame);
        }
    }

    /// Drop everything rendered for the previous selection.
    fn invalidate(&mut self) {
        self.selection += 1;
        self.prerendered = None;
        if let Some(fade) = self.fade.take() {
            self.cancel_fade(fade);
        }
    }

    fn stop_and_clear(&mut self) {
        if self.playing || self.displayed.is_some() {
            info!("Dataset cleared, stopping playback");
        }
        self.playing = false;
        self.current_time = None;
        self.last_advance = None;
        self.prerendered = None;
        if let Some(fade) = self.fade.take() {
            self.presenter.dispose(fade.target.frame);
        }
        if let Some(displayed) = self.displayed.take() {
            self.presenter.dispose(displayed.frame);
        }
    }

    fn prerender_next(&mut self, snapshot: &DatasetSnapshot) {
        let Some(current) = self.current_time else {
            return;
        };
        let Some(next) = next_time(snapshot, Some(current)) else {
            return;
        };
        if next == current {
            return;
        }
        let key = self.key_for(next);
        if self.prerendered.as_ref().is_some_and(|p| p.key == key) {
            return;
        }
        self.prerendered = self.render(snapshot, key);
    }

    fn take_or_render(&mut self, snapshot: &DatasetSnapshot, key: FrameKey) -> Option<RenderedFrame> {
        match self.prerendered.take() {
            Some(ready) if ready.key == key => Some(ready),
            _ => self.render(snapshot, key),
        }
    }

    fn render(&self, snapshot: &DatasetSnapshot, key: FrameKey) -> Option<RenderedFrame> {
        let viewport = self.viewport.as_ref()?;
        let geometry = snapshot.geometry()?;
        let record = snapshot.timestep_at(key.time)?;
        let (processed, frame) = self.rasterizer.rasterize(
            &record,
            &geometry,
            &snapshot.scales(),
            &self.variable,
            viewport,
        );
        Some(RenderedFrame {
            key,
            processed,
            frame,
        })
    }

    fn key_for(&self, time: i64) -> FrameKey {
        FrameKey {
            time,
            selection: self.selection,
            generation: self.generation,
        }
    }
}

/// The loaded timestep after `current`, wrapping to the first.
fn next_time(snapshot: &DatasetSnapshot, current: Option<i64>) -> Option<i64> {
    let timesteps = snapshot.timesteps();
    let first = timesteps.first()?.time;
    let Some(current) = current else {
        return Some(first);
    };
    let next = timesteps.partition_point(|r| r.time <= current);
    Some(timesteps.get(next).map_or(first, |r| r.time))
}

/// `current` if it is loaded, otherwise the closest loaded timestep after
/// it, otherwise the first one.
fn resolve_time(snapshot: &DatasetSnapshot, current: Option<i64>) -> Option<i64> {
    let timesteps = snapshot.timesteps();
    let Some(current) = current else {
        return timesteps.first().map(|r| r.time);
    };
    let at = timesteps.partition_point(|r| r.time < current);
    timesteps
        .get(at)
        .or_else(|| timesteps.first())
        .map(|r| r.time)
}

/// Frames cover the same screen area and can be faded into each other.
fn same_placement(a: &RasterFrame, b: &RasterFrame) -> bool {
    a.width == b.width && a.height == b.height && a.bounds == b.bounds && a.zoom == b.zoom
}

#[cfg(test)]
mod tests {
    use super::*;
    use ingestion::{parse_batch, TimeSeriesStore};
    use test_utils::{bounds, SyntheticBatch};

    struct Null;

    impl FramePresenter for Null {
        fn present(&mut self, _: &RasterFrame) {}
        fn blend(&mut self, _: &RasterFrame, _: &RasterFrame, _: f32) {}
    }

    fn setup(times: &[i64]) -> (TimeSeriesStore, AnimationController<Null>) {
        let mut store = TimeSeriesStore::new();
        let batch = parse_batch(1, &SyntheticBatch::new(1, 1, times).to_json()).unwrap();
        store.initialize(batch.geometry, batch.scales, batch.records);

        let mut controller = AnimationController::new(
            store.reader(),
            GridRasterizer::default(),
            Null,
            PlaybackConfig::default(),
            "T2",
        );
        let viewport = Viewport::new(bounds((4.0, 44.0, 8.0, 47.5)), 7.0).unwrap();
        controller.set_viewport(viewport, Instant::now());
        (store, controller)
    }

    #[test]
    fn test_play_prerenders_next_frame() {
        let (_store, mut controller) = setup(&[0, 1, 2]);
        assert!(controller.play(Instant::now()));

        let ready = controller.prerendered.as_ref().unwrap();
        assert_eq!(ready.key.time, 1);
        assert_eq!(ready.key.selection, controller.selection);
    }

    #[test]
    fn test_prerender_follows_selection() {
        let (_store, mut controller) = setup(&[0, 1, 2]);
        let now = Instant::now();
        controller.play(now);
        let before = controller.prerendered.as_ref().unwrap().key;

        controller.set_variable("RH2", now);

        let after = controller.prerendered.as_ref().unwrap();
        assert_ne!(after.key, before);
        assert_eq!(after.key.selection, controller.selection);
        assert_eq!(after.frame.variable, "RH2");
    }

    #[test]
    fn test_stale_prerender_is_not_shown() {
        let (_store, mut controller) = setup(&[0, 1, 2]);
        let now = Instant::now();
        controller.play(now);

        // Simulate a frame rendered before a selection change.
        let stale = controller.prerendered.take().map(|mut p| {
            p.key.selection = controller.selection + 7;
            p
        });
        controller.prerendered = stale;

        let key = controller.key_for(1);
        let snapshot = controller.reader.snapshot();
        let frame = controller.take_or_render(&snapshot, key).unwrap();
        assert_eq!(frame.key, key);
    }

    #[test]
    fn test_single_timestep_has_nothing_to_prerender() {
        let (_store, mut controller) = setup(&[5]);
        controller.play(Instant::now());
        assert!(controller.prerendered.is_none());
        assert_eq!(controller.displayed_time(), Some(5));
    }

    #[test]
    fn test_next_and_resolve_time() {
        let (store, _controller) = setup(&[0, 2, 4]);
        let snapshot = store.snapshot();

        assert_eq!(next_time(&snapshot, None), Some(0));
        assert_eq!(next_time(&snapshot, Some(2)), Some(4));
        assert_eq!(next_time(&snapshot, Some(4)), Some(0));
        assert_eq!(resolve_time(&snapshot, Some(3)), Some(4));
        assert_eq!(resolve_time(&snapshot, Some(9)), Some(0));
        assert_eq!(resolve_time(&snapshot, Some(2)), Some(2));
    }
}
