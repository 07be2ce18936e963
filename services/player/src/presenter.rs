//! Presents frames by writing them to disk as PNG files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use playback::FramePresenter;
use renderer::{cross_fade, png, RasterFrame};
use tracing::{debug, warn};

pub struct PngPresenter {
    dir: PathBuf,
    write_transitions: bool,
    sequence: u64,
    frames_written: u64,
}

impl PngPresenter {
    pub fn new(dir: &Path, write_transitions: bool) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_transitions,
            sequence: 0,
            frames_written: 0,
        })
    }

    /// Full frames written so far, not counting transition composites.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    fn write(&mut self, name: String, encoded: renderer::Result<Vec<u8>>) -> bool {
        let path = self.dir.join(name);
        let result = encoded
            .map_err(anyhow::Error::from)
            .and_then(|bytes| std::fs::write(&path, bytes).map_err(anyhow::Error::from));
        match result {
            Ok(()) => {
                self.sequence += 1;
                debug!(path = %path.display(), "Wrote frame");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write frame");
                false
            }
        }
    }
}

impl FramePresenter for PngPresenter {
    fn present(&mut self, frame: &RasterFrame) {
        let name = format!(
            "{:05}_{}_t{:03}.png",
            self.sequence, frame.variable, frame.time
        );
        if self.write(name, png::encode_frame(frame)) {
            self.frames_written += 1;
        }
    }

    fn blend(&mut self, from: &RasterFrame, to: &RasterFrame, progress: f32) {
        if !self.write_transitions || progress <= 0.0 {
            return;
        }
        let name = format!(
            "{:05}_{}_t{:03}-t{:03}_{:03}.png",
            self.sequence,
            to.variable,
            from.time,
            to.time,
            (progress * 100.0).round() as u32
        );
        let encoded = cross_fade(from, to, progress)
            .and_then(|pixels| png::encode_auto(&pixels, to.width, to.height));
        self.write(name, encoded);
    }
}
