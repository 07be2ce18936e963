//! Drawing processed cells into a viewport-aligned RGBA raster.

use forecast_common::{BoundingBox, Color};
use projection::{Projection, ScreenRect, Viewport};
use rayon::prelude::*;
use tracing::trace;

use crate::config::RasterConfig;
use crate::gradient::interpolate;
use crate::process::{ProcessedGrid, ValueRange};

/// A rendered frame: RGBA pixels plus what they were rendered for.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterFrame {
    /// Row-major RGBA, 4 bytes per pixel, not premultiplied
    pub pixels: Vec<u8>,
    pub width: usize,
    pub height: usize,
    /// Range used for color mapping
    pub range: Option<ValueRange>,
    pub bounds: BoundingBox,
    pub zoom: f64,
    pub time: i64,
    pub variable: String,
}

impl RasterFrame {
    /// A fully transparent frame.
    pub fn blank(width: usize, height: usize, bounds: BoundingBox, zoom: f64) -> Self {
        Self {
            pixels: vec![0; width * height * 4],
            width,
            height,
            range: None,
            bounds,
            zoom,
            time: 0,
            variable: String::new(),
        }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Color> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y * self.width + x) * 4;
        Some(Color::new(
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ))
    }

    /// Number of pixels with non-zero alpha.
    pub fn painted_pixels(&self) -> usize {
        self.pixels.chunks_exact(4).filter(|p| p[3] > 0).count()
    }
}

/// Render a processed grid for the map viewport.
pub fn render(processed: &ProcessedGrid, viewport: &Viewport, config: &RasterConfig) -> RasterFrame {
    render_projected(
        processed,
        viewport,
        viewport.size(),
        viewport.bounds(),
        viewport.zoom(),
        config,
    )
}

/// Render with any projection that maps into a `size` pixel raster covering
/// `bounds`.
pub fn render_projected<P>(
    processed: &ProcessedGrid,
    projection: &P,
    size: (usize, usize),
    bounds: BoundingBox,
    zoom: f64,
    config: &RasterConfig,
) -> RasterFrame
where
    P: Projection + Sync,
{
    let (width, height) = size;
    let mut frame = RasterFrame::blank(width, height, bounds, zoom);
    frame.range = processed.range;
    frame.time = processed.time;
    frame.variable = processed.variable.clone();

    let Some(visible) = processed.extent.intersection(&bounds) else {
        trace!(time = processed.time, "Dataset outside viewport");
        return frame;
    };

    let ramp = config.ramp_for(&processed.variable);
    let spans: Vec<(PixelSpan, Color)> = processed
        .cells
        .par_iter()
        .filter(|cell| cell.bounds.intersects(&visible))
        .filter_map(|cell| {
            let rect = projection.project_bounds(&cell.bounds);
            if rect.width() <= config.min_cell_pixels || rect.height() <= config.min_cell_pixels {
                return None;
            }
            let span = PixelSpan::clip(&rect, width, height)?;
            let color = match (cell.value, processed.range) {
                (Some(value), Some(range)) => interpolate(value, range.min, range.max, &ramp),
                _ => config.no_data_color,
            };
            Some((span, color.with_opacity(config.opacity)))
        })
        .collect();

    for (span, color) in &spans {
        span.fill(&mut frame.pixels, width, *color);
    }

    trace!(
        time = processed.time,
        variable = %processed.variable,
        cells = spans.len(),
        "Rendered frame"
    );
    frame
}

/// Half-open pixel rectangle inside the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelSpan {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl PixelSpan {
    /// Pixels whose area the rectangle covers, at least one per axis.
    fn clip(rect: &ScreenRect, width: usize, height: usize) -> Option<Self> {
        let axis = |lo: f64, hi: f64, limit: usize| -> Option<(usize, usize)> {
            if hi <= 0.0 || lo >= limit as f64 {
                return None;
            }
            let start = lo.round().max(0.0) as usize;
            let end = (hi.round() as usize).max(start + 1).min(limit);
            (start < end).then_some((start, end))
        };

        let (x0, x1) = axis(rect.x0, rect.x1, width)?;
        let (y0, y1) = axis(rect.y0, rect.y1, height)?;
        Some(Self { x0, y0, x1, y1 })
    }

    fn fill(&self, pixels: &mut [u8], width: usize, color: Color) {
        let rgba = [color.r, color.g, color.b, color.a];
        for y in self.y0..self.y1 {
            let row = &mut pixels[(y * width + self.x0) * 4..(y * width + self.x1) * 4];
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
    }
}
