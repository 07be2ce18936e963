//! The grid rasterizer: process, render and hover behind one configured
//! handle.

use forecast_common::{GridGeometry, TimestepRecord, VariableScale};
use projection::Viewport;

use crate::config::RasterConfig;
use crate::hover::{hover, HoverInfo};
use crate::process::{process, ProcessedGrid};
use crate::raster::{render, RasterFrame};

#[derive(Debug, Clone, Default)]
pub struct GridRasterizer {
    config: RasterConfig,
}

impl GridRasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    pub fn process(
        &self,
        record: &TimestepRecord,
        geometry: &GridGeometry,
        scales: &VariableScale,
        variable: &str,
    ) -> ProcessedGrid {
        process(record, geometry, scales, variable)
    }

    pub fn render(&self, processed: &ProcessedGrid, viewport: &Viewport) -> RasterFrame {
        render(processed, viewport, &self.config)
    }

    /// Process and render in one step.
    pub fn rasterize(
        &self,
        record: &TimestepRecord,
        geometry: &GridGeometry,
        scales: &VariableScale,
        variable: &str,
        viewport: &Viewport,
    ) -> (ProcessedGrid, RasterFrame) {
        let processed = self.process(record, geometry, scales, variable);
        let frame = self.render(&processed, viewport);
        (processed, frame)
    }

    pub fn hover(&self, processed: &ProcessedGrid, lat: f64, lon: f64, zoom: f64) -> Option<HoverInfo> {
        hover(processed, lat, lon, zoom, &self.config)
    }
}
