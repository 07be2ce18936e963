//! Pointer inspection of a processed grid.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::RasterConfig;
use crate::process::ProcessedGrid;

/// Values under the pointer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoverInfo {
    pub row: usize,
    pub col: usize,
    /// Cell center as (lat, lon)
    pub center: (f64, f64),
    /// Scaled value of every variable at the cell
    pub values: BTreeMap<String, Option<f64>>,
}

/// Find the cell containing (lat, lon).
///
/// Returns `None` below the configured minimum zoom or when no cell contains
/// the point. A point on a shared edge resolves to the first cell in
/// row-major order.
pub fn hover(
    processed: &ProcessedGrid,
    lat: f64,
    lon: f64,
    zoom: f64,
    config: &RasterConfig,
) -> Option<HoverInfo> {
    if zoom < config.hover_min_zoom || !processed.extent.contains(lat, lon) {
        return None;
    }

    let cell = processed
        .cells
        .iter()
        .find(|cell| cell.bounds.contains(lat, lon))?;

    let values = processed
        .variables
        .iter()
        .cloned()
        .zip(cell.values.iter().copied())
        .collect();

    Some(HoverInfo {
        row: cell.row,
        col: cell.col,
        center: cell.bounds.center(),
        values,
    })
}
