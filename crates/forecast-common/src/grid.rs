//! Regular lat/lon grid geometry for forecast datasets.

use crate::{BoundingBox, ForecastError, ForecastResult};
use serde::{Deserialize, Serialize};

/// Largest number of cells a grid may have.
pub const MAX_GRID_CELLS: usize = 64 * 1024 * 1024;

/// Geometry of a regular lat/lon grid.
///
/// Cell `(row, col)` spans from `corner + (row, col) * step` to
/// `corner + (row + 1, col + 1) * step`. Values are stored row-major, so the
/// flat index of a cell is `row * cols + col`. Steps may be negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// Latitude of the grid corner (degrees)
    pub corner_lat: f64,
    /// Longitude of the grid corner (degrees)
    pub corner_lon: f64,
    /// Number of rows (latitude direction)
    pub rows: usize,
    /// Number of columns (longitude direction)
    pub cols: usize,
    /// Latitude step per row (degrees)
    pub lat_step: f64,
    /// Longitude step per column (degrees)
    pub lon_step: f64,
}

/// Row/column address of a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCellIndex {
    pub row: usize,
    pub col: usize,
}

impl GridGeometry {
    /// Create a grid geometry, rejecting empty or degenerate grids.
    pub fn new(
        corner_lat: f64,
        corner_lon: f64,
        rows: usize,
        cols: usize,
        lat_step: f64,
        lon_step: f64,
    ) -> ForecastResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(ForecastError::InvalidGeometry(format!(
                "grid size must be positive, got {}x{}",
                rows, cols
            )));
        }
        match rows.checked_mul(cols) {
            Some(cells) if cells <= MAX_GRID_CELLS => {}
            _ => {
                return Err(ForecastError::InvalidGeometry(format!(
                    "grid of {}x{} cells exceeds {} cells",
                    rows, cols, MAX_GRID_CELLS
                )))
            }
        }
        if !corner_lat.is_finite() || !corner_lon.is_finite() {
            return Err(ForecastError::InvalidGeometry(
                "corner coordinate is not finite".to_string(),
            ));
        }
        for (axis, step) in [("lat", lat_step), ("lon", lon_step)] {
            if !step.is_finite() || step == 0.0 {
                return Err(ForecastError::InvalidGeometry(format!(
                    "{} step must be finite and non-zero, got {}",
                    axis, step
                )));
            }
        }

        Ok(Self {
            corner_lat,
            corner_lon,
            rows,
            cols,
            lat_step,
            lon_step,
        })
    }

    /// Total number of cells. Saturates for geometries built without
    /// [`new`](Self::new).
    pub fn len(&self) -> usize {
        self.rows.saturating_mul(self.cols)
    }

    /// Check if grid is empty.
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Flat (row-major) index for a cell.
    pub fn flat_index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Inverse of [`flat_index`](Self::flat_index).
    pub fn cell_at(&self, index: usize) -> Option<GridCellIndex> {
        if index >= self.len() {
            return None;
        }
        Some(GridCellIndex {
            row: index / self.cols,
            col: index % self.cols,
        })
    }

    /// Geographic bounds of one cell.
    pub fn cell_bounds(&self, row: usize, col: usize) -> ForecastResult<BoundingBox> {
        if row >= self.rows || col >= self.cols {
            return Err(ForecastError::IndexOutOfRange { row, col });
        }
        let lat = self.corner_lat + row as f64 * self.lat_step;
        let lon = self.corner_lon + col as f64 * self.lon_step;
        Ok(BoundingBox::from_corners(
            lat,
            lon,
            lat + self.lat_step,
            lon + self.lon_step,
        ))
    }

    /// Center of one cell as (lat, lon).
    pub fn cell_center(&self, row: usize, col: usize) -> ForecastResult<(f64, f64)> {
        Ok(self.cell_bounds(row, col)?.center())
    }

    /// Bounding box of the whole grid.
    pub fn extent(&self) -> BoundingBox {
        let far_lat = self.corner_lat + self.rows as f64 * self.lat_step;
        let far_lon = self.corner_lon + self.cols as f64 * self.lon_step;
        BoundingBox::from_corners(self.corner_lat, self.corner_lon, far_lat, far_lon)
    }
}
