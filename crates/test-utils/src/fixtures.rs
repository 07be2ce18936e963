//! Common test fixtures for forecast player tests.

use std::path::PathBuf;

use forecast_common::{BoundingBox, GridGeometry};
use tempfile::TempDir;

/// Common bounding box definitions for testing, as
/// `(min_lon, min_lat, max_lon, max_lat)`.
pub mod bbox {
    /// Global bounding box (-180 to 180, -85 to 85)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -85.0, 180.0, 85.0);

    /// Europe bounding box
    pub const EUROPE: (f64, f64, f64, f64) = (-15.0, 35.0, 45.0, 72.0);

    /// Area covered by the default synthetic batch grid
    pub const SYNTHETIC_GRID: (f64, f64, f64, f64) = (5.0, 45.0, 7.0, 46.5);

    /// Far from the synthetic grid
    pub const SOUTH_PACIFIC: (f64, f64, f64, f64) = (-150.0, -40.0, -140.0, -30.0);
}

pub fn bounds(edges: (f64, f64, f64, f64)) -> BoundingBox {
    BoundingBox::new(edges.0, edges.1, edges.2, edges.3)
}

/// Grid matching [`SyntheticBatch::new`](crate::SyntheticBatch::new).
pub fn synthetic_grid() -> GridGeometry {
    GridGeometry {
        corner_lat: 45.0,
        corner_lon: 5.0,
        rows: 3,
        cols: 4,
        lat_step: 0.5,
        lon_step: 0.5,
    }
}

/// A fresh directory and a cache database path inside it. Keep the
/// `TempDir` alive for as long as the path is used.
pub fn temp_cache_path() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("batch-cache.db");
    (dir, path)
}
