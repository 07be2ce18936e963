//! Spherical Web Mercator (EPSG:3857) in pixel space.

use std::f64::consts::PI;

use forecast_common::BoundingBox;
use serde::{Deserialize, Serialize};

/// Latitude limit of the Web Mercator square.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Tile edge length in pixels at zoom 0.
pub const TILE_SIZE: f64 = 256.0;

/// A point in screen pixels (x right, y down).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// An axis-aligned screen rectangle with `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl ScreenRect {
    pub fn from_points(a: ScreenPoint, b: ScreenPoint) -> Self {
        Self {
            x0: a.x.min(b.x),
            y0: a.y.min(b.y),
            x1: a.x.max(b.x),
            y1: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// Anything that can place geographic coordinates on screen.
///
/// The rasterizer only depends on this trait, so its cell math can be tested
/// with a trivial linear projection.
pub trait Projection {
    /// Project (lat, lon) in degrees to screen pixels.
    fn project(&self, lat: f64, lon: f64) -> ScreenPoint;

    /// Screen rectangle covered by a geographic box.
    fn project_bounds(&self, bounds: &BoundingBox) -> ScreenRect {
        let a = self.project(bounds.max_y, bounds.min_x);
        let b = self.project(bounds.min_y, bounds.max_x);
        ScreenRect::from_points(a, b)
    }
}

/// Web Mercator at a fixed zoom, in world pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WebMercator {
    zoom: f64,
    world_size: f64,
}

impl WebMercator {
    pub fn new(zoom: f64) -> Self {
        Self {
            zoom,
            world_size: TILE_SIZE * 2f64.powf(zoom),
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Width of the whole world in pixels at this zoom.
    pub fn world_size(&self) -> f64 {
        self.world_size
    }

    /// Inverse projection from world pixels to (lat, lon).
    pub fn unproject(&self, point: ScreenPoint) -> (f64, f64) {
        let lon = point.x / self.world_size * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * point.y / self.world_size);
        let lat = n.sinh().atan().to_degrees();
        (lat, lon)
    }
}

impl Projection for WebMercator {
    fn project(&self, lat: f64, lon: f64) -> ScreenPoint {
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let sin_lat = lat.to_radians().sin();

        let x = (lon + 180.0) / 360.0 * self.world_size;
        let y = (0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI)) * self.world_size;

        ScreenPoint { x, y }
    }
}
