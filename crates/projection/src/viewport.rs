//! The visible map area: geographic bounds at a zoom level.

use forecast_common::BoundingBox;
use thiserror::Error;

use crate::mercator::{Projection, ScreenPoint, WebMercator, MAX_LATITUDE};

/// Largest raster edge a viewport may produce.
pub const MAX_RASTER_DIMENSION: usize = 8192;

/// Highest zoom level accepted.
pub const MAX_ZOOM: f64 = 24.0;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Invalid viewport bounds: {0}")]
    InvalidBounds(String),

    #[error("Zoom level {0} outside [0, 24]")]
    InvalidZoom(f64),

    #[error("Viewport raster {width}x{height} exceeds {max} pixels per side")]
    TooLarge {
        width: usize,
        height: usize,
        max: usize,
    },
}

/// Current map viewport.
///
/// Screen coordinates are pixels relative to the top-left corner of
/// `bounds`, so a raster rendered for this viewport lines up with the map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    bounds: BoundingBox,
    zoom: f64,
    mercator: WebMercator,
    origin: ScreenPoint,
    width: usize,
    height: usize,
}

impl Viewport {
    pub fn new(bounds: BoundingBox, zoom: f64) -> Result<Self, ProjectionError> {
        if !(0.0..=MAX_ZOOM).contains(&zoom) {
            return Err(ProjectionError::InvalidZoom(zoom));
        }
        let finite = [bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y]
            .iter()
            .all(|v| v.is_finite());
        if !finite || bounds.min_x >= bounds.max_x || bounds.min_y >= bounds.max_y {
            return Err(ProjectionError::InvalidBounds(format!("{:?}", bounds)));
        }
        if bounds.max_y <= -MAX_LATITUDE || bounds.min_y >= MAX_LATITUDE {
            return Err(ProjectionError::InvalidBounds(
                "bounds lie entirely outside the Mercator latitude range".to_string(),
            ));
        }

        let mercator = WebMercator::new(zoom);
        let rect = mercator.project_bounds(&bounds);
        let width = rect.width().ceil().max(1.0) as usize;
        let height = rect.height().ceil().max(1.0) as usize;
        if width > MAX_RASTER_DIMENSION || height > MAX_RASTER_DIMENSION {
            return Err(ProjectionError::TooLarge {
                width,
                height,
                max: MAX_RASTER_DIMENSION,
            });
        }

        Ok(Self {
            bounds,
            zoom,
            mercator,
            origin: ScreenPoint {
                x: rect.x0,
                y: rect.y0,
            },
            width,
            height,
        })
    }

    pub fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Raster size in pixels as (width, height).
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Map a viewport pixel back to (lat, lon).
    pub fn unproject(&self, point: ScreenPoint) -> (f64, f64) {
        self.mercator.unproject(ScreenPoint {
            x: point.x + self.origin.x,
            y: point.y + self.origin.y,
        })
    }
}

impl Projection for Viewport {
    fn project(&self, lat: f64, lon: f64) -> ScreenPoint {
        let world = self.mercator.project(lat, lon);
        ScreenPoint {
            x: world.x - self.origin.x,
            y: world.y - self.origin.y,
        }
    }
}
