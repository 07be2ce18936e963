//! Map projection for placing grid cells on screen.
//!
//! Implements the spherical Web Mercator projection used by slippy-map tile
//! renderers, plus a [`Viewport`] that anchors it to the visible map area.

pub mod mercator;
pub mod viewport;

pub use mercator::{Projection, ScreenPoint, ScreenRect, WebMercator};
pub use viewport::{ProjectionError, Viewport};
