//! Raster rendering for forecast grids.
//!
//! - [`process`]: timestep + variable to scaled, georeferenced cells
//! - [`raster`]: cells to a viewport-aligned RGBA frame
//! - [`hover`]: pointer lookups
//! - [`composite`]: cross-fade blending between frames
//! - [`png`]: frame export

pub mod composite;
pub mod config;
pub mod error;
pub mod gradient;
pub mod hover;
pub mod png;
pub mod process;
pub mod raster;
pub mod rasterizer;

pub use composite::cross_fade;
pub use config::RasterConfig;
pub use error::{RenderError, Result};
pub use gradient::{interpolate, normalize, NO_DATA_COLOR};
pub use hover::HoverInfo;
pub use process::{ProcessedCell, ProcessedGrid, ValueRange};
pub use raster::{render_projected, RasterFrame};
pub use rasterizer::GridRasterizer;
