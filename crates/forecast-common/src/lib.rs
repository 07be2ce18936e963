//! Common types shared across the forecast viewer crates.

pub mod bbox;
pub mod dataset;
pub mod error;
pub mod grid;
pub mod style;
pub mod time;

pub use bbox::BoundingBox;
pub use dataset::{TimestepRecord, VariableData, VariableScale};
pub use error::{ForecastError, ForecastResult};
pub use grid::{GridCellIndex, GridGeometry, MAX_GRID_CELLS};
pub use style::{Color, ColorRamp, ColorStop};
pub use time::{parse_forecast_timestamp, ForecastTimeRange};
