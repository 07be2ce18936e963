//! Error types shared by the forecast viewer crates.

use thiserror::Error;

/// Result type alias using ForecastError.
pub type ForecastResult<T> = Result<T, ForecastError>;

/// Errors raised while validating or interpreting forecast data.
#[derive(Debug, Error)]
pub enum ForecastError {
    // === Geometry Errors ===
    #[error("Invalid grid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Grid index out of range: row {row}, col {col}")]
    IndexOutOfRange { row: usize, col: usize },

    // === Data Errors ===
    #[error("Variable '{variable}' has {actual} values, expected {expected}")]
    LengthMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid scale factor for '{variable}': {value}")]
    InvalidScale { variable: String, value: f64 },

    #[error("Invalid forecast timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid color ramp: {0}")]
    InvalidRamp(String),
}
