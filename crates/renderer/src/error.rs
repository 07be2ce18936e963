//! Error types for rendering.

use projection::ProjectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Viewport error: {0}")]
    Projection(#[from] ProjectionError),

    #[error("Frame size mismatch: {expected:?} vs {actual:?}")]
    SizeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Pixel buffer holds {actual} bytes, expected {expected}")]
    BufferLength { expected: usize, actual: usize },

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RenderError>;
