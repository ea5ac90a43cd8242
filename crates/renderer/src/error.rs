//! Rendering error types.

use thiserror::Error;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid color ramp: {0}")]
    InvalidRamp(String),

    #[error("invalid color '{0}': expected #RRGGBB")]
    InvalidColor(String),

    #[error("pixel buffer has {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("style not found: {0}")]
    StyleNotFound(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("failed to read style file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse style file: {0}")]
    Json(#[from] serde_json::Error),
}
