//! Error types for composite building.

use thiserror::Error;

/// Errors that can occur while building a composite.
///
/// Per-granule failures (open, read, decode, geometry) are caught by the
/// reader and turned into discard statistics; only configuration and
/// internal failures reach the caller of `Compositor::build`.
#[derive(Error, Debug)]
pub enum CompositeError {
    /// Failed to open the raster source.
    #[error("failed to open raster: {0}")]
    OpenFailed(String),

    /// Failed to read raster data.
    #[error("failed to read raster data: {0}")]
    ReadFailed(String),

    /// The raster bytes could not be decoded.
    #[error("failed to decode raster: {0}")]
    DecodeFailed(String),

    /// Raster georeferencing is missing or unusable.
    #[error("invalid raster geometry: {0}")]
    InvalidGeometry(String),

    /// Reprojection failure.
    #[error("projection error: {0}")]
    Projection(#[from] projection::ProjectionError),

    /// Colorization or encoding failure.
    #[error("render error: {0}")]
    Render(#[from] renderer::RenderError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Background task failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CompositeError {
    /// Create an OpenFailed error.
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create a DecodeFailed error.
    pub fn decode_failed(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }

    /// Create an InvalidGeometry error.
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// Geometry problems drop a granule; everything else is an I/O failure.
    pub fn is_geometry(&self) -> bool {
        matches!(self, Self::InvalidGeometry(_) | Self::Projection(_))
    }
}

impl From<std::io::Error> for CompositeError {
    fn from(err: std::io::Error) -> Self {
        Self::ReadFailed(err.to_string())
    }
}

impl From<reqwest::Error> for CompositeError {
    fn from(err: reqwest::Error) -> Self {
        Self::OpenFailed(err.to_string())
    }
}

impl From<tiff::TiffError> for CompositeError {
    fn from(err: tiff::TiffError) -> Self {
        Self::DecodeFailed(err.to_string())
    }
}

impl From<tokio::task::JoinError> for CompositeError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type for composite operations.
pub type Result<T> = std::result::Result<T, CompositeError>;
