//! Projection error types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("invalid UTM zone {0}: must be 1-60")]
    InvalidZone(u8),

    #[error("transformed coordinate out of WGS84 range: lon={lon}, lat={lat}")]
    OutOfRange { lon: f64, lat: f64 },

    #[error("non-finite input coordinate: x={x}, y={y}")]
    NonFinite { x: f64, y: f64 },
}
