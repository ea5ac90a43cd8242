//! Error types shared by the heat atlas crates.

use thiserror::Error;

/// Result type alias using AtlasError.
pub type AtlasResult<T> = Result<T, AtlasError>;

#[derive(Debug, Error)]
pub enum AtlasError {
    // === Input Errors ===
    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Invalid granule descriptor '{id}': {message}")]
    InvalidGranule { id: String, message: String },

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    // === Data Errors ===
    #[error("Failed to read data: {0}")]
    DataReadError(String),

    #[error("Invalid GeoJSON: {0}")]
    GeoJsonError(String),

    // === Infrastructure Errors ===
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AtlasError {
    pub fn invalid_granule(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidGranule {
            id: id.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for AtlasError {
    fn from(err: std::io::Error) -> Self {
        AtlasError::DataReadError(err.to_string())
    }
}

impl From<serde_json::Error> for AtlasError {
    fn from(err: serde_json::Error) -> Self {
        AtlasError::InternalError(format!("JSON error: {}", err))
    }
}

impl From<crate::bbox::BboxParseError> for AtlasError {
    fn from(err: crate::bbox::BboxParseError) -> Self {
        AtlasError::InvalidRegion(err.to_string())
    }
}

impl From<crate::time::TimeParseError> for AtlasError {
    fn from(err: crate::time::TimeParseError) -> Self {
        AtlasError::InvalidTime(err.to_string())
    }
}
