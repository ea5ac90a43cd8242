//! Error types for the dashboard layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("composite error: {0}")]
    Composite(#[from] compositor::CompositeError),

    #[error("overlay error: {0}")]
    Overlay(#[from] overlay::OverlayError),

    /// The event catalogue could not be parsed.
    #[error("invalid event catalogue: {0}")]
    InvalidCatalogue(String),

    #[error("unknown scenario: {0}")]
    UnknownScenario(String),

    /// A layer was requested that the controller has no source for.
    #[error("layer not configured: {0}")]
    NotConfigured(String),
}

impl DashboardError {
    pub fn invalid_catalogue(msg: impl Into<String>) -> Self {
        Self::InvalidCatalogue(msg.into())
    }
}

impl From<serde_json::Error> for DashboardError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidCatalogue(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
