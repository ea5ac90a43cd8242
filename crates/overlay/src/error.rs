//! Overlay error types.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OverlayError {
    #[error("failed to create overlay context: {0}")]
    ContextCreation(String),

    #[error("failed to upload bitmap: {0}")]
    Upload(String),

    #[error("failed to apply layer list: {0}")]
    Apply(String),
}

pub type Result<T> = std::result::Result<T, OverlayError>;
