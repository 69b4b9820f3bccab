//! Error types for model fitting.

use mdreg_core::ImageError;
use thiserror::Error;

/// Errors raised while building models or fitting them to a series.
#[derive(Error, Debug)]
pub enum FitError {
    /// The model's independent variable does not match the series length.
    #[error("Model '{model}' has {expected} xdata values but the series has {actual} frames")]
    FrameCountMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    /// Inconsistent custom model definition.
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Invalid fitter or model configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Result type for fitting operations.
pub type Result<T> = std::result::Result<T, FitError>;

impl FitError {
    pub fn invalid_model(msg: impl Into<String>) -> Self {
        Self::InvalidModel(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
