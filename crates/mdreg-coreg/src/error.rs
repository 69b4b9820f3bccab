//! Error types for coregistration.

use mdreg_core::ImageError;
use thiserror::Error;

/// Main error type for coregistration operations.
#[derive(Error, Debug)]
pub enum CoregError {
    /// Invalid engine or loop configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Moving and fixed images do not share a grid.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// The loss became NaN or infinite.
    #[error("Numerical instability: {0}")]
    NumericalInstability(String),

    /// A transform produced by one engine was handed to another.
    #[error("Transform mismatch: {engine} engine cannot apply a {transform} transform")]
    TransformMismatch {
        engine: &'static str,
        transform: &'static str,
    },

    /// Reading or writing a transform artifact failed.
    #[error("Artifact I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A transform artifact could not be encoded or decoded.
    #[error("Artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Result type for coregistration operations.
pub type Result<T> = std::result::Result<T, CoregError>;

impl CoregError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a numerical instability error.
    pub fn numerical_instability(msg: impl Into<String>) -> Self {
        Self::NumericalInstability(msg.into())
    }
}
