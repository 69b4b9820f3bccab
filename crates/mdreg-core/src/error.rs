//! Error types for image and series construction.

use thiserror::Error;

/// Errors raised while building or reading images, series and fields.
#[derive(Error, Debug)]
pub enum ImageError {
    /// A series must contain at least one frame.
    #[error("Image series is empty")]
    EmptySeries,

    /// Frames or fields do not share the same spatial shape.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Flat buffer length does not match the requested shape.
    #[error("Buffer of length {actual} cannot fill {expected} elements")]
    LengthMismatch { expected: usize, actual: usize },

    /// Slice index outside the volume.
    #[error("Index {index} out of bounds for axis of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Tensor data could not be read back to the host.
    #[error("Tensor data error: {0}")]
    Data(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, ImageError>;
