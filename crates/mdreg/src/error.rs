//! Error types for the alternating driver.

use mdreg_coreg::CoregError;
use mdreg_core::ImageError;
use mdreg_fit::FitError;
use thiserror::Error;

/// Errors from a motion-correction run. Failures of the fitting and
/// coregistration steps are passed through unchanged.
#[derive(Error, Debug)]
pub enum MdregError {
    #[error(transparent)]
    Fit(#[from] FitError),

    #[error(transparent)]
    Coreg(#[from] CoregError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A configuration document could not be parsed.
    #[error("Configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MdregError>;

impl MdregError {
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }
}
