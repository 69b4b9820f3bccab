//! Run configuration, loadable from TOML.
//!
//! ```toml
//! [model]
//! func = "spgr_vfa_nonlin"
//! fa = [2.0, 5.0, 10.0, 15.0]
//! tr = 3.7
//!
//! [coreg]
//! package = "elastix"
//! [coreg.bspline]
//! grid_spacing = 24.0
//!
//! [fit]
//! parallel = true
//!
//! [driver]
//! max_iterations = 5
//! precision = 0.5
//! ```

use std::path::Path;
use mdreg_coreg::CoregConfig;
use mdreg_fit::{FitOptions, ModelConfig};
use serde::{Deserialize, Serialize};
use crate::error::{MdregError, Result};

/// Iteration controls of the alternating loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Upper bound on fit-then-coregister passes.
    pub max_iterations: usize,
    /// Stop once no pixel of any frame moves by more than this many pixels
    /// between two passes. Zero runs all `max_iterations` passes.
    pub precision: f64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            precision: 1.0,
        }
    }
}

impl DriverConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_precision(mut self, precision: f64) -> Self {
        self.precision = precision;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(MdregError::invalid_configuration("max_iterations must be at least 1"));
        }
        if !self.precision.is_finite() || self.precision < 0.0 {
            return Err(MdregError::invalid_configuration(format!(
                "precision must be non-negative, got {}",
                self.precision
            )));
        }
        Ok(())
    }
}

/// Everything a run needs besides the data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MdregConfig {
    pub model: ModelConfig,
    pub coreg: CoregConfig,
    pub fit: FitOptions,
    pub driver: DriverConfig,
}

impl MdregConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    pub fn with_coreg(mut self, coreg: CoregConfig) -> Self {
        self.coreg = coreg;
        self
    }

    pub fn with_fit(mut self, fit: FitOptions) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_driver(mut self, driver: DriverConfig) -> Self {
        self.driver = driver;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.driver.validate()?;
        self.coreg.validate()?;
        Ok(())
    }
}
