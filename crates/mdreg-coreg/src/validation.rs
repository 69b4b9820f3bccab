//! Validation of engine options and optimisation progress.

use burn::tensor::backend::Backend;
use mdreg_core::Image;
use crate::error::{CoregError, Result};

/// Moving and fixed images must share a grid.
pub fn validate_image_shapes<B: Backend, const D: usize>(moving: &Image<B, D>, fixed: &Image<B, D>) -> Result<()> {
    let fixed_shape = fixed.shape();
    let moving_shape = moving.shape();
    if fixed_shape != moving_shape {
        return Err(CoregError::ShapeMismatch {
            expected: fixed_shape.to_vec(),
            actual: moving_shape.to_vec(),
        });
    }
    Ok(())
}

pub fn validate_learning_rate(lr: f64) -> Result<()> {
    if !lr.is_finite() || lr <= 0.0 {
        return Err(CoregError::invalid_configuration(format!(
            "Learning rate must be positive, got {}",
            lr
        )));
    }
    if lr > 10.0 {
        return Err(CoregError::invalid_configuration(format!("Learning rate too large: {}", lr)));
    }
    if lr < 1e-10 {
        return Err(CoregError::invalid_configuration(format!("Learning rate too small: {}", lr)));
    }
    Ok(())
}

pub fn validate_iterations(iterations: usize) -> Result<()> {
    if iterations == 0 {
        return Err(CoregError::invalid_configuration("Iterations must be positive"));
    }
    if iterations > 1_000_000 {
        return Err(CoregError::invalid_configuration(format!(
            "Iterations too large: {}",
            iterations
        )));
    }
    Ok(())
}

/// Largest number of squaring steps used to exponentiate a velocity field.
pub const MAX_INTEGRATION_STEPS: usize = 16;

pub fn validate_integration_steps(steps: usize) -> Result<()> {
    if steps == 0 || steps > MAX_INTEGRATION_STEPS {
        return Err(CoregError::invalid_configuration(format!(
            "integration_steps must be in 1..={}, got {}",
            MAX_INTEGRATION_STEPS, steps
        )));
    }
    Ok(())
}

/// Strictly positive, finite option value.
pub fn validate_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CoregError::invalid_configuration(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Non-negative, finite option value.
pub fn validate_non_negative(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CoregError::invalid_configuration(format!(
            "{} must be non-negative, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Stops the optimisation once the loss has plateaued.
#[derive(Debug, Clone)]
pub struct ConvergenceChecker {
    /// Minimum relative improvement over the window.
    pub min_improvement: f64,
    /// Number of iterations in the window.
    pub patience: usize,
}

impl Default for ConvergenceChecker {
    fn default() -> Self {
        Self {
            min_improvement: 1e-6,
            patience: 50,
        }
    }
}

impl ConvergenceChecker {
    pub fn new(min_improvement: f64, patience: usize) -> Self {
        Self {
            min_improvement,
            patience,
        }
    }

    /// True when the last `patience` iterations improved the loss by less
    /// than `min_improvement` relative to the start of the window.
    pub fn check_convergence(&self, loss_history: &[f64]) -> bool {
        if self.patience == 0 || loss_history.len() < self.patience + 1 {
            return false;
        }
        let window = &loss_history[loss_history.len() - self.patience - 1..];
        let reference = window[0];
        let best = window[1..].iter().copied().fold(f64::INFINITY, f64::min);
        let relative_improvement = (reference - best) / (reference.abs() + 1e-10);
        relative_improvement < self.min_improvement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_learning_rate() {
        assert!(validate_learning_rate(0.01).is_ok());
        assert!(validate_learning_rate(1.0).is_ok());
        assert!(validate_learning_rate(0.0).is_err());
        assert!(validate_learning_rate(-0.01).is_err());
        assert!(validate_learning_rate(100.0).is_err());
        assert!(validate_learning_rate(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_iterations() {
        assert!(validate_iterations(100).is_ok());
        assert!(validate_iterations(0).is_err());
        assert!(validate_iterations(2_000_000).is_err());
    }

    #[test]
    fn test_validate_integration_steps() {
        assert!(validate_integration_steps(1).is_ok());
        assert!(validate_integration_steps(MAX_INTEGRATION_STEPS).is_ok());
        assert!(validate_integration_steps(0).is_err());
        assert!(validate_integration_steps(160).is_err());
    }

    #[test]
    fn test_validate_option_values() {
        assert!(validate_positive("grid_spacing", 4.0).is_ok());
        assert!(validate_positive("grid_spacing", 0.0).is_err());
        assert!(validate_non_negative("smoothness", 0.0).is_ok());
        assert!(validate_non_negative("smoothness", -1.0).is_err());
    }

    #[test]
    fn test_convergence_checker() {
        let checker = ConvergenceChecker::new(1e-3, 3);
        assert!(!checker.check_convergence(&[1.0, 0.5]));
        assert!(!checker.check_convergence(&[1.0, 0.9, 0.8, 0.7]));
        assert!(checker.check_convergence(&[1.0, 0.5, 0.5, 0.5, 0.5]));
    }
}
