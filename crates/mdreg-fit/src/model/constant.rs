//! Time-independent signal.

use super::{mean, SignalModel};

/// `S(x) = S`, solved by the per-pixel mean.
///
/// The fitted series of a constant model is the temporal mean of every
/// pixel, which makes it a useful reference for group-wise alignment.
#[derive(Debug, Clone, Copy, Default)]
pub struct Constant;

impl Constant {
    pub fn new() -> Self {
        Self
    }
}

impl SignalModel for Constant {
    fn name(&self) -> &str {
        "constant"
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["S".to_string()]
    }

    fn xdata(&self) -> &[f64] {
        &[]
    }

    fn predict(&self, _x: f64, params: &[f64]) -> f64 {
        params[0]
    }

    fn initial_guess(&self, signal: &[f64]) -> Vec<f64> {
        vec![mean(signal)]
    }

    fn is_closed_form(&self) -> bool {
        true
    }

    fn solve(&self, _x: &[f64], signal: &[f64]) -> Option<Vec<f64>> {
        Some(vec![mean(signal)])
    }
}
