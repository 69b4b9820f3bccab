//! Signal models.
//!
//! Built-in models cover the common relaxometry signals; [`PixelModel`]
//! wraps a user-supplied function for anything else.

pub mod constant;
pub mod exponential;
pub mod spgr;
pub mod pixel;

pub use constant::Constant;
pub use exponential::{AbsExpRecovery2p, ExpDecay, ExpRecovery2p};
pub use spgr::{SpgrVfaLin, SpgrVfaNonlin};
pub use pixel::PixelModel;

use crate::error::Result;
use crate::lm::{self, LmConfig};

/// Box constraints on a parameter vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self { lower, upper }
    }

    /// `(-inf, inf)` for each of `n` parameters.
    pub fn unbounded(n: usize) -> Self {
        Self::new(vec![f64::NEG_INFINITY; n], vec![f64::INFINITY; n])
    }

    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Clamp `params` into the box in place.
    pub fn clamp(&self, params: &mut [f64]) {
        for ((p, lo), hi) in params.iter_mut().zip(self.lower.iter()).zip(self.upper.iter()) {
            *p = p.max(*lo).min(*hi);
        }
    }
}

/// A pixel-wise signal model.
///
/// Implementations are stateless apart from their acquisition constants
/// and must be shareable across the fitting threads.
pub trait SignalModel: Send + Sync {
    /// Short identifier used in logs and configuration.
    fn name(&self) -> &str;

    /// One name per fitted parameter, in parameter-vector order.
    fn parameter_names(&self) -> Vec<String>;

    /// Independent variable per frame. Empty for models that do not depend
    /// on one, in which case any series length is accepted.
    fn xdata(&self) -> &[f64];

    /// Model signal at `x` for `params`.
    fn predict(&self, x: f64, params: &[f64]) -> f64;

    /// Starting point for the iterative fit of one pixel's `signal`.
    fn initial_guess(&self, signal: &[f64]) -> Vec<f64>;

    fn bounds(&self) -> Bounds {
        Bounds::unbounded(self.parameter_names().len())
    }

    /// Models with an exact solution return true and implement [`solve`](Self::solve).
    fn is_closed_form(&self) -> bool {
        false
    }

    /// Exact per-pixel solution for closed-form models.
    fn solve(&self, _x: &[f64], _signal: &[f64]) -> Option<Vec<f64>> {
        None
    }

    /// Check internal consistency before fitting.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Fit one pixel. `x` holds one value per sample of `signal`.
    fn fit_signal(&self, x: &[f64], signal: &[f64], config: &LmConfig) -> Vec<f64> {
        if let Some(params) = self.solve(x, signal) {
            return params;
        }
        let initial = self.initial_guess(signal);
        let bounds = self.bounds();
        let result = lm::optimize(|xi, p| self.predict(xi, p), x, signal, &initial, &bounds, config);
        if result.params.iter().all(|p| p.is_finite()) {
            result.params
        } else {
            initial
        }
    }
}

/// Largest absolute value of a signal, 0 for an empty one.
pub(crate) fn max_abs(signal: &[f64]) -> f64 {
    signal.iter().fold(0.0f64, |acc, v| acc.max(v.abs()))
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
