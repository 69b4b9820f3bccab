//! Bounded Levenberg-Marquardt least squares.
//!
//! Generic over any scalar model `f(x, params)`. The Jacobian is estimated
//! by finite differences and every trial step is clamped into the
//! parameter bounds before it is evaluated.

use nalgebra::{DMatrix, DVector};
use crate::model::Bounds;

/// Configuration for Levenberg-Marquardt optimization.
#[derive(Debug, Clone)]
pub struct LmConfig {
    /// Maximum iterations.
    pub max_iterations: usize,
    /// Stop when the largest relative parameter step falls below this.
    pub tolerance: f64,
    /// Initial damping parameter.
    pub initial_lambda: f64,
    /// Factor to increase lambda on failed step.
    pub lambda_up: f64,
    /// Factor to decrease lambda on successful step.
    pub lambda_down: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
        }
    }
}

/// Result of L-M optimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    pub params: Vec<f64>,
    pub chi2: f64,
    pub converged: bool,
    pub iterations: usize,
}

/// Fit `model` to the samples `(x, y)` starting from `initial`.
///
/// Parameters never leave `bounds`. A non-finite starting residual returns
/// the (clamped) starting point unchanged.
pub fn optimize<F>(model: F, x: &[f64], y: &[f64], initial: &[f64], bounds: &Bounds, config: &LmConfig) -> LmResult
where
    F: Fn(f64, &[f64]) -> f64,
{
    let mut params = initial.to_vec();
    bounds.clamp(&mut params);
    let mut lambda = config.initial_lambda;
    let mut prev_chi2 = chi2(&model, x, y, &params);
    let mut converged = false;
    let mut iterations = 0;

    if !prev_chi2.is_finite() {
        return LmResult {
            params,
            chi2: prev_chi2,
            converged,
            iterations,
        };
    }

    for iter in 0..config.max_iterations {
        iterations = iter + 1;

        let (jacobian, residuals) = jacobian_residuals(&model, x, y, &params, bounds);
        let hessian = jacobian.transpose() * &jacobian;
        let gradient = jacobian.transpose() * residuals;

        let mut damped = hessian.clone();
        for i in 0..params.len() {
            damped[(i, i)] += lambda * hessian[(i, i)].max(1e-12);
        }

        let Some(delta) = damped.lu().solve(&gradient) else {
            break;
        };

        let mut trial: Vec<f64> = params.iter().zip(delta.iter()).map(|(p, d)| p + d).collect();
        bounds.clamp(&mut trial);
        let trial_chi2 = chi2(&model, x, y, &trial);

        if trial_chi2.is_finite() && trial_chi2 < prev_chi2 {
            let step = trial
                .iter()
                .zip(params.iter())
                .fold(0.0f64, |acc, (t, p)| acc.max((t - p).abs() / (p.abs() + 1e-12)));
            params = trial;
            prev_chi2 = trial_chi2;
            lambda *= config.lambda_down;
            if step < config.tolerance || prev_chi2 == 0.0 {
                converged = true;
                break;
            }
        } else {
            lambda *= config.lambda_up;
            if lambda > 1e10 {
                break;
            }
        }
    }

    LmResult {
        params,
        chi2: prev_chi2,
        converged,
        iterations,
    }
}

fn chi2<F: Fn(f64, &[f64]) -> f64>(model: &F, x: &[f64], y: &[f64], params: &[f64]) -> f64 {
    x.iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| {
            let r = yi - model(xi, params);
            r * r
        })
        .sum()
}

/// Forward-difference Jacobian; steps backwards at an upper bound.
fn jacobian_residuals<F: Fn(f64, &[f64]) -> f64>(
    model: &F,
    x: &[f64],
    y: &[f64],
    params: &[f64],
    bounds: &Bounds,
) -> (DMatrix<f64>, DVector<f64>) {
    let n = x.len();
    let m = params.len();
    let base: Vec<f64> = x.iter().map(|&xi| model(xi, params)).collect();
    let residuals = DVector::from_iterator(n, y.iter().zip(base.iter()).map(|(yi, fi)| yi - fi));

    let mut jacobian = DMatrix::zeros(n, m);
    let mut shifted = params.to_vec();
    for j in 0..m {
        let mut h = 1e-6 * params[j].abs().max(1e-3);
        if params[j] + h > bounds.upper[j] {
            h = -h;
        }
        shifted[j] = params[j] + h;
        for (i, &xi) in x.iter().enumerate() {
            jacobian[(i, j)] = (model(xi, &shifted) - base[i]) / h;
        }
        shifted[j] = params[j];
    }
    (jacobian, residuals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_straight_line() {
        let x: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&xi| 2.0 * xi + 1.0).collect();
        let result = optimize(
            |xi, p: &[f64]| p[0] * xi + p[1],
            &x,
            &y,
            &[0.0, 0.0],
            &Bounds::unbounded(2),
            &LmConfig::default(),
        );
        assert!((result.params[0] - 2.0).abs() < 1e-5);
        assert!((result.params[1] - 1.0).abs() < 1e-5);
        assert!(result.chi2 < 1e-8);
    }

    #[test]
    fn test_respects_bounds() {
        let x = [0.0, 1.0, 2.0];
        let y = [5.0, 5.0, 5.0];
        let bounds = Bounds::new(vec![0.0], vec![3.0]);
        let result = optimize(|_, p: &[f64]| p[0], &x, &y, &[1.0], &bounds, &LmConfig::default());
        assert!(result.params[0] <= 3.0);
        assert!((result.params[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_stalled_fit_is_not_converged() {
        // Piecewise-constant model: zero Jacobian, so no step ever improves.
        let config = LmConfig::default();
        let result = optimize(
            |_, p: &[f64]| p[0].floor(),
            &[0.0, 1.0],
            &[2.5, 2.5],
            &[0.3],
            &Bounds::unbounded(1),
            &config,
        );
        assert!(!result.converged);
        assert!(result.iterations < config.max_iterations);
        assert_eq!(result.params, vec![0.3]);
    }

    #[test]
    fn test_non_finite_start_returns_initial() {
        let result = optimize(
            |_, p: &[f64]| p[0],
            &[0.0],
            &[f64::NAN],
            &[1.0],
            &Bounds::unbounded(1),
            &LmConfig::default(),
        );
        assert_eq!(result.params, vec![1.0]);
        assert_eq!(result.iterations, 0);
    }
}
