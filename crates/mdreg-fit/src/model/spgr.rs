//! Variable flip angle T1 mapping with a spoiled gradient echo.
//!
//! `S(α) = S0 sin α (1 - E) / (1 - cos α E)` with `E = exp(-TR / T1)`.
//! Flip angles are in degrees; `TR` and `T1` share time units.

use super::{max_abs, Bounds, SignalModel};

fn spgr_signal(fa_deg: f64, tr: f64, s0: f64, t1: f64) -> f64 {
    let alpha = fa_deg.to_radians();
    let e = (-tr / t1).exp();
    s0 * alpha.sin() * (1.0 - e) / (1.0 - alpha.cos() * e)
}

/// Linearised fit: regress `S / sin α` on `S / tan α`; the slope is `E`
/// and the intercept `S0 (1 - E)`.
fn linear_fit(fa: &[f64], tr: f64, signal: &[f64]) -> Option<[f64; 2]> {
    let (mut sx, mut sy, mut sxx, mut sxy) = (0.0, 0.0, 0.0, 0.0);
    let n = fa.len() as f64;
    for (&a, &s) in fa.iter().zip(signal.iter()) {
        let alpha = a.to_radians();
        let x = s / alpha.tan();
        let y = s / alpha.sin();
        sx += x;
        sy += y;
        sxx += x * x;
        sxy += x * y;
    }
    let det = n * sxx - sx * sx;
    if det.abs() <= 1e-10 * n * sxx {
        return None;
    }
    let slope = (n * sxy - sx * sy) / det;
    let intercept = (sy - slope * sx) / n;
    let e = slope.clamp(1e-12, 1.0 - 1e-12);
    let s0 = intercept / (1.0 - e);
    let t1 = -tr / e.ln();
    (s0.is_finite() && t1.is_finite()).then_some([s0, t1])
}

/// Non-linear SPGR fit, started from the linearised solution.
#[derive(Debug, Clone, PartialEq)]
pub struct SpgrVfaNonlin {
    fa: Vec<f64>,
    tr: f64,
}

impl SpgrVfaNonlin {
    /// `fa` in degrees, one per frame.
    pub fn new(fa: Vec<f64>, tr: f64) -> Self {
        Self { fa, tr }
    }

    pub fn tr(&self) -> f64 {
        self.tr
    }
}

impl SignalModel for SpgrVfaNonlin {
    fn name(&self) -> &str {
        "spgr_vfa_nonlin"
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["S0".to_string(), "T1".to_string()]
    }

    fn xdata(&self) -> &[f64] {
        &self.fa
    }

    fn predict(&self, x: f64, params: &[f64]) -> f64 {
        spgr_signal(x, self.tr, params[0], params[1])
    }

    fn initial_guess(&self, signal: &[f64]) -> Vec<f64> {
        match linear_fit(&self.fa, self.tr, signal) {
            Some([s0, t1]) if s0 > 0.0 && t1 > 0.0 => vec![s0, t1],
            _ => vec![10.0 * max_abs(signal), 100.0 * self.tr],
        }
    }

    fn bounds(&self) -> Bounds {
        Bounds::new(vec![0.0, 1e-6], vec![f64::INFINITY, f64::INFINITY])
    }
}

/// Linearised SPGR fit, solved in closed form.
#[derive(Debug, Clone, PartialEq)]
pub struct SpgrVfaLin {
    fa: Vec<f64>,
    tr: f64,
}

impl SpgrVfaLin {
    pub fn new(fa: Vec<f64>, tr: f64) -> Self {
        Self { fa, tr }
    }
}

impl SignalModel for SpgrVfaLin {
    fn name(&self) -> &str {
        "spgr_vfa_lin"
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["S0".to_string(), "T1".to_string()]
    }

    fn xdata(&self) -> &[f64] {
        &self.fa
    }

    fn predict(&self, x: f64, params: &[f64]) -> f64 {
        spgr_signal(x, self.tr, params[0], params[1])
    }

    fn initial_guess(&self, signal: &[f64]) -> Vec<f64> {
        self.solve(&self.fa, signal).unwrap_or_else(|| vec![0.0, 0.0])
    }

    fn is_closed_form(&self) -> bool {
        true
    }

    /// Degenerate pixels (constant signal, single flip angle) map to zero.
    fn solve(&self, x: &[f64], signal: &[f64]) -> Option<Vec<f64>> {
        Some(
            linear_fit(x, self.tr, signal)
                .map(|p| p.to_vec())
                .unwrap_or_else(|| vec![0.0, 0.0]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::LmConfig;

    const FA: [f64; 5] = [2.0, 5.0, 10.0, 15.0, 20.0];

    fn synth(s0: f64, t1: f64, tr: f64) -> Vec<f64> {
        FA.iter().map(|&a| spgr_signal(a, tr, s0, t1)).collect()
    }

    #[test]
    fn test_linear_fit_is_exact_on_noiseless_data() {
        let model = SpgrVfaLin::new(FA.to_vec(), 0.005);
        let signal = synth(1000.0, 1.2, 0.005);
        let params = model.fit_signal(&FA, &signal, &LmConfig::default());
        assert!((params[0] - 1000.0).abs() / 1000.0 < 1e-6);
        assert!((params[1] - 1.2).abs() / 1.2 < 1e-6);
    }

    #[test]
    fn test_nonlinear_fit_recovers_parameters() {
        let model = SpgrVfaNonlin::new(FA.to_vec(), 0.005);
        let signal = synth(500.0, 0.8, 0.005);
        let params = model.fit_signal(&FA, &signal, &LmConfig::default());
        assert!((params[0] - 500.0).abs() < 0.5);
        assert!((params[1] - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_pixel_maps_to_zero() {
        let model = SpgrVfaLin::new(vec![10.0, 10.0, 10.0], 0.005);
        let params = model.fit_signal(&[10.0, 10.0, 10.0], &[3.0, 3.0, 3.0], &LmConfig::default());
        assert_eq!(params, vec![0.0, 0.0]);
    }
}
