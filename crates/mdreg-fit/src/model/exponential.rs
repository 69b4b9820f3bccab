//! Mono-exponential decay and recovery models.

use super::{max_abs, mean, Bounds, SignalModel};

/// Smallest time constant the fits may reach.
const MIN_TIME_CONSTANT: f64 = 1e-6;

fn relaxation_bounds() -> Bounds {
    Bounds::new(vec![0.0, MIN_TIME_CONSTANT], vec![f64::INFINITY, f64::INFINITY])
}

/// `S(TE) = S0 * exp(-TE / T)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpDecay {
    te: Vec<f64>,
}

impl ExpDecay {
    pub fn new(te: Vec<f64>) -> Self {
        Self { te }
    }
}

impl SignalModel for ExpDecay {
    fn name(&self) -> &str {
        "exp_decay"
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["S0".to_string(), "T".to_string()]
    }

    fn xdata(&self) -> &[f64] {
        &self.te
    }

    fn predict(&self, x: f64, params: &[f64]) -> f64 {
        params[0] * (-x / params[1]).exp()
    }

    /// Two-point log-linear estimate from the shortest and longest echo.
    fn initial_guess(&self, signal: &[f64]) -> Vec<f64> {
        let fallback = vec![max_abs(signal), mean(&self.te).max(1.0)];
        let (Some(first), Some(last)) = (argmin(&self.te), argmax(&self.te)) else {
            return fallback;
        };
        let (s0, s1) = (signal[first], signal[last]);
        let dt = self.te[last] - self.te[first];
        if dt <= 0.0 || s1 <= 0.0 || s0 <= s1 {
            return fallback;
        }
        let t = dt / (s0 / s1).ln();
        vec![s0 * (self.te[first] / t).exp(), t]
    }

    fn bounds(&self) -> Bounds {
        relaxation_bounds()
    }
}

/// `S(TI) = S0 * (1 - exp(-TI / T1))`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpRecovery2p {
    ti: Vec<f64>,
}

impl ExpRecovery2p {
    pub fn new(ti: Vec<f64>) -> Self {
        Self { ti }
    }
}

impl SignalModel for ExpRecovery2p {
    fn name(&self) -> &str {
        "exp_recovery_2p"
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["S0".to_string(), "T1".to_string()]
    }

    fn xdata(&self) -> &[f64] {
        &self.ti
    }

    fn predict(&self, x: f64, params: &[f64]) -> f64 {
        params[0] * (1.0 - (-x / params[1]).exp())
    }

    fn initial_guess(&self, signal: &[f64]) -> Vec<f64> {
        vec![max_abs(signal), mean(&self.ti).max(MIN_TIME_CONSTANT)]
    }

    fn bounds(&self) -> Bounds {
        relaxation_bounds()
    }
}

/// Magnitude inversion recovery, `S(TI) = |S0 * (1 - 2 exp(-TI / T1))|`.
#[derive(Debug, Clone, PartialEq)]
pub struct AbsExpRecovery2p {
    ti: Vec<f64>,
}

impl AbsExpRecovery2p {
    pub fn new(ti: Vec<f64>) -> Self {
        Self { ti }
    }
}

impl SignalModel for AbsExpRecovery2p {
    fn name(&self) -> &str {
        "abs_exp_recovery_2p"
    }

    fn parameter_names(&self) -> Vec<String> {
        vec!["S0".to_string(), "T1".to_string()]
    }

    fn xdata(&self) -> &[f64] {
        &self.ti
    }

    fn predict(&self, x: f64, params: &[f64]) -> f64 {
        (params[0] * (1.0 - 2.0 * (-x / params[1]).exp())).abs()
    }

    /// The signal null sits at `TI = T1 ln 2`.
    fn initial_guess(&self, signal: &[f64]) -> Vec<f64> {
        let t1 = match argmin(signal) {
            Some(i) if self.ti[i] > 0.0 => self.ti[i] / std::f64::consts::LN_2,
            _ => mean(&self.ti).max(MIN_TIME_CONSTANT),
        };
        vec![max_abs(signal), t1]
    }

    fn bounds(&self) -> Bounds {
        relaxation_bounds()
    }
}

fn argmin(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lm::LmConfig;

    fn synth(model: &dyn SignalModel, params: &[f64]) -> Vec<f64> {
        model.xdata().iter().map(|&x| model.predict(x, params)).collect()
    }

    #[test]
    fn test_exp_decay_recovers_parameters() {
        let model = ExpDecay::new(vec![10.0, 20.0, 40.0, 60.0, 80.0]);
        let signal = synth(&model, &[100.0, 40.0]);
        let params = model.fit_signal(model.xdata(), &signal, &LmConfig::default());
        assert!((params[0] - 100.0).abs() < 1e-3);
        assert!((params[1] - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_exp_recovery_recovers_parameters() {
        let model = ExpRecovery2p::new(vec![100.0, 300.0, 600.0, 1000.0, 2000.0, 3000.0]);
        let signal = synth(&model, &[200.0, 800.0]);
        let params = model.fit_signal(model.xdata(), &signal, &LmConfig::default());
        assert!((params[0] - 200.0).abs() < 0.5);
        assert!((params[1] - 800.0).abs() < 1.0);
    }

    #[test]
    fn test_abs_exp_recovery_recovers_parameters() {
        let model = AbsExpRecovery2p::new(vec![50.0, 200.0, 350.0, 500.0, 1000.0, 2000.0, 3000.0]);
        let signal = synth(&model, &[100.0, 500.0]);
        let guess = model.initial_guess(&signal);
        assert!((guess[1] - 505.0).abs() < 1.0);
        let params = model.fit_signal(model.xdata(), &signal, &LmConfig::default());
        assert!((params[0] - 100.0).abs() < 0.5);
        assert!((params[1] - 500.0).abs() < 1.0);
    }

    #[test]
    fn test_flat_signal_falls_back() {
        let model = ExpDecay::new(vec![1.0, 2.0, 3.0]);
        let guess = model.initial_guess(&[5.0, 5.0, 5.0]);
        assert_eq!(guess, vec![5.0, 2.0]);
    }
}
