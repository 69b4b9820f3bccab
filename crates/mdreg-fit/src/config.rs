//! Serializable selection of a built-in signal model.

use serde::{Deserialize, Serialize};
use crate::error::{FitError, Result};
use crate::model::{
    AbsExpRecovery2p, Constant, ExpDecay, ExpRecovery2p, SignalModel, SpgrVfaLin, SpgrVfaNonlin,
};

/// Built-in model and its acquisition constants.
///
/// Deserialized from tables such as
///
/// ```toml
/// func = "spgr_vfa_nonlin"
/// fa = [2.0, 5.0, 10.0, 15.0]
/// tr = 0.005
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "func", rename_all = "snake_case")]
pub enum ModelConfig {
    Constant,
    ExpDecay { te: Vec<f64> },
    #[serde(rename = "exp_recovery_2p")]
    ExpRecovery2p { ti: Vec<f64> },
    #[serde(rename = "abs_exp_recovery_2p")]
    AbsExpRecovery2p { ti: Vec<f64> },
    SpgrVfaLin { fa: Vec<f64>, tr: f64 },
    SpgrVfaNonlin { fa: Vec<f64>, tr: f64 },
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::Constant
    }
}

impl ModelConfig {
    /// Names accepted in the `func` field.
    pub const NAMES: [&'static str; 6] = [
        "constant",
        "exp_decay",
        "exp_recovery_2p",
        "abs_exp_recovery_2p",
        "spgr_vfa_lin",
        "spgr_vfa_nonlin",
    ];

    /// Instantiate the model, checking its constants.
    pub fn build(&self) -> Result<Box<dyn SignalModel>> {
        let model: Box<dyn SignalModel> = match self {
            Self::Constant => Box::new(Constant::new()),
            Self::ExpDecay { te } => Box::new(ExpDecay::new(non_empty("te", te)?)),
            Self::ExpRecovery2p { ti } => Box::new(ExpRecovery2p::new(non_empty("ti", ti)?)),
            Self::AbsExpRecovery2p { ti } => Box::new(AbsExpRecovery2p::new(non_empty("ti", ti)?)),
            Self::SpgrVfaLin { fa, tr } => Box::new(SpgrVfaLin::new(non_empty("fa", fa)?, positive("tr", *tr)?)),
            Self::SpgrVfaNonlin { fa, tr } => {
                Box::new(SpgrVfaNonlin::new(non_empty("fa", fa)?, positive("tr", *tr)?))
            }
        };
        Ok(model)
    }
}

fn non_empty(field: &str, values: &[f64]) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(FitError::invalid_configuration(format!("'{}' must not be empty", field)));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(FitError::invalid_configuration(format!("'{}' contains non-finite values", field)));
    }
    Ok(values.to_vec())
}

fn positive(field: &str, value: f64) -> Result<f64> {
    if value > 0.0 && value.is_finite() {
        Ok(value)
    } else {
        Err(FitError::invalid_configuration(format!("'{}' must be positive, got {}", field, value)))
    }
}
