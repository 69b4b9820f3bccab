//! User-defined per-pixel models.

use std::fmt;
use std::sync::Arc;
use crate::error::{FitError, Result};
use super::{Bounds, SignalModel};

/// Signal function `f(x, params)`.
pub type ModelFn = dyn Fn(f64, &[f64]) -> f64 + Send + Sync;

/// Per-pixel initialisation `init(xdata, signal, p0) -> params`.
pub type InitFn = dyn Fn(&[f64], &[f64], &[f64]) -> Vec<f64> + Send + Sync;

/// Signal model built from a closure.
///
/// # Example
/// ```rust
/// use mdreg_fit::{PixelModel, SignalModel};
///
/// let model = PixelModel::new("linear", vec![0.0, 1.0, 2.0], |x, p| p[0] + p[1] * x, vec![0.0, 1.0])
///     .with_parameter_names(vec!["offset".into(), "slope".into()]);
/// assert!(model.validate().is_ok());
/// assert_eq!(model.predict(2.0, &[1.0, 3.0]), 7.0);
/// ```
#[derive(Clone)]
pub struct PixelModel {
    name: String,
    xdata: Vec<f64>,
    func: Arc<ModelFn>,
    p0: Vec<f64>,
    bounds: Bounds,
    init: Option<Arc<InitFn>>,
    names: Vec<String>,
}

impl PixelModel {
    /// Unbounded model with parameters named `p0`, `p1`, ...
    pub fn new<F>(name: impl Into<String>, xdata: Vec<f64>, func: F, p0: Vec<f64>) -> Self
    where
        F: Fn(f64, &[f64]) -> f64 + Send + Sync + 'static,
    {
        let names = (0..p0.len()).map(|i| format!("p{}", i)).collect();
        Self {
            name: name.into(),
            xdata,
            func: Arc::new(func),
            bounds: Bounds::unbounded(p0.len()),
            p0,
            init: None,
            names,
        }
    }

    pub fn with_bounds(mut self, lower: Vec<f64>, upper: Vec<f64>) -> Self {
        self.bounds = Bounds::new(lower, upper);
        self
    }

    /// Pixel-dependent starting point, replacing the fixed `p0`.
    pub fn with_init<F>(mut self, init: F) -> Self
    where
        F: Fn(&[f64], &[f64], &[f64]) -> Vec<f64> + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(init));
        self
    }

    pub fn with_parameter_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn p0(&self) -> &[f64] {
        &self.p0
    }
}

impl fmt::Debug for PixelModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelModel")
            .field("name", &self.name)
            .field("xdata", &self.xdata)
            .field("p0", &self.p0)
            .field("bounds", &self.bounds)
            .field("names", &self.names)
            .finish()
    }
}

impl SignalModel for PixelModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_names(&self) -> Vec<String> {
        self.names.clone()
    }

    fn xdata(&self) -> &[f64] {
        &self.xdata
    }

    fn predict(&self, x: f64, params: &[f64]) -> f64 {
        (self.func)(x, params)
    }

    fn initial_guess(&self, signal: &[f64]) -> Vec<f64> {
        match &self.init {
            Some(init) => {
                let guess = init(&self.xdata, signal, &self.p0);
                if guess.len() == self.p0.len() {
                    guess
                } else {
                    self.p0.clone()
                }
            }
            None => self.p0.clone(),
        }
    }

    fn bounds(&self) -> Bounds {
        self.bounds.clone()
    }

    fn validate(&self) -> Result<()> {
        let n = self.p0.len();
        if n == 0 {
            return Err(FitError::invalid_model(format!("'{}' has no parameters", self.name)));
        }
        if self.bounds.lower.len() != n || self.bounds.upper.len() != n {
            return Err(FitError::invalid_model(format!(
                "'{}' has {} parameters but bounds of length {}/{}",
                self.name,
                n,
                self.bounds.lower.len(),
                self.bounds.upper.len()
            )));
        }
        if self.names.len() != n {
            return Err(FitError::invalid_model(format!(
                "'{}' has {} parameters but {} names",
                self.name,
                n,
                self.names.len()
            )));
        }
        if let Some(i) = (0..n).find(|&i| self.bounds.lower[i] > self.bounds.upper[i]) {
            return Err(FitError::invalid_model(format!(
                "'{}' lower bound exceeds upper bound for parameter {}",
                self.name, self.names[i]
            )));
        }
        Ok(())
    }
}
