//! Fitting a signal model to every pixel of a series.

use std::time::Instant;
use burn::tensor::backend::Backend;
use mdreg_core::{Image, ImageSeries};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use crate::error::{FitError, Result};
use crate::lm::LmConfig;
use crate::model::SignalModel;
use crate::parameters::ParameterMap;

/// Fitter options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    /// Fit pixels on the rayon thread pool.
    pub parallel: bool,
    /// Levenberg-Marquardt iteration cap per pixel.
    pub max_iterations: usize,
    /// Relative parameter step at which a pixel fit stops.
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_iterations: 100,
            tolerance: 1e-8,
        }
    }
}

impl FitOptions {
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn lm_config(&self) -> LmConfig {
        LmConfig {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
            ..LmConfig::default()
        }
    }
}

/// Fitted series and parameter maps from one fitting pass.
#[derive(Debug, Clone)]
pub struct ModelFit<B: Backend, const D: usize> {
    pub fitted: ImageSeries<B, D>,
    pub parameters: ParameterMap<B, D>,
}

/// Pixel-wise model fitter.
#[derive(Debug, Clone, Default)]
pub struct ModelFitter {
    options: FitOptions,
}

impl ModelFitter {
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// Fit `model` to every pixel of `series`.
    ///
    /// The fitted series has the shape and metadata of `series`. Closed-form
    /// models are solved in a single sequential pass; iterative models run
    /// per pixel, in parallel when enabled.
    ///
    /// A model with enough freedom to reproduce arbitrary signal changes
    /// will also reproduce motion, leaving nothing for coregistration to
    /// correct.
    pub fn fit<B: Backend, const D: usize>(
        &self,
        series: &ImageSeries<B, D>,
        model: &dyn SignalModel,
    ) -> Result<ModelFit<B, D>> {
        model.validate()?;
        let frames = series.len();
        let xdata: Vec<f64> = if model.xdata().is_empty() {
            (0..frames).map(|t| t as f64).collect()
        } else {
            model.xdata().to_vec()
        };
        if xdata.len() != frames {
            return Err(FitError::FrameCountMismatch {
                model: model.name().to_string(),
                expected: xdata.len(),
                actual: frames,
            });
        }
        let names = model.parameter_names();
        if names.is_empty() {
            return Err(FitError::invalid_model(format!("'{}' has no parameters", model.name())));
        }

        let start = Instant::now();
        let signals: Vec<f64> = series.to_signals()?.into_iter().map(f64::from).collect();
        let config = self.options.lm_config();
        let fit_pixel = |signal: &[f64]| model.fit_signal(&xdata, signal, &config);

        let params: Vec<Vec<f64>> = if self.options.parallel && !model.is_closed_form() {
            signals.par_chunks(frames).map(fit_pixel).collect()
        } else {
            signals.chunks(frames).map(fit_pixel).collect()
        };

        let n_params = names.len();
        let mut fitted = Vec::with_capacity(signals.len());
        let mut maps = vec![Vec::with_capacity(params.len()); n_params];
        for p in &params {
            fitted.extend(xdata.iter().map(|&x| model.predict(x, p) as f32));
            for (k, map) in maps.iter_mut().enumerate() {
                map.push(p.get(k).copied().unwrap_or(0.0) as f32);
            }
        }

        let fitted = ImageSeries::from_signals(&fitted, series)?;
        let template = &series.frames()[0];
        let maps = maps
            .into_iter()
            .map(|values| Image::from_values(values, template))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        tracing::debug!(
            model = model.name(),
            pixels = params.len(),
            frames,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model fit complete"
        );

        Ok(ModelFit {
            fitted,
            parameters: ParameterMap::new(names, maps),
        })
    }
}
