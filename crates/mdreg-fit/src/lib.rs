//! Pixel-wise signal model fitting.
//!
//! A [`SignalModel`] maps the independent acquisition variable (echo time,
//! inversion time, flip angle, ...) and a parameter vector to a signal
//! value. [`ModelFitter`] fits the model to every pixel of an
//! [`ImageSeries`](mdreg_core::ImageSeries) and returns the fitted series
//! together with one image per model parameter.

pub mod error;
pub mod lm;
pub mod model;
pub mod fitter;
pub mod parameters;
pub mod config;

pub use error::{FitError, Result};
pub use lm::{LmConfig, LmResult};
pub use model::{
    AbsExpRecovery2p, Bounds, Constant, ExpDecay, ExpRecovery2p, PixelModel, SignalModel, SpgrVfaLin,
    SpgrVfaNonlin,
};
pub use fitter::{FitOptions, ModelFit, ModelFitter};
pub use parameters::ParameterMap;
pub use config::ModelConfig;
