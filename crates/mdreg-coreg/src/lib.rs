//! Pairwise coregistration engines.
//!
//! Three interchangeable engines align a moving image to a fixed one:
//!
//! * **B-spline** free-form deformation with bending-energy smoothing,
//! * **optical flow**, a dense displacement with a robust data term and
//!   total-variation smoothing,
//! * **diffeomorphic**, a stationary velocity field integrated by scaling
//!   and squaring.
//!
//! All of them optimise a burn module with Adam through the same
//! [`Registration`] loop and report a dense [`DeformationField`](mdreg_core::DeformationField)
//! in pixel units.

pub mod error;
pub mod metric;
pub mod optimizer;
pub mod regularization;
pub mod registration;
pub mod progress;
pub mod validation;
pub mod artifacts;
pub mod engine;
pub mod config;

pub use error::{CoregError, Result};
pub use registration::{Registration, RegistrationConfig, RegistrationResult};
pub use progress::{ConsoleProgressCallback, HistoryCallback, ProgressCallback, ProgressInfo, ProgressTracker};
pub use validation::ConvergenceChecker;
pub use artifacts::TransformArtifact;
pub use engine::{
    BSplineEngine, BSplineOptions, Coregistered, Coregistration, DiffeomorphicEngine, DiffeomorphicOptions,
    Engine, EngineTransform, OpticalFlowEngine, OpticalFlowOptions, SimilarityMetric,
};
pub use config::{CoregConfig, Package};
