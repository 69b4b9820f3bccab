//! Coregistration engines and the common interface they implement.

pub mod bspline;
pub mod optical_flow;
pub mod diffeomorphic;

pub use bspline::{BSplineEngine, BSplineOptions};
pub use optical_flow::{OpticalFlowEngine, OpticalFlowOptions};
pub use diffeomorphic::{DiffeomorphicEngine, DiffeomorphicOptions, SimilarityMetric};

use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use mdreg_core::image::generate_grid;
use mdreg_core::interpolation::{Interpolator, LinearInterpolator};
use mdreg_core::transform::BSplineParameters;
use mdreg_core::{DeformationField, Image};
use crate::artifacts::TransformArtifact;
use crate::error::{CoregError, Result};
use crate::progress::ProgressTracker;

/// Engine-specific description of a computed alignment.
#[derive(Debug, Clone)]
pub enum EngineTransform<B: Backend, const D: usize> {
    /// B-spline control grid, plus the parameter file it was written to.
    BSpline {
        parameters: BSplineParameters,
        artifact: Option<TransformArtifact>,
    },
    /// Dense displacement in pixel units.
    Displacement(DeformationField<B, D>),
    /// Integrated stationary velocity field.
    Diffeomorphic {
        forward: DeformationField<B, D>,
        inverse: DeformationField<B, D>,
    },
}

impl<B: Backend, const D: usize> EngineTransform<B, D> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BSpline { .. } => "bspline",
            Self::Displacement(_) => "displacement",
            Self::Diffeomorphic { .. } => "diffeomorphic",
        }
    }

    pub fn artifact(&self) -> Option<&TransformArtifact> {
        match self {
            Self::BSpline { artifact, .. } => artifact.as_ref(),
            _ => None,
        }
    }

    /// Remove any file this transform left on disk.
    pub fn cleanup(&self) -> Result<()> {
        match self.artifact() {
            Some(artifact) => artifact.cleanup(),
            None => Ok(()),
        }
    }
}

/// Output of one pairwise coregistration.
#[derive(Debug, Clone)]
pub struct Coregistered<B: Backend, const D: usize> {
    /// Moving image resampled onto the fixed image.
    pub image: Image<B, D>,
    /// Displacement from fixed to moving coordinates, pixel units.
    pub deformation: DeformationField<B, D>,
    pub transform: EngineTransform<B, D>,
}

/// Aligns a moving image to a fixed image on the same grid.
pub trait Coregistration<B: AutodiffBackend, const D: usize> {
    fn name(&self) -> &'static str;

    /// Align `moving` to `fixed`.
    fn coregister(&self, moving: &Image<B, D>, fixed: &Image<B, D>) -> Result<Coregistered<B, D>>;

    /// Warp `moving` with a transform computed earlier by this engine.
    ///
    /// `apply(moving, &c.transform)` reproduces `c.image` for
    /// `c = coregister(moving, fixed)`.
    fn apply(&self, moving: &Image<B, D>, transform: &EngineTransform<B, D>) -> Result<Image<B, D>>;
}

/// One of the three engines, selected at run time.
#[derive(Debug)]
pub enum Engine {
    BSpline(BSplineEngine),
    OpticalFlow(OpticalFlowEngine),
    Diffeomorphic(DiffeomorphicEngine),
}

impl Engine {
    /// Report optimiser progress to `tracker`.
    pub fn with_tracker(self, tracker: ProgressTracker) -> Self {
        match self {
            Self::BSpline(e) => Self::BSpline(e.with_tracker(tracker)),
            Self::OpticalFlow(e) => Self::OpticalFlow(e.with_tracker(tracker)),
            Self::Diffeomorphic(e) => Self::Diffeomorphic(e.with_tracker(tracker)),
        }
    }
}

impl From<BSplineEngine> for Engine {
    fn from(engine: BSplineEngine) -> Self {
        Self::BSpline(engine)
    }
}

impl From<OpticalFlowEngine> for Engine {
    fn from(engine: OpticalFlowEngine) -> Self {
        Self::OpticalFlow(engine)
    }
}

impl From<DiffeomorphicEngine> for Engine {
    fn from(engine: DiffeomorphicEngine) -> Self {
        Self::Diffeomorphic(engine)
    }
}

impl<B: AutodiffBackend, const D: usize> Coregistration<B, D> for Engine {
    fn name(&self) -> &'static str {
        match self {
            Self::BSpline(e) => Coregistration::<B, D>::name(e),
            Self::OpticalFlow(e) => Coregistration::<B, D>::name(e),
            Self::Diffeomorphic(e) => Coregistration::<B, D>::name(e),
        }
    }

    fn coregister(&self, moving: &Image<B, D>, fixed: &Image<B, D>) -> Result<Coregistered<B, D>> {
        match self {
            Self::BSpline(e) => e.coregister(moving, fixed),
            Self::OpticalFlow(e) => e.coregister(moving, fixed),
            Self::Diffeomorphic(e) => e.coregister(moving, fixed),
        }
    }

    fn apply(&self, moving: &Image<B, D>, transform: &EngineTransform<B, D>) -> Result<Image<B, D>> {
        match self {
            Self::BSpline(e) => e.apply(moving, transform),
            Self::OpticalFlow(e) => e.apply(moving, transform),
            Self::Diffeomorphic(e) => e.apply(moving, transform),
        }
    }
}

/// Pixel spacing of `image`, x first.
pub(crate) fn spacing_of<B: Backend, const D: usize>(image: &Image<B, D>) -> [f64; D] {
    std::array::from_fn(|i| image.spacing()[i])
}

/// `[1, D]` row for broadcasting against `[N, D]` point sets.
pub(crate) fn row_tensor<B: Backend, const D: usize>(values: [f64; D], device: &B::Device) -> Tensor<B, 2> {
    let values: Vec<f32> = values.iter().map(|&v| v as f32).collect();
    Tensor::<B, 1>::from_floats(values.as_slice(), device).reshape([1, D])
}

/// A displacement field applied with one engine must match the image grid.
pub(crate) fn check_field_shape<B: Backend, const D: usize>(
    field: &DeformationField<B, D>,
    image: &Image<B, D>,
) -> Result<()> {
    if field.shape() != image.shape() || field.components() != D {
        return Err(CoregError::ShapeMismatch {
            expected: image.shape().to_vec(),
            actual: field.shape().to_vec(),
        });
    }
    Ok(())
}

/// Intensities and sampling grid shared by every loss evaluation of one call.
///
/// Both images are divided by the largest absolute fixed intensity so that
/// default learning rates and weights do not depend on the image scale.
pub(crate) struct Problem<B: Backend, const D: usize> {
    pub grid: Tensor<B, 2>,
    pub fixed: Tensor<B, 1>,
    moving: Tensor<B, D>,
    interpolator: LinearInterpolator,
}

impl<B: Backend, const D: usize> Problem<B, D> {
    pub fn new(moving: &Image<B, D>, fixed: &Image<B, D>) -> Self {
        let shape = fixed.shape();
        let device = fixed.data().device();
        let n: usize = shape.iter().product();
        let max = fixed.data().clone().abs().max().into_scalar().elem::<f64>();
        let scale = if max.is_finite() && max > 0.0 { max } else { 1.0 };
        Self {
            grid: generate_grid::<B, D>(shape, &device),
            fixed: fixed.data().clone().reshape([n]).div_scalar(scale),
            moving: moving.data().clone().div_scalar(scale),
            interpolator: LinearInterpolator::new(),
        }
    }

    /// Normalised moving intensities at `x + displacement(x)`.
    pub fn sample(&self, displacement: Tensor<B, 2>) -> Tensor<B, 1> {
        self.interpolator.interpolate(&self.moving, self.grid.clone() + displacement)
    }
}
