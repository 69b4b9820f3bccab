//! Cubic B-spline free-form deformation engine.
//!
//! Control-point displacements are optimised with Adam against the mean
//! squared intensity difference plus a bending-energy penalty on the
//! coefficient grid. Every call writes its final parameters to
//! `TransformParameters.<k>.json` in the engine's output directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use burn::tensor::backend::AutodiffBackend;
use mdreg_core::interpolation::warp_image;
use mdreg_core::transform::{BSplineParameters, BSplineTransform};
use mdreg_core::{DeformationField, Image};
use serde::{Deserialize, Serialize};
use crate::artifacts::TransformArtifact;
use crate::error::{CoregError, Result};
use crate::metric::{MeanSquaredError, Metric};
use crate::progress::ProgressTracker;
use crate::registration::{Registration, RegistrationConfig};
use crate::regularization::{BendingEnergyRegularizer, Regularizer};
use crate::validation::{validate_image_shapes, validate_iterations, validate_learning_rate, validate_non_negative, validate_positive};
use super::{check_field_shape, row_tensor, spacing_of, Coregistered, Coregistration, EngineTransform, Problem};

/// B-spline engine options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BSplineOptions {
    /// Control point spacing in physical units.
    pub grid_spacing: f64,
    pub iterations: usize,
    pub learning_rate: f64,
    /// Weight of the bending energy of the coefficient grid.
    pub bending_weight: f64,
    /// Directory for parameter files. A fresh directory under the system
    /// temporary directory is used when unset.
    pub output_dir: Option<PathBuf>,
}

impl Default for BSplineOptions {
    fn default() -> Self {
        Self {
            grid_spacing: 16.0,
            iterations: 200,
            learning_rate: 0.2,
            bending_weight: 0.01,
            output_dir: None,
        }
    }
}

impl BSplineOptions {
    pub fn with_grid_spacing(mut self, grid_spacing: f64) -> Self {
        self.grid_spacing = grid_spacing;
        self
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_bending_weight(mut self, bending_weight: f64) -> Self {
        self.bending_weight = bending_weight;
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_positive("grid_spacing", self.grid_spacing)?;
        validate_iterations(self.iterations)?;
        validate_learning_rate(self.learning_rate)?;
        validate_non_negative("bending_weight", self.bending_weight)
    }
}

/// Free-form deformation engine.
#[derive(Debug)]
pub struct BSplineEngine {
    options: BSplineOptions,
    output_dir: PathBuf,
    owns_output_dir: bool,
    counter: AtomicUsize,
    tracker: ProgressTracker,
}

impl BSplineEngine {
    pub fn new(options: BSplineOptions) -> Result<Self> {
        options.validate()?;
        let output_dir = match &options.output_dir {
            Some(dir) => dir.clone(),
            None => std::env::temp_dir().join(format!("mdreg-{}", uuid::Uuid::new_v4())),
        };
        Ok(Self {
            owns_output_dir: options.output_dir.is_none(),
            options,
            output_dir,
            counter: AtomicUsize::new(0),
            tracker: ProgressTracker::new("bspline"),
        })
    }

    pub fn with_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker.with_stage("bspline");
        self
    }

    pub fn options(&self) -> &BSplineOptions {
        &self.options
    }

    /// Directory receiving the parameter files.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Number of parameter file indices handed out so far.
    pub fn calls(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    /// Dense pixel-unit displacement described by `parameters` on `image`'s grid.
    fn dense<B: AutodiffBackend, const D: usize>(
        parameters: &BSplineParameters,
        image: &Image<B, D>,
    ) -> Result<DeformationField<B, D>> {
        let device = image.data().device();
        let transform = BSplineTransform::<B, D>::from_parameters(parameters, &device)?;
        let displacement = transform.dense_displacement(image.shape(), spacing_of(image)).detach();
        Ok(DeformationField::new(displacement, image.shape())?)
    }
}

impl<B: AutodiffBackend, const D: usize> Coregistration<B, D> for BSplineEngine {
    fn name(&self) -> &'static str {
        "bspline"
    }

    fn coregister(&self, moving: &Image<B, D>, fixed: &Image<B, D>) -> Result<Coregistered<B, D>> {
        validate_image_shapes(moving, fixed)?;
        let shape = fixed.shape();
        let spacing = spacing_of(fixed);
        let device = fixed.data().device();

        let problem = Problem::new(moving, fixed);
        let transform = BSplineTransform::<B, D>::identity(shape, spacing, [self.options.grid_spacing; D], &device);
        // Coefficient rows are ordered x fastest, so the grid layout is the
        // control grid size reversed.
        let grid_size = transform.grid_size();
        let grid_shape: [usize; D] = std::array::from_fn(|i| grid_size[D - 1 - i]);
        let spacing_row = row_tensor::<B, D>(spacing, &device);
        let physical = problem.grid.clone() * spacing_row.clone();

        let metric = MeanSquaredError::new();
        let bending = BendingEnergyRegularizer::new(self.options.bending_weight);
        let config = RegistrationConfig::new(self.options.iterations, self.options.learning_rate);
        let mut registration =
            Registration::<B, BSplineTransform<B, D>>::adam(config)?.with_tracker(self.tracker.clone());
        let result = registration.execute(transform, |t| {
            let displacement = t.displacement(physical.clone()) / spacing_row.clone();
            let warped = problem.sample(displacement);
            metric.forward(problem.fixed.clone(), warped) + bending.compute_loss(t.coefficients(), grid_shape)
        })?;

        let parameters = result.module.to_parameters()?;
        let index = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut artifact = TransformArtifact::write(&self.output_dir, index, &parameters)?;
        if self.owns_output_dir {
            artifact = artifact.owning_directory();
        }
        let deformation = Self::dense(&parameters, fixed)?;
        let image = warp_image(moving, deformation.displacement().clone());

        tracing::debug!(
            engine = "bspline",
            index,
            final_loss = result.final_loss().unwrap_or(f64::NAN),
            max_displacement = deformation.max_norm(),
            "coregistration complete"
        );

        Ok(Coregistered {
            image,
            deformation,
            transform: EngineTransform::BSpline {
                parameters,
                artifact: Some(artifact),
            },
        })
    }

    fn apply(&self, moving: &Image<B, D>, transform: &EngineTransform<B, D>) -> Result<Image<B, D>> {
        match transform {
            EngineTransform::BSpline { parameters, .. } => {
                let deformation = Self::dense(parameters, moving)?;
                check_field_shape(&deformation, moving)?;
                Ok(warp_image(moving, deformation.into_displacement()))
            }
            other => Err(CoregError::TransformMismatch {
                engine: "bspline",
                transform: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::Autodiff;
    use burn::tensor::Tensor;
    use burn_ndarray::NdArray;

    type B = Autodiff<NdArray<f32>>;

    fn blob(shape: [usize; 2], cx: f32, cy: f32) -> Image<B, 2> {
        let device = Default::default();
        let [ny, nx] = shape;
        let values: Vec<f32> = (0..ny * nx)
            .map(|k| {
                let x = (k % nx) as f32 - cx;
                let y = (k / nx) as f32 - cy;
                100.0 * (-(x * x + y * y) / 18.0).exp()
            })
            .collect();
        Image::from_tensor(Tensor::<B, 1>::from_floats(values.as_slice(), &device).reshape(shape))
    }

    #[test]
    fn test_options_validation() {
        assert!(BSplineEngine::new(BSplineOptions::default().with_grid_spacing(0.0)).is_err());
        assert!(BSplineEngine::new(BSplineOptions::default().with_iterations(0)).is_err());
        assert!(BSplineEngine::new(BSplineOptions::default().with_bending_weight(-1.0)).is_err());
    }

    #[test]
    fn test_writes_one_file_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let options = BSplineOptions::default()
            .with_grid_spacing(8.0)
            .with_iterations(5)
            .with_output_dir(dir.path());
        let engine = BSplineEngine::new(options).unwrap();
        let fixed = blob([16, 16], 8.0, 8.0);
        let moving = blob([16, 16], 9.0, 8.0);

        let first = engine.coregister(&moving, &fixed).unwrap();
        let second = engine.coregister(&moving, &fixed).unwrap();
        assert_eq!(engine.calls(), 2);
        assert!(dir.path().join("TransformParameters.0.json").exists());
        assert!(dir.path().join("TransformParameters.1.json").exists());
        assert_eq!(first.deformation.shape(), [16, 16]);
        assert_eq!(first.deformation.components(), 2);

        let artifact = second.transform.artifact().unwrap();
        match &second.transform {
            EngineTransform::BSpline { parameters, .. } => {
                assert_eq!(&artifact.read().unwrap(), parameters);
            }
            _ => panic!("expected a B-spline transform"),
        }
        second.transform.cleanup().unwrap();
        assert!(!artifact.exists());

        first.transform.cleanup().unwrap();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_default_output_dir_is_removed_after_cleanup() {
        let options = BSplineOptions::default().with_grid_spacing(8.0).with_iterations(3);
        let engine = BSplineEngine::new(options).unwrap();
        let fixed = blob([16, 16], 8.0, 8.0);
        let moving = blob([16, 16], 9.0, 8.0);

        let result = engine.coregister(&moving, &fixed).unwrap();
        assert!(engine.output_dir().exists());
        assert!(result.transform.artifact().unwrap().owns_directory());
        result.transform.cleanup().unwrap();
        assert!(!engine.output_dir().exists());
    }

    #[test]
    fn test_rejects_foreign_transform() {
        let dir = tempfile::tempdir().unwrap();
        let engine = BSplineEngine::new(BSplineOptions::default().with_output_dir(dir.path())).unwrap();
        let image = blob([8, 8], 4.0, 4.0);
        let field = DeformationField::zeros([8, 8], 2, &Default::default());
        let result = Coregistration::<B, 2>::apply(&engine, &image, &EngineTransform::Displacement(field));
        assert!(matches!(result, Err(CoregError::TransformMismatch { engine: "bspline", .. })));
    }
}
