//! Diffeomorphic engine on a stationary velocity field.
//!
//! The velocity is integrated by scaling and squaring into a displacement;
//! negating the velocity yields the inverse map, so both directions are
//! available without a second optimisation.

use burn::tensor::backend::AutodiffBackend;
use mdreg_core::interpolation::warp_image;
use mdreg_core::transform::VelocityField;
use mdreg_core::{DeformationField, Image};
use serde::{Deserialize, Serialize};
use crate::error::{CoregError, Result};
use crate::metric::{MeanSquaredError, Metric, NormalizedCrossCorrelation};
use crate::progress::ProgressTracker;
use crate::registration::{Registration, RegistrationConfig};
use crate::regularization::{DiffusionRegularizer, Regularizer};
use crate::validation::{
    validate_image_shapes, validate_integration_steps, validate_iterations, validate_learning_rate, validate_non_negative,
};
use super::{check_field_shape, Coregistered, Coregistration, EngineTransform, Problem};

/// Image similarity driving the velocity update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Sum of squared differences.
    #[default]
    Ssd,
    /// Cross-correlation.
    Cc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffeomorphicOptions {
    pub metric: SimilarityMetric,
    /// Weight of the diffusion penalty on the velocity.
    pub smoothness: f64,
    /// Number of squaring steps; the velocity is scaled by `2^-steps`.
    pub integration_steps: usize,
    pub iterations: usize,
    pub learning_rate: f64,
}

impl Default for DiffeomorphicOptions {
    fn default() -> Self {
        Self {
            metric: SimilarityMetric::Ssd,
            smoothness: 0.1,
            integration_steps: 7,
            iterations: 200,
            learning_rate: 0.05,
        }
    }
}

impl DiffeomorphicOptions {
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_smoothness(mut self, smoothness: f64) -> Self {
        self.smoothness = smoothness;
        self
    }

    pub fn with_integration_steps(mut self, steps: usize) -> Self {
        self.integration_steps = steps;
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

    pub fn validate(&self) -> Result<()> {
        validate_non_negative("smoothness", self.smoothness)?;
        validate_integration_steps(self.integration_steps)?;
        validate_iterations(self.iterations)?;
        validate_learning_rate(self.learning_rate)
    }
}

#[derive(Debug)]
pub struct DiffeomorphicEngine {
    options: DiffeomorphicOptions,
    tracker: ProgressTracker,
}

impl DiffeomorphicEngine {
    pub fn new(options: DiffeomorphicOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            tracker: ProgressTracker::new("diffeomorphic"),
        })
    }

    pub fn with_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker.with_stage("diffeomorphic");
        self
    }

    pub fn options(&self) -> &DiffeomorphicOptions {
        &self.options
    }
}

impl<B: AutodiffBackend, const D: usize> Coregistration<B, D> for DiffeomorphicEngine {
    fn name(&self) -> &'static str {
        "diffeomorphic"
    }

    fn coregister(&self, moving: &Image<B, D>, fixed: &Image<B, D>) -> Result<Coregistered<B, D>> {
        validate_image_shapes(moving, fixed)?;
        let shape = fixed.shape();
        let device = fixed.data().device();

        let problem = Problem::new(moving, fixed);
        let smoothness = DiffusionRegularizer::new(self.options.smoothness);
        let metric = self.options.metric;
        let config = RegistrationConfig::new(self.options.iterations, self.options.learning_rate);
        let mut registration =
            Registration::<B, VelocityField<B, D>>::adam(config)?.with_tracker(self.tracker.clone());
        let velocity = VelocityField::zeros(shape, self.options.integration_steps, &device);
        let result = registration.execute(velocity, |v| {
            let warped = problem.sample(v.integrate());
            let similarity = match metric {
                SimilarityMetric::Ssd => MeanSquaredError::new().forward(problem.fixed.clone(), warped),
                SimilarityMetric::Cc => NormalizedCrossCorrelation::new().forward(problem.fixed.clone(), warped),
            };
            similarity + smoothness.compute_loss(v.velocity(), shape)
        })?;

        let velocity = result.module;
        let forward = DeformationField::new(velocity.integrate().detach(), shape)?;
        let inverse = DeformationField::new(velocity.integrate_inverse().detach(), shape)?;
        let image = warp_image(moving, forward.displacement().clone());

        tracing::debug!(
            engine = "diffeomorphic",
            ?metric,
            final_loss = result.loss_history.last().copied().unwrap_or(f64::NAN),
            max_displacement = forward.max_norm(),
            "coregistration complete"
        );

        Ok(Coregistered {
            image,
            deformation: forward.clone(),
            transform: EngineTransform::Diffeomorphic { forward, inverse },
        })
    }

    fn apply(&self, moving: &Image<B, D>, transform: &EngineTransform<B, D>) -> Result<Image<B, D>> {
        match transform {
            EngineTransform::Diffeomorphic { forward, .. } => {
                check_field_shape(forward, moving)?;
                Ok(warp_image(moving, forward.displacement().clone()))
            }
            other => Err(CoregError::TransformMismatch {
                engine: "diffeomorphic",
                transform: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        let options: DiffeomorphicOptions = serde_json::from_str(r#"{"metric": "cc", "smoothness": 0.5}"#).unwrap();
        assert_eq!(options.metric, SimilarityMetric::Cc);
        assert_eq!(options.smoothness, 0.5);
        assert_eq!(options.integration_steps, 7);
        assert!(serde_json::from_str::<DiffeomorphicOptions>(r#"{"metric": "mi"}"#).is_err());
    }

    #[test]
    fn test_options_validation() {
        assert!(DiffeomorphicEngine::new(DiffeomorphicOptions::default()).is_ok());
        assert!(DiffeomorphicEngine::new(DiffeomorphicOptions::default().with_smoothness(-1.0)).is_err());
        assert!(DiffeomorphicEngine::new(DiffeomorphicOptions::default().with_iterations(0)).is_err());
    }

    #[test]
    fn test_integration_steps_are_bounded() {
        let options = DiffeomorphicOptions::default();
        assert!(DiffeomorphicEngine::new(options.clone().with_integration_steps(16)).is_ok());
        assert!(matches!(
            DiffeomorphicEngine::new(options.clone().with_integration_steps(160)),
            Err(CoregError::InvalidConfiguration(_))
        ));
        assert!(DiffeomorphicEngine::new(options.with_integration_steps(0)).is_err());
    }
}
