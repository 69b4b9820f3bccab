//! Dense optical-flow engine.
//!
//! Minimises `attachment * mean(charbonnier(I1(x + u) - I0(x))) + TV(u)`
//! over a per-pixel displacement `u`, a smooth TV-L1 formulation that
//! keeps gradients defined where the residual vanishes.

use burn::tensor::backend::AutodiffBackend;
use mdreg_core::interpolation::warp_image;
use mdreg_core::transform::DisplacementFieldTransform;
use mdreg_core::{DeformationField, Image};
use serde::{Deserialize, Serialize};
use crate::error::{CoregError, Result};
use crate::metric::{Charbonnier, Metric};
use crate::progress::ProgressTracker;
use crate::registration::{Registration, RegistrationConfig};
use crate::regularization::{Regularizer, TotalVariationRegularizer};
use crate::validation::{validate_image_shapes, validate_iterations, validate_learning_rate, validate_positive};
use super::{check_field_shape, Coregistered, Coregistration, EngineTransform, Problem};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpticalFlowOptions {
    /// Weight of the data term relative to total variation. Larger values
    /// give less regularised flows.
    pub attachment: f64,
    pub iterations: usize,
    pub learning_rate: f64,
}

impl Default for OpticalFlowOptions {
    fn default() -> Self {
        Self {
            attachment: 15.0,
            iterations: 200,
            learning_rate: 0.1,
        }
    }
}

impl OpticalFlowOptions {
    pub fn with_attachment(mut self, attachment: f64) -> Self {
        self.attachment = attachment;
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
        validate_positive("attachment", self.attachment)?;
        validate_iterations(self.iterations)?;
        validate_learning_rate(self.learning_rate)
    }
}

#[derive(Debug)]
pub struct OpticalFlowEngine {
    options: OpticalFlowOptions,
    tracker: ProgressTracker,
}

impl OpticalFlowEngine {
    pub fn new(options: OpticalFlowOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            options,
            tracker: ProgressTracker::new("optical_flow"),
        })
    }

    pub fn with_tracker(mut self, tracker: ProgressTracker) -> Self {
        self.tracker = tracker.with_stage("optical_flow");
        self
    }

    pub fn options(&self) -> &OpticalFlowOptions {
        &self.options
    }
}

impl<B: AutodiffBackend, const D: usize> Coregistration<B, D> for OpticalFlowEngine {
    fn name(&self) -> &'static str {
        "optical_flow"
    }

    fn coregister(&self, moving: &Image<B, D>, fixed: &Image<B, D>) -> Result<Coregistered<B, D>> {
        validate_image_shapes(moving, fixed)?;
        let shape = fixed.shape();
        let device = fixed.data().device();

        let problem = Problem::new(moving, fixed);
        let data_term = Charbonnier::default();
        let tv = TotalVariationRegularizer::new(1.0);
        let attachment = self.options.attachment;
        let config = RegistrationConfig::new(self.options.iterations, self.options.learning_rate);
        let mut registration =
            Registration::<B, DisplacementFieldTransform<B, D>>::adam(config)?.with_tracker(self.tracker.clone());
        let result = registration.execute(DisplacementFieldTransform::zeros(shape, &device), |field| {
            let u = field.displacement();
            let warped = problem.sample(u.clone());
            data_term.forward(problem.fixed.clone(), warped).mul_scalar(attachment) + tv.compute_loss(u, shape)
        })?;

        let deformation = DeformationField::new(result.module.displacement().detach(), shape)?;
        let image = warp_image(moving, deformation.displacement().clone());

        tracing::debug!(
            engine = "optical_flow",
            final_loss = result.final_loss().unwrap_or(f64::NAN),
            max_displacement = deformation.max_norm(),
            "coregistration complete"
        );

        Ok(Coregistered {
            image,
            deformation: deformation.clone(),
            transform: EngineTransform::Displacement(deformation),
        })
    }

    fn apply(&self, moving: &Image<B, D>, transform: &EngineTransform<B, D>) -> Result<Image<B, D>> {
        match transform {
            EngineTransform::Displacement(field) => {
                check_field_shape(field, moving)?;
                Ok(warp_image(moving, field.displacement().clone()))
            }
            other => Err(CoregError::TransformMismatch {
                engine: "optical_flow",
                transform: other.kind(),
            }),
        }
    }
}
