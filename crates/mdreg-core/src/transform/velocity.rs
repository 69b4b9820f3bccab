//! Stationary velocity field with scaling-and-squaring integration.
//!
//! `phi = exp(v)`: the velocity is scaled by `1 / 2^steps` and composed
//! with itself `steps` times, `u <- u + u(x + u)`. The inverse map is
//! `exp(-v)`.

use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use crate::interpolation::warp_field;
use super::displacement_field::DisplacementFieldTransform;
use super::trait_::Transform;

/// Trainable stationary velocity field, `[N, D]` in pixel units.
#[derive(Module, Debug)]
pub struct VelocityField<B: Backend, const D: usize> {
    velocity: Param<Tensor<B, 2>>,
    shape: [usize; D],
    steps: usize,
}

impl<B: Backend, const D: usize> VelocityField<B, D> {
    /// # Arguments
    /// * `velocity` - Velocity field [N, D]
    /// * `shape` - Spatial shape, slowest axis first
    /// * `steps` - Number of squaring steps (7 gives 128 sub-steps)
    pub fn new(velocity: Tensor<B, 2>, shape: [usize; D], steps: usize) -> Self {
        Self {
            velocity: Param::from_tensor(velocity),
            shape,
            steps,
        }
    }

    pub fn zeros(shape: [usize; D], steps: usize, device: &B::Device) -> Self {
        let n: usize = shape.iter().product();
        Self::new(Tensor::zeros([n, D], device), shape, steps)
    }

    pub fn velocity(&self) -> Tensor<B, 2> {
        self.velocity.val()
    }

    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Forward displacement `exp(v) - id`.
    pub fn integrate(&self) -> Tensor<B, 2> {
        integrate(self.velocity.val(), self.shape, self.steps)
    }

    /// Inverse displacement `exp(-v) - id`.
    pub fn integrate_inverse(&self) -> Tensor<B, 2> {
        integrate(self.velocity.val().neg(), self.shape, self.steps)
    }
}

/// Scaling and squaring of a `[N, D]` velocity laid out on `shape`.
pub fn integrate<B: Backend, const D: usize>(velocity: Tensor<B, 2>, shape: [usize; D], steps: usize) -> Tensor<B, 2> {
    let scale = 0.5f64.powf(steps as f64);
    let mut flow = velocity.mul_scalar(scale);
    for _ in 0..steps {
        let warped = warp_field(flow.clone(), shape, flow.clone());
        flow = flow + warped;
    }
    flow
}

impl<B: Backend, const D: usize> Transform<B, D> for VelocityField<B, D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let displacement = self.integrate();
        DisplacementFieldTransform::new(displacement, self.shape).transform_points(points)
    }
}
