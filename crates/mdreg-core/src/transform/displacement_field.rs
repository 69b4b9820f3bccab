//! Dense displacement field transform.
//!
//! Every pixel carries its own displacement vector. The field is stored as
//! `[N, D]` in pixel units, rows in storage order, columns x first.

use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use crate::interpolation::{Interpolator, LinearInterpolator};
use super::trait_::Transform;

/// Trainable dense displacement field.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality
#[derive(Module, Debug)]
pub struct DisplacementFieldTransform<B: Backend, const D: usize> {
    /// Displacement field with shape [N, D]
    displacement: Param<Tensor<B, 2>>,
    /// Spatial shape of the grid, slowest axis first
    shape: [usize; D],
}

impl<B: Backend, const D: usize> DisplacementFieldTransform<B, D> {
    pub fn new(displacement: Tensor<B, 2>, shape: [usize; D]) -> Self {
        Self {
            displacement: Param::from_tensor(displacement),
            shape,
        }
    }

    /// Zero displacement over `shape`.
    pub fn zeros(shape: [usize; D], device: &B::Device) -> Self {
        let n: usize = shape.iter().product();
        Self::new(Tensor::zeros([n, D], device), shape)
    }

    pub fn displacement(&self) -> Tensor<B, 2> {
        self.displacement.val()
    }

    pub fn shape(&self) -> [usize; D] {
        self.shape
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for DisplacementFieldTransform<B, D> {
    /// Points are continuous pixel indices; the field is sampled linearly.
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let field = self.displacement.val();
        let interpolator = LinearInterpolator::new();
        let sampled = (0..D)
            .map(|c| {
                let component: Tensor<B, D> = field.clone().narrow(1, c, 1).reshape(self.shape);
                interpolator
                    .interpolate(&component, points.clone())
                    .unsqueeze_dim::<2>(1)
            })
            .collect();
        points + Tensor::cat(sampled, 1)
    }
}
