//! Diffusion regularization.
//!
//! `R(u) = mean |∇u|²`, the first-order membrane energy.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use super::trait_::utils::squared_gradient_magnitude;
use super::trait_::Regularizer;

/// Penalizes first-order spatial derivatives.
#[derive(Clone, Debug)]
pub struct DiffusionRegularizer {
    weight: f64,
}

impl DiffusionRegularizer {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for DiffusionRegularizer {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl<B: Backend> Regularizer<B> for DiffusionRegularizer {
    fn compute_loss<const D: usize>(&self, field: Tensor<B, 2>, shape: [usize; D]) -> Tensor<B, 1> {
        squared_gradient_magnitude(field, shape).mean().mul_scalar(self.weight)
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
}
