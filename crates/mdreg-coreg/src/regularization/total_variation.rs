//! Total Variation regularization.
//!
//! `TV(u) = mean sqrt(sum_i |∂u/∂x_i|² + eps)`, isotropic per component.
//! The small `eps` keeps the gradient finite where the field is flat.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use super::trait_::utils::squared_gradient_magnitude;
use super::trait_::Regularizer;

/// Edge-preserving L1 penalty on the field gradient.
#[derive(Clone, Debug)]
pub struct TotalVariationRegularizer {
    weight: f64,
    epsilon: f64,
}

impl TotalVariationRegularizer {
    pub fn new(weight: f64) -> Self {
        Self { weight, epsilon: 1e-6 }
    }
}

impl Default for TotalVariationRegularizer {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl<B: Backend> Regularizer<B> for TotalVariationRegularizer {
    fn compute_loss<const D: usize>(&self, field: Tensor<B, 2>, shape: [usize; D]) -> Tensor<B, 1> {
        squared_gradient_magnitude(field, shape)
            .add_scalar(self.epsilon)
            .sqrt()
            .mean()
            .mul_scalar(self.weight)
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
}
