//! Bending energy regularization.
//!
//! Thin-plate energy
//!
//! `R(u) = mean [ sum_i |∂²u/∂x_i²|² + 2 sum_{i<j} |∂²u/∂x_i∂x_j|² ]`
//!
//! Vanishes for affine fields. Applied to B-spline coefficient grids it
//! keeps the free-form deformation smooth.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use super::trait_::utils::{forward_difference, second_difference};
use super::trait_::Regularizer;

/// Penalizes second-order spatial derivatives.
#[derive(Clone, Debug)]
pub struct BendingEnergyRegularizer {
    weight: f64,
}

impl BendingEnergyRegularizer {
    pub fn new(weight: f64) -> Self {
        Self { weight }
    }
}

impl Default for BendingEnergyRegularizer {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl<B: Backend> Regularizer<B> for BendingEnergyRegularizer {
    fn compute_loss<const D: usize>(&self, field: Tensor<B, 2>, shape: [usize; D]) -> Tensor<B, 1> {
        let [n, c] = field.dims();
        let device = field.device();
        let mut energy = Tensor::<B, 2>::zeros([n, c], &device);
        for i in 0..D {
            energy = energy + second_difference(field.clone(), shape, i).powf_scalar(2.0);
            let along_i = forward_difference(field.clone(), shape, i);
            for j in (i + 1)..D {
                let cross = forward_difference(along_i.clone(), shape, j);
                energy = energy + cross.powf_scalar(2.0).mul_scalar(2.0);
            }
        }
        energy.mean().mul_scalar(self.weight)
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn set_weight(&mut self, weight: f64) {
        self.weight = weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_affine_field_has_no_bending() {
        let device = Default::default();
        // u = (x + 2y, 3x) on a 4x5 grid
        let mut values = Vec::new();
        for y in 0..4 {
            for x in 0..5 {
                values.push((x + 2 * y) as f32);
                values.push((3 * x) as f32);
            }
        }
        let field = Tensor::<B, 2>::from_data(TensorData::new(values, [20, 2]), &device);
        let loss: f32 = BendingEnergyRegularizer::new(1.0).compute_loss(field, [4, 5]).into_scalar();
        assert!(loss.abs() < 1e-6);
    }

    #[test]
    fn test_bent_field_has_energy() {
        let device = Default::default();
        let values: Vec<f32> = (0..9).map(|i| ((i % 3) * (i % 3)) as f32).collect();
        let field = Tensor::<B, 2>::from_data(TensorData::new(values, [9, 1]), &device);
        let loss: f32 = BendingEnergyRegularizer::new(1.0).compute_loss(field, [3, 3]).into_scalar();
        assert!(loss > 0.0);
    }
}
