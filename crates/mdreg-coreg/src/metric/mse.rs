//! Mean Squared Error metric.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use super::trait_::Metric;

/// `MSE = (1/N) * sum((F - M)^2)`
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

impl MeanSquaredError {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Metric<B> for MeanSquaredError {
    fn forward(&self, fixed: Tensor<B, 1>, moving: Tensor<B, 1>) -> Tensor<B, 1> {
        (moving - fixed).powf_scalar(2.0).mean()
    }

    fn name(&self) -> &'static str {
        "MeanSquaredError"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_mse_values() {
        let device = Default::default();
        let a = Tensor::<B, 1>::from_floats([1.0, 2.0, 3.0, 4.0], &device);
        let b = Tensor::<B, 1>::from_floats([1.0, 2.0, 3.0, 6.0], &device);
        let metric = MeanSquaredError::new();
        let same: f32 = metric.forward(a.clone(), a.clone()).into_scalar();
        let diff: f32 = metric.forward(a, b).into_scalar();
        assert!(same < 1e-8);
        assert!((diff - 1.0).abs() < 1e-6);
    }
}
