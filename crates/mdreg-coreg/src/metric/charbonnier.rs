//! Charbonnier penalty, a differentiable L1 data term.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use super::trait_::Metric;

/// `mean(sqrt((F - M)^2 + eps^2))`
///
/// Behaves like the absolute difference away from zero while keeping a
/// finite gradient at zero.
#[derive(Debug, Clone, Copy)]
pub struct Charbonnier {
    epsilon: f64,
}

impl Charbonnier {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }
}

impl Default for Charbonnier {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

impl<B: Backend> Metric<B> for Charbonnier {
    fn forward(&self, fixed: Tensor<B, 1>, moving: Tensor<B, 1>) -> Tensor<B, 1> {
        (moving - fixed)
            .powf_scalar(2.0)
            .add_scalar(self.epsilon * self.epsilon)
            .sqrt()
            .mean()
    }

    fn name(&self) -> &'static str {
        "Charbonnier"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_charbonnier_approximates_l1() {
        let device = Default::default();
        let a = Tensor::<B, 1>::from_floats([0.0, 0.0], &device);
        let b = Tensor::<B, 1>::from_floats([2.0, -4.0], &device);
        let loss: f32 = Charbonnier::default().forward(a.clone(), b).into_scalar();
        assert!((loss - 3.0).abs() < 1e-4);
        let zero: f32 = Charbonnier::default().forward(a.clone(), a).into_scalar();
        assert!((zero - 1e-3).abs() < 1e-6);
    }
}
