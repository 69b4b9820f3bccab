//! Normalized Cross Correlation metric.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use super::trait_::Metric;

/// Zero-normalized cross correlation over the whole image:
///
/// `NCC = sum((F - mean(F)) (M - mean(M))) / sqrt(sum((F - mean(F))^2) sum((M - mean(M))^2))`
///
/// The loss is `-NCC`, in `[-1, 1]`, with -1 for perfectly correlated images.
/// Invariant to affine intensity changes between the two images.
#[derive(Debug, Clone, Copy)]
pub struct NormalizedCrossCorrelation {
    epsilon: f64,
}

impl NormalizedCrossCorrelation {
    pub fn new() -> Self {
        Self { epsilon: 1e-8 }
    }
}

impl Default for NormalizedCrossCorrelation {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Metric<B> for NormalizedCrossCorrelation {
    fn forward(&self, fixed: Tensor<B, 1>, moving: Tensor<B, 1>) -> Tensor<B, 1> {
        let f_centered = fixed.clone() - fixed.mean();
        let m_centered = moving.clone() - moving.mean();

        let numerator = (f_centered.clone() * m_centered.clone()).sum();
        let denom_f = f_centered.powf_scalar(2.0).sum();
        let denom_m = m_centered.powf_scalar(2.0).sum();
        let denominator = (denom_f * denom_m).add_scalar(self.epsilon).sqrt();

        (numerator / denominator).neg()
    }

    fn name(&self) -> &'static str {
        "NormalizedCrossCorrelation"
    }
}
