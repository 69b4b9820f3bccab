//! Metric trait for image similarity measurement.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Dissimilarity between two intensity vectors. Lower is better.
///
/// Both inputs hold one value per pixel of the fixed grid, in storage
/// order; the moving values have already been resampled through the
/// current transform.
pub trait Metric<B: Backend> {
    /// Scalar loss tensor.
    fn forward(&self, fixed: Tensor<B, 1>, moving: Tensor<B, 1>) -> Tensor<B, 1>;

    fn name(&self) -> &'static str;
}
