//! Transform trait for spatial coordinate transformations.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

/// Maps points of the fixed image onto the moving image.
///
/// Trainable implementations are burn modules; the trait itself does not
/// require `Module` so plain transforms can implement it too.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality (2 or 3)
pub trait Transform<B: Backend, const D: usize> {
    /// Apply the transform to `points` (`[Batch, D]`, x first).
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;
}
