//! Interpolator trait for sampling values at continuous coordinates.

use burn::tensor::Tensor;
use burn::tensor::backend::Backend;

/// Samples a tensor at non-integer indices.
///
/// # Type Parameters
/// * `B` - The Burn backend
pub trait Interpolator<B: Backend> {
    /// Interpolate `data` (`[Y, X]` or `[Z, Y, X]`) at `indices`.
    ///
    /// `indices` has shape `[Batch, D]` with columns ordered x first.
    /// Returns the sampled values `[Batch]`.
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1>;
}
