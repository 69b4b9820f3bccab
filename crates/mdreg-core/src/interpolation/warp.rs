//! Resampling of images and vector fields through dense displacements.
//!
//! Displacements are `[N, D]` tensors in pixel units, one row per pixel in
//! storage order, columns x first. Warping samples the source at
//! `x + u(x)` for every pixel `x` of the output grid.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use crate::image::{generate_grid, Image};
use super::{Interpolator, LinearInterpolator};

/// Resample `image` at `x + displacement(x)`.
pub fn warp_image<B: Backend, const D: usize>(image: &Image<B, D>, displacement: Tensor<B, 2>) -> Image<B, D> {
    let shape = image.shape();
    let device = image.data().device();
    let coords = generate_grid::<B, D>(shape, &device) + displacement;
    let values = LinearInterpolator::new().interpolate(image.data(), coords);
    image.with_data(values.reshape(shape))
}

/// Resample every component of a `[N, C]` field laid out on `shape` at
/// `x + displacement(x)`.
pub fn warp_field<B: Backend, const D: usize>(
    field: Tensor<B, 2>,
    shape: [usize; D],
    displacement: Tensor<B, 2>,
) -> Tensor<B, 2> {
    let [_, components] = field.dims();
    let device = field.device();
    let coords = generate_grid::<B, D>(shape, &device) + displacement;
    let interpolator = LinearInterpolator::new();

    let sampled = (0..components)
        .map(|c| {
            let component: Tensor<B, D> = field.clone().narrow(1, c, 1).reshape(shape);
            interpolator
                .interpolate(&component, coords.clone())
                .unsqueeze_dim::<2>(1)
        })
        .collect();
    Tensor::cat(sampled, 1)
}
