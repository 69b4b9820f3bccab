//! Regularizer trait and finite-difference helpers.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Trait for field regularizers.
pub trait Regularizer<B: Backend> {
    /// Weighted regularization loss of a `[N, C]` field laid out on `shape`.
    fn compute_loss<const D: usize>(&self, field: Tensor<B, 2>, shape: [usize; D]) -> Tensor<B, 1>;

    fn weight(&self) -> f64;

    fn set_weight(&mut self, weight: f64);
}

/// Finite differences on `[N, C]` fields.
///
/// `axis` counts x first (`0` = x), matching displacement columns.
pub mod utils {
    use burn::tensor::backend::Backend;
    use burn::tensor::Tensor;

    /// View the field as `[outer, len, inner, C]` around grid axis `axis`.
    fn split_axis<const D: usize>(shape: [usize; D], axis: usize) -> (usize, usize, usize) {
        let dim = D - 1 - axis;
        let outer: usize = shape[..dim].iter().product();
        let inner: usize = shape[dim + 1..].iter().product();
        (outer, shape[dim], inner)
    }

    /// Forward difference `f[i+1] - f[i]` along `axis`, zero on the last
    /// layer so the result keeps the `[N, C]` layout.
    pub fn forward_difference<B: Backend, const D: usize>(
        field: Tensor<B, 2>,
        shape: [usize; D],
        axis: usize,
    ) -> Tensor<B, 2> {
        let [n, c] = field.dims();
        let device = field.device();
        let (outer, len, inner) = split_axis(shape, axis);
        if len < 2 {
            return Tensor::zeros([n, c], &device);
        }
        let f: Tensor<B, 4> = field.reshape([outer, len, inner, c]);
        let ahead = f.clone().slice([0..outer, 1..len, 0..inner, 0..c]);
        let behind = f.slice([0..outer, 0..(len - 1), 0..inner, 0..c]);
        let pad = Tensor::zeros([outer, 1, inner, c], &device);
        Tensor::cat(vec![ahead - behind, pad], 1).reshape([n, c])
    }

    /// Central second difference `f[i+1] - 2 f[i] + f[i-1]` along `axis`,
    /// zero on the boundary layers.
    pub fn second_difference<B: Backend, const D: usize>(
        field: Tensor<B, 2>,
        shape: [usize; D],
        axis: usize,
    ) -> Tensor<B, 2> {
        let [n, c] = field.dims();
        let device = field.device();
        let (outer, len, inner) = split_axis(shape, axis);
        if len < 3 {
            return Tensor::zeros([n, c], &device);
        }
        let f: Tensor<B, 4> = field.reshape([outer, len, inner, c]);
        let ahead = f.clone().slice([0..outer, 2..len, 0..inner, 0..c]);
        let center = f.clone().slice([0..outer, 1..(len - 1), 0..inner, 0..c]);
        let behind = f.slice([0..outer, 0..(len - 2), 0..inner, 0..c]);
        let pad = Tensor::zeros([outer, 1, inner, c], &device);
        let interior = ahead + behind - center.mul_scalar(2.0);
        Tensor::cat(vec![pad.clone(), interior, pad], 1).reshape([n, c])
    }

    /// Forward differences along every axis, x first.
    pub fn spatial_gradients<B: Backend, const D: usize>(field: Tensor<B, 2>, shape: [usize; D]) -> Vec<Tensor<B, 2>> {
        (0..D).map(|axis| forward_difference(field.clone(), shape, axis)).collect()
    }

    /// Sum of squared forward differences over all axes, per element.
    pub fn squared_gradient_magnitude<B: Backend, const D: usize>(
        field: Tensor<B, 2>,
        shape: [usize; D],
    ) -> Tensor<B, 2> {
        let [n, c] = field.dims();
        let device = field.device();
        spatial_gradients(field, shape)
            .into_iter()
            .fold(Tensor::zeros([n, c], &device), |acc, g| acc + g.powf_scalar(2.0))
    }
}
