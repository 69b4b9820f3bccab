//! Multilinear interpolation (linear, bilinear, trilinear).

use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor};
use super::trait_::Interpolator;

/// Linear interpolator with edge replication outside the grid.
///
/// Works for any rank by visiting the `2^D` corners of the enclosing cell,
/// which keeps the sampled values differentiable with respect to the
/// sampling coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearInterpolator;

impl LinearInterpolator {
    pub fn new() -> Self {
        Self
    }
}

/// Per-axis lower/upper cell indices and fractional weight.
struct AxisSample<B: Backend> {
    lower: Tensor<B, 1, Int>,
    upper: Tensor<B, 1, Int>,
    weight: Tensor<B, 1>,
    stride: i32,
}

impl<B: Backend> Interpolator<B> for LinearInterpolator {
    fn interpolate<const D: usize>(&self, data: &Tensor<B, D>, indices: Tensor<B, 2>) -> Tensor<B, 1> {
        let dims = data.dims();
        let total: usize = dims.iter().product();
        let [batch, _] = indices.dims();
        let device = indices.device();
        let flat = data.clone().reshape([total]);

        // Column `axis` of `indices` walks tensor dim `D - 1 - axis`.
        let mut stride = 1usize;
        let mut axes: Vec<AxisSample<B>> = Vec::with_capacity(D);
        for axis in 0..D {
            let len = dims[D - 1 - axis];
            let coord = indices.clone().narrow(1, axis, 1).squeeze::<1>(1);
            let floor = coord.clone().floor();
            let weight = coord - floor.clone();
            let upper = floor.clone().add_scalar(1.0);
            axes.push(AxisSample {
                lower: floor.clamp(0.0, (len - 1) as f64).int(),
                upper: upper.clamp(0.0, (len - 1) as f64).int(),
                weight,
                stride: stride as i32,
            });
            stride *= len;
        }

        let mut result = Tensor::<B, 1>::zeros([batch], &device);
        for corner in 0..(1usize << D) {
            let mut index: Option<Tensor<B, 1, Int>> = None;
            let mut weight: Option<Tensor<B, 1>> = None;
            for (axis, sample) in axes.iter().enumerate() {
                let use_upper = (corner >> axis) & 1 == 1;
                let (idx, w) = if use_upper {
                    (sample.upper.clone(), sample.weight.clone())
                } else {
                    (sample.lower.clone(), sample.weight.clone().neg().add_scalar(1.0))
                };
                let term = idx * sample.stride;
                index = Some(match index {
                    Some(acc) => acc + term,
                    None => term,
                });
                weight = Some(match weight {
                    Some(acc) => acc * w,
                    None => w,
                });
            }
            if let (Some(index), Some(weight)) = (index, weight) {
                result = result + flat.clone().gather(0, index) * weight;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_linear_3d_axes_and_center() {
        let device = Default::default();
        // [Z=2, Y=2, X=2]: value = 100 z + 10 y + x
        let data_vec = vec![0.0, 1.0, 10.0, 11.0, 100.0, 101.0, 110.0, 111.0];
        let data = Tensor::<TestBackend, 3>::from_data(TensorData::new(data_vec, [2, 2, 2]), &device);
        let interpolator = LinearInterpolator::new();

        let indices = Tensor::<TestBackend, 2>::from_floats(
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [0.5, 0.5, 0.5]],
            &device,
        );
        let values = interpolator.interpolate(&data, indices).into_data().to_vec::<f32>().unwrap();
        assert_eq!(values[0], 1.0);
        assert_eq!(values[1], 10.0);
        assert_eq!(values[2], 100.0);
        assert!((values[3] - 55.5).abs() < 1e-5);
    }

    #[test]
    fn test_linear_2d_fractional() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 2>::from_data(TensorData::new(vec![0.0f32, 1.0, 10.0, 11.0], [2, 2]), &device);
        let indices = Tensor::<TestBackend, 2>::from_floats([[0.25, 0.5]], &device);
        let values = LinearInterpolator::new().interpolate(&data, indices).into_data().to_vec::<f32>().unwrap();
        assert!((values[0] - 5.25).abs() < 1e-5);
    }

    #[test]
    fn test_linear_edge_replication() {
        let device = Default::default();
        let data = Tensor::<TestBackend, 2>::from_data(TensorData::new(vec![0.0f32, 1.0, 2.0, 3.0], [2, 2]), &device);
        let indices = Tensor::<TestBackend, 2>::from_floats([[-1.0, -1.0], [5.0, 5.0]], &device);
        let values = LinearInterpolator::new().interpolate(&data, indices).into_data().to_vec::<f32>().unwrap();
        assert_eq!(values[0], 0.0);
        assert_eq!(values[1], 3.0);
    }
}
