//! Cubic B-spline free-form deformation.
//!
//! Control points sit on a regular grid with one extra layer before the
//! image and two after it, so every point inside the image has its full
//! `4^D` support inside the grid. Control point `j` along an axis lies at
//! physical offset `(j - 1) * grid_spacing` from the image origin.

use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use serde::{Deserialize, Serialize};
use crate::error::{ImageError, Result};
use crate::image::generate_grid;
use super::trait_::Transform;

/// B-Spline Transform (free-form deformation).
///
/// Points and coefficients are in physical units relative to the image
/// origin, x first.
#[derive(Module, Debug)]
pub struct BSplineTransform<B: Backend, const D: usize> {
    /// Control point grid dimensions, x first
    grid_size: [usize; D],
    /// Spacing between control points
    grid_spacing: [f64; D],
    /// Control point displacements [num_control_points, D]
    coefficients: Param<Tensor<B, 2>>,
}

/// Serializable snapshot of a [`BSplineTransform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSplineParameters {
    pub grid_size: Vec<usize>,
    pub grid_spacing: Vec<f64>,
    /// Row-major `[num_control_points, D]`.
    pub coefficients: Vec<f32>,
}

impl<B: Backend, const D: usize> BSplineTransform<B, D> {
    /// Create a transform from explicit coefficients.
    pub fn new(grid_size: [usize; D], grid_spacing: [f64; D], coefficients: Tensor<B, 2>) -> Self {
        Self {
            grid_size,
            grid_spacing,
            coefficients: Param::from_tensor(coefficients),
        }
    }

    /// Identity transform covering an image of `shape` (slowest axis first)
    /// with pixel `spacing` (x first) and control points `grid_spacing`
    /// apart in physical units.
    pub fn identity(shape: [usize; D], spacing: [f64; D], grid_spacing: [f64; D], device: &B::Device) -> Self {
        let grid_size: [usize; D] = std::array::from_fn(|axis| {
            let len = shape[D - 1 - axis];
            let extent = len.saturating_sub(1) as f64 * spacing[axis];
            (extent / grid_spacing[axis]).ceil().max(1.0) as usize + 3
        });
        let num_points: usize = grid_size.iter().product();
        Self::new(grid_size, grid_spacing, Tensor::zeros([num_points, D], device))
    }

    pub fn grid_size(&self) -> [usize; D] {
        self.grid_size
    }

    pub fn grid_spacing(&self) -> [f64; D] {
        self.grid_spacing
    }

    pub fn coefficients(&self) -> Tensor<B, 2> {
        self.coefficients.val()
    }

    /// Cubic B-spline weights for fractional offsets `u` in `[0, 1)`,
    /// stacked into `[Batch, 4]`.
    fn basis(u: Tensor<B, 1>) -> Tensor<B, 2> {
        let u2 = u.clone().powf_scalar(2.0);
        let u3 = u.clone().powf_scalar(3.0);

        let b0 = u.clone().neg().add_scalar(1.0).powf_scalar(3.0) / 6.0;
        let b1 = (u3.clone().mul_scalar(3.0) - u2.clone().mul_scalar(6.0)).add_scalar(4.0) / 6.0;
        let b2 = (u3.clone().mul_scalar(-3.0) + u2.mul_scalar(3.0) + u.mul_scalar(3.0)).add_scalar(1.0) / 6.0;
        let b3 = u3 / 6.0;

        Tensor::cat(
            vec![
                b0.unsqueeze_dim::<2>(1),
                b1.unsqueeze_dim::<2>(1),
                b2.unsqueeze_dim::<2>(1),
                b3.unsqueeze_dim::<2>(1),
            ],
            1,
        )
    }

    /// Displacement at `points` (`[Batch, D]`, physical units).
    pub fn displacement(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = points.device();
        let [batch, _] = points.dims();

        let spacing: Vec<f32> = self.grid_spacing.iter().map(|&s| s as f32).collect();
        let spacing = Tensor::<B, 1>::from_floats(spacing.as_slice(), &device).reshape([1, D]);
        let grid_coords = (points / spacing).add_scalar(1.0);
        let floor = grid_coords.clone().floor();
        let frac = grid_coords - floor.clone();
        let base = floor.int().sub_scalar(1);

        let mut weights = Vec::with_capacity(D);
        let mut bases: Vec<Tensor<B, 1, Int>> = Vec::with_capacity(D);
        for axis in 0..D {
            weights.push(Self::basis(frac.clone().narrow(1, axis, 1).squeeze::<1>(1)));
            bases.push(base.clone().narrow(1, axis, 1).squeeze::<1>(1));
        }

        let coefficients = self.coefficients.val();
        let mut displacement = Tensor::<B, 2>::zeros([batch, D], &device);
        for offset in 0..4usize.pow(D as u32) {
            let mut rem = offset;
            let mut stride = 1i32;
            let mut index: Option<Tensor<B, 1, Int>> = None;
            let mut weight: Option<Tensor<B, 2>> = None;
            for axis in 0..D {
                let o = rem % 4;
                rem /= 4;
                let max = self.grid_size[axis] as i32 - 1;
                let term = bases[axis].clone().add_scalar(o as i32).clamp(0, max) * stride;
                let w = weights[axis].clone().narrow(1, o, 1);
                index = Some(match index {
                    Some(acc) => acc + term,
                    None => term,
                });
                weight = Some(match weight {
                    Some(acc) => acc * w,
                    None => w,
                });
                stride *= self.grid_size[axis] as i32;
            }
            if let (Some(index), Some(weight)) = (index, weight) {
                displacement = displacement + coefficients.clone().select(0, index) * weight;
            }
        }
        displacement
    }

    /// Dense displacement over an image grid, in pixel units.
    pub fn dense_displacement(&self, shape: [usize; D], spacing: [f64; D]) -> Tensor<B, 2> {
        let device = self.coefficients.val().device();
        let spacing: Vec<f32> = spacing.iter().map(|&s| s as f32).collect();
        let spacing = Tensor::<B, 1>::from_floats(spacing.as_slice(), &device).reshape([1, D]);
        let physical = generate_grid::<B, D>(shape, &device) * spacing.clone();
        self.displacement(physical) / spacing
    }

    /// Host copy of the grid and coefficients.
    pub fn to_parameters(&self) -> Result<BSplineParameters> {
        let coefficients = self
            .coefficients
            .val()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| ImageError::Data(format!("{:?}", e)))?;
        Ok(BSplineParameters {
            grid_size: self.grid_size.to_vec(),
            grid_spacing: self.grid_spacing.to_vec(),
            coefficients,
        })
    }

    /// Rebuild a transform from a parameter snapshot.
    pub fn from_parameters(parameters: &BSplineParameters, device: &B::Device) -> Result<Self> {
        let grid_size: [usize; D] = parameters.grid_size.as_slice().try_into().map_err(|_| {
            ImageError::LengthMismatch {
                expected: D,
                actual: parameters.grid_size.len(),
            }
        })?;
        let grid_spacing: [f64; D] = parameters.grid_spacing.as_slice().try_into().map_err(|_| {
            ImageError::LengthMismatch {
                expected: D,
                actual: parameters.grid_spacing.len(),
            }
        })?;
        let num_points: usize = grid_size.iter().product();
        if parameters.coefficients.len() != num_points * D {
            return Err(ImageError::LengthMismatch {
                expected: num_points * D,
                actual: parameters.coefficients.len(),
            });
        }
        let coefficients = Tensor::<B, 2>::from_data(
            TensorData::new(parameters.coefficients.clone(), [num_points, D]),
            device,
        );
        Ok(Self::new(grid_size, grid_spacing, coefficients))
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for BSplineTransform<B, D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        points.clone() + self.displacement(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_identity_grid_layout() {
        let device = Default::default();
        // 31 pixels of spacing 1 along x, 21 along y: extents 30 and 20
        let transform = BSplineTransform::<TestBackend, 2>::identity([21, 31], [1.0, 1.0], [10.0, 10.0], &device);
        assert_eq!(transform.grid_size(), [6, 5]);
        assert_eq!(transform.coefficients().dims(), [30, 2]);

        let points = Tensor::<TestBackend, 2>::from_floats([[3.0, 7.0], [30.0, 20.0]], &device);
        let moved = transform.transform_points(points.clone());
        assert_eq!(
            moved.into_data().to_vec::<f32>().unwrap(),
            points.into_data().to_vec::<f32>().unwrap()
        );
    }

    #[test]
    fn test_single_control_point_weight() {
        let device = Default::default();
        let mut coefficients = vec![0.0f32; 36 * 2];
        // Control point (2, 2) sits at physical (10, 10)
        let index = 2 + 2 * 6;
        coefficients[index * 2] = 1.0;
        coefficients[index * 2 + 1] = 1.0;
        let coefficients = Tensor::<TestBackend, 2>::from_data(TensorData::new(coefficients, [36, 2]), &device);
        let transform = BSplineTransform::new([6, 6], [10.0, 10.0], coefficients);

        let points = Tensor::<TestBackend, 2>::from_floats([[10.0, 10.0]], &device);
        let d = transform.displacement(points).into_data().to_vec::<f32>().unwrap();
        // B1(0)^2 = (4/6)^2
        let expected = 4.0 / 9.0;
        assert!((d[0] - expected).abs() < 1e-5);
        assert!((d[1] - expected).abs() < 1e-5);
    }

    #[test]
    fn test_constant_coefficients_translate() {
        let device = Default::default();
        let transform = BSplineTransform::<TestBackend, 3>::identity([4, 5, 6], [1.0, 1.0, 2.0], [4.0, 4.0, 4.0], &device);
        let [n, _] = transform.coefficients().dims();
        let coefficients = Tensor::<TestBackend, 2>::zeros([n, 3], &device)
            + Tensor::<TestBackend, 2>::from_floats([[0.5, -1.0, 2.0]], &device);
        let transform = BSplineTransform::new(transform.grid_size(), transform.grid_spacing(), coefficients);

        let dense = transform.dense_displacement([4, 5, 6], [1.0, 1.0, 2.0]);
        assert_eq!(dense.dims(), [120, 3]);
        let values = dense.into_data().to_vec::<f32>().unwrap();
        for row in values.chunks(3) {
            assert!((row[0] - 0.5).abs() < 1e-4);
            assert!((row[1] + 1.0).abs() < 1e-4);
            // 2.0 physical along z at spacing 2
            assert!((row[2] - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_parameters_roundtrip_and_validation() {
        let device = Default::default();
        let transform = BSplineTransform::<TestBackend, 2>::identity([8, 8], [1.0, 1.0], [4.0, 4.0], &device);
        let parameters = transform.to_parameters().unwrap();
        let restored = BSplineTransform::<TestBackend, 2>::from_parameters(&parameters, &device).unwrap();
        assert_eq!(restored.grid_size(), transform.grid_size());

        let mut broken = parameters.clone();
        broken.coefficients.pop();
        assert!(BSplineTransform::<TestBackend, 2>::from_parameters(&broken, &device).is_err());
        assert!(BSplineTransform::<TestBackend, 3>::from_parameters(&parameters, &device).is_err());
    }
}
