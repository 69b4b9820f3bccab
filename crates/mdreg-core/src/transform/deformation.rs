//! Dense deformation fields returned by coregistration.

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use crate::error::{ImageError, Result};

/// Per-pixel displacement, `[N, C]` in pixel units.
///
/// `N` is the number of pixels in storage order and `C` the number of
/// displacement components, x first. Volumetric fields have `C == D`;
/// fields assembled slice by slice from 2D registrations have `C == 2`.
#[derive(Debug, Clone)]
pub struct DeformationField<B: Backend, const D: usize> {
    displacement: Tensor<B, 2>,
    shape: [usize; D],
}

impl<B: Backend, const D: usize> DeformationField<B, D> {
    pub fn new(displacement: Tensor<B, 2>, shape: [usize; D]) -> Result<Self> {
        let expected: usize = shape.iter().product();
        let [n, _] = displacement.dims();
        if n != expected {
            return Err(ImageError::LengthMismatch { expected, actual: n });
        }
        Ok(Self { displacement, shape })
    }

    pub fn zeros(shape: [usize; D], components: usize, device: &B::Device) -> Self {
        let n: usize = shape.iter().product();
        Self {
            displacement: Tensor::zeros([n, components], device),
            shape,
        }
    }

    pub fn displacement(&self) -> &Tensor<B, 2> {
        &self.displacement
    }

    pub fn into_displacement(self) -> Tensor<B, 2> {
        self.displacement
    }

    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    pub fn components(&self) -> usize {
        self.displacement.dims()[1]
    }

    /// Component `c` (0 = x) as an image-shaped tensor.
    pub fn component(&self, c: usize) -> Result<Tensor<B, D>> {
        let components = self.components();
        if c >= components {
            return Err(ImageError::IndexOutOfBounds { index: c, len: components });
        }
        Ok(self.displacement.clone().narrow(1, c, 1).reshape(self.shape))
    }

    /// Euclidean length of the displacement at every pixel.
    pub fn magnitude(&self) -> Tensor<B, D> {
        self.displacement
            .clone()
            .powf_scalar(2.0)
            .sum_dim(1)
            .sqrt()
            .reshape(self.shape)
    }

    /// Largest displacement length in pixels.
    pub fn max_norm(&self) -> f64 {
        self.magnitude().max().into_scalar().elem::<f64>()
    }

    /// Largest per-pixel distance `|u_self - u_other|`.
    pub fn max_difference(&self, other: &Self) -> Result<f64> {
        if self.shape != other.shape || self.components() != other.components() {
            return Err(ImageError::ShapeMismatch {
                expected: self.displacement.dims().to_vec(),
                actual: other.displacement.dims().to_vec(),
            });
        }
        let diff = (self.displacement.clone() - other.displacement.clone())
            .powf_scalar(2.0)
            .sum_dim(1)
            .sqrt()
            .max()
            .into_scalar()
            .elem::<f64>();
        Ok(diff)
    }
}

impl<B: Backend> DeformationField<B, 3> {
    /// Stack per-slice 2D fields along z into a volume field of `shape`.
    pub fn stack_z(slices: &[DeformationField<B, 2>], shape: [usize; 3]) -> Result<Self> {
        let [nz, ny, nx] = shape;
        if slices.len() != nz {
            return Err(ImageError::LengthMismatch {
                expected: nz,
                actual: slices.len(),
            });
        }
        for slice in slices {
            if slice.shape() != [ny, nx] {
                return Err(ImageError::ShapeMismatch {
                    expected: vec![ny, nx],
                    actual: slice.shape().to_vec(),
                });
            }
        }
        let parts = slices.iter().map(|s| s.displacement.clone()).collect();
        Self::new(Tensor::cat(parts, 0), shape)
    }
}
