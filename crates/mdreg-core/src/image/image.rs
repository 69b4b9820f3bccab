//! Image type with physical metadata.
//!
//! An [`Image`] pairs a tensor (slowest axis first, `[Z, Y, X]` or `[Y, X]`)
//! with the origin, spacing and direction that place it in physical space.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use crate::error::{ImageError, Result};
use crate::spatial::{Direction, Point, Spacing, Vector};

/// Medical image with physical metadata.
///
/// # Type Parameters
/// * `B` - The backend (CPU or GPU) for tensor operations
/// * `D` - The dimensionality of the image (2 or 3)
///
/// # Examples
/// ```rust
/// use mdreg_core::Image;
/// use mdreg_core::spatial::{Point2, Spacing2, Direction2};
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 2>::zeros([8, 10], &device);
/// let image = Image::new(data, Point2::origin(), Spacing2::uniform(1.0), Direction2::identity());
/// assert_eq!(image.shape(), [8, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create a new image with the given data and metadata.
    pub fn new(
        data: Tensor<B, D>,
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Self {
        Self {
            data,
            origin,
            spacing,
            direction,
        }
    }

    /// Image at the origin with unit spacing and identity orientation.
    pub fn from_tensor(data: Tensor<B, D>) -> Self {
        Self::new(data, Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    /// Build an image from a flat buffer in storage order, copying the
    /// metadata of `template`.
    pub fn from_values(values: Vec<f32>, template: &Image<B, D>) -> Result<Self> {
        let shape = template.shape();
        let expected: usize = shape.iter().product();
        if values.len() != expected {
            return Err(ImageError::LengthMismatch {
                expected,
                actual: values.len(),
            });
        }
        let device = template.data.device();
        let data = Tensor::<B, 1>::from_data(TensorData::new(values, [expected]), &device).reshape(shape);
        Ok(template.with_data(data))
    }

    /// Same metadata, new pixel data.
    pub fn with_data(&self, data: Tensor<B, D>) -> Self {
        Self::new(data, self.origin, self.spacing, self.direction)
    }

    /// Same pixel data, new spacing.
    pub fn with_spacing(mut self, spacing: Spacing<D>) -> Self {
        self.spacing = spacing;
        self
    }

    /// The pixel data tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    /// Consume the image and return its tensor.
    pub fn into_data(self) -> Tensor<B, D> {
        self.data
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Image shape, slowest axis first.
    pub fn shape(&self) -> [usize; D] {
        self.data.dims()
    }

    /// Total number of pixels/voxels.
    pub fn num_pixels(&self) -> usize {
        self.shape().iter().product()
    }

    /// Copy pixel values to the host in storage order.
    pub fn to_values(&self) -> Result<Vec<f32>> {
        self.data
            .clone()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| ImageError::Data(format!("{:?}", e)))
    }

    /// Map a continuous index (x first) to a physical point.
    ///
    /// `point = origin + Direction * (index * spacing)`
    pub fn index_to_physical(&self, index: [f64; D]) -> Point<D> {
        let scaled = Vector::new(std::array::from_fn(|i| index[i] * self.spacing[i]));
        self.origin + self.direction * scaled
    }
}

impl<B: Backend> Image<B, 3> {
    /// Extract the 2D image at slice `z`.
    ///
    /// The slice keeps the in-plane spacing and orientation; its origin is the
    /// in-plane position of voxel `(0, 0, z)`.
    pub fn slice_z(&self, z: usize) -> Result<Image<B, 2>> {
        let [nz, ny, nx] = self.shape();
        if z >= nz {
            return Err(ImageError::IndexOutOfBounds { index: z, len: nz });
        }
        let data = self.data.clone().slice([z..z + 1, 0..ny, 0..nx]).reshape([ny, nx]);
        let origin = self.index_to_physical([0.0, 0.0, z as f64]).in_plane();
        Ok(Image::new(
            data,
            origin,
            self.spacing.in_plane(),
            self.direction.in_plane(),
        ))
    }

    /// Stack 2D slices along z, taking the volume metadata from `template`.
    pub fn stack_z(slices: &[Image<B, 2>], template: &Image<B, 3>) -> Result<Image<B, 3>> {
        let [nz, ny, nx] = template.shape();
        if slices.len() != nz {
            return Err(ImageError::LengthMismatch {
                expected: nz,
                actual: slices.len(),
            });
        }
        let mut planes = Vec::with_capacity(nz);
        for slice in slices {
            if slice.shape() != [ny, nx] {
                return Err(ImageError::ShapeMismatch {
                    expected: vec![ny, nx],
                    actual: slice.shape().to_vec(),
                });
            }
            planes.push(slice.data().clone().unsqueeze_dim::<3>(0));
        }
        Ok(template.with_data(Tensor::cat(planes, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type Backend = NdArray<f32>;

    fn ramp_volume() -> Image<Backend, 3> {
        let device = Default::default();
        let values: Vec<f32> = (0..2 * 3 * 4).map(|v| v as f32).collect();
        let data = Tensor::<Backend, 1>::from_floats(values.as_slice(), &device).reshape([2, 3, 4]);
        Image::new(
            data,
            Point::new([10.0, 20.0, 30.0]),
            Spacing::new([1.0, 2.0, 3.0]),
            Direction::identity(),
        )
    }

    #[test]
    fn test_image_metadata() {
        let image = ramp_volume();
        assert_eq!(image.shape(), [2, 3, 4]);
        assert_eq!(image.num_pixels(), 24);
        let p = image.index_to_physical([1.0, 1.0, 1.0]);
        assert_eq!(p, Point::new([11.0, 22.0, 33.0]));
    }

    #[test]
    fn test_from_values_checks_length() {
        let image = ramp_volume();
        assert!(Image::from_values(vec![0.0; 24], &image).is_ok());
        let err = Image::from_values(vec![0.0; 5], &image).unwrap_err();
        assert!(matches!(err, ImageError::LengthMismatch { expected: 24, actual: 5 }));
    }

    #[test]
    fn test_slice_and_stack_roundtrip() {
        let image = ramp_volume();
        let slices: Vec<_> = (0..2).map(|z| image.slice_z(z).unwrap()).collect();
        assert_eq!(slices[1].shape(), [3, 4]);
        assert_eq!(slices[1].origin(), &Point::new([10.0, 20.0]));
        assert_eq!(slices[1].to_values().unwrap()[0], 12.0);

        let stacked = Image::stack_z(&slices, &image).unwrap();
        assert_eq!(stacked.to_values().unwrap(), image.to_values().unwrap());
        assert!(image.slice_z(2).is_err());
    }
}
