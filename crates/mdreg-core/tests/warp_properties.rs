use mdreg_core::image::{Image, ImageSeries};
use mdreg_core::interpolation::warp_image;
use mdreg_core::transform::{BSplineTransform, DeformationField};
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use proptest::prelude::*;

type Backend = NdArray<f32>;

fn ramp(ny: usize, nx: usize) -> Image<Backend, 2> {
    let device = Default::default();
    let values: Vec<f32> = (0..ny * nx).map(|i| (i % nx) as f32).collect();
    Image::from_tensor(Tensor::from_data(TensorData::new(values, [ny, nx]), &device))
}

proptest! {
    #[test]
    fn test_uniform_shift_of_x_ramp(
        ny in 2usize..6, nx in 4usize..10, shift in 0.0f32..1.0
    ) {
        let device = Default::default();
        let image = ramp(ny, nx);
        let displacement = Tensor::<Backend, 2>::zeros([ny * nx, 2], &device)
            + Tensor::<Backend, 2>::from_floats([[shift, 0.0]], &device);
        let warped = warp_image(&image, displacement).to_values().unwrap();

        // Interior pixels of a linear ramp move by exactly the shift.
        for y in 0..ny {
            for x in 0..nx - 1 {
                let v = warped[y * nx + x];
                prop_assert!((v - (x as f32 + shift)).abs() < 1e-4);
            }
        }
    }

    #[test]
    fn test_bspline_constant_coefficients_are_a_translation(
        tx in -3.0f32..3.0, ty in -3.0f32..3.0, grid in 2.0f64..8.0
    ) {
        let device = Default::default();
        let identity = BSplineTransform::<Backend, 2>::identity([9, 11], [1.0, 1.0], [grid, grid], &device);
        let [n, _] = identity.coefficients().dims();
        let coefficients = Tensor::<Backend, 2>::zeros([n, 2], &device)
            + Tensor::<Backend, 2>::from_floats([[tx, ty]], &device);
        let transform = BSplineTransform::new(identity.grid_size(), identity.grid_spacing(), coefficients);

        let field = DeformationField::new(transform.dense_displacement([9, 11], [1.0, 1.0]), [9, 11]).unwrap();
        let expected = (tx * tx + ty * ty).sqrt() as f64;
        prop_assert!((field.max_norm() - expected).abs() < 1e-3);
    }

    #[test]
    fn test_signals_roundtrip(frames in 1usize..5, ny in 1usize..4, nx in 1usize..4) {
        let device = Default::default();
        let series = ImageSeries::new(
            (0..frames)
                .map(|k| Image::from_tensor(Tensor::<Backend, 2>::ones([ny, nx], &device).mul_scalar(k as f32)))
                .collect(),
        )
        .unwrap();
        let signals = series.to_signals().unwrap();
        let rebuilt = ImageSeries::from_signals(&signals, &series).unwrap();
        prop_assert_eq!(rebuilt.to_signals().unwrap(), signals);
    }
}
