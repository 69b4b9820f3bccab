use mdreg_core::{Image, ImageSeries};
use mdreg_fit::{FitOptions, ModelConfig, ModelFitter, PixelModel, SignalModel};
use burn::tensor::{Tensor, TensorData};
use burn_ndarray::NdArray;
use proptest::prelude::*;

type Backend = NdArray<f32>;

fn volume_series(frames: &[Vec<f32>], shape: [usize; 3]) -> ImageSeries<Backend, 3> {
    let device = Default::default();
    ImageSeries::new(
        frames
            .iter()
            .map(|v| Image::from_tensor(Tensor::from_data(TensorData::new(v.clone(), shape), &device)))
            .collect(),
    )
    .unwrap()
}

#[test]
fn test_spgr_volume_fit_keeps_shape() {
    let fa = vec![2.0, 5.0, 10.0, 15.0, 20.0];
    let tr = 0.005;
    let t1 = [0.5f64, 0.8, 1.0, 1.2, 1.5, 2.0, 2.5, 3.0];
    let frames: Vec<Vec<f32>> = fa
        .iter()
        .map(|&a: &f64| {
            let alpha = a.to_radians();
            t1.iter()
                .map(|&t| {
                    let e = (-tr / t).exp();
                    (800.0 * alpha.sin() * (1.0 - e) / (1.0 - alpha.cos() * e)) as f32
                })
                .collect()
        })
        .collect();
    let series = volume_series(&frames, [2, 2, 2]);

    let model = ModelConfig::SpgrVfaNonlin { fa, tr }.build().unwrap();
    let fit = ModelFitter::default().fit(&series, model.as_ref()).unwrap();

    assert_eq!(fit.fitted.len(), 5);
    assert_eq!(fit.fitted.shape(), [2, 2, 2]);
    let fitted_t1 = fit.parameters.get("T1").unwrap().to_values().unwrap();
    for (got, want) in fitted_t1.iter().zip(t1.iter()) {
        assert!(((*got as f64) - want).abs() / want < 1e-2, "T1 {} vs {}", got, want);
    }
}

#[test]
fn test_custom_model_fit() {
    let x = vec![0.0, 1.0, 2.0];
    let model = PixelModel::new("offset", x, |_, p| p[0], vec![0.0])
        .with_parameter_names(vec!["level".into()]);
    let series = volume_series(&[vec![1.0; 4], vec![2.0; 4], vec![3.0; 4]], [1, 2, 2]);
    let fit = ModelFitter::new(FitOptions::default().with_parallel(false))
        .fit(&series, &model)
        .unwrap();
    let level = fit.parameters.get("level").unwrap().to_values().unwrap();
    for v in level {
        assert!((v - 2.0).abs() < 1e-4);
    }
    assert_eq!(model.parameter_names(), vec!["level".to_string()]);
}

proptest! {
    #[test]
    fn test_constant_fit_preserves_temporal_mean(
        values in proptest::collection::vec(0.0f32..100.0, 12)
    ) {
        // 3 frames of a 1x2x2 volume
        let frames: Vec<Vec<f32>> = values.chunks(4).map(|c| c.to_vec()).collect();
        let series = volume_series(&frames, [1, 2, 2]);
        let fit = ModelFitter::default()
            .fit(&series, ModelConfig::Constant.build().unwrap().as_ref())
            .unwrap();
        let fitted = fit.fitted.frame(0).unwrap().to_values().unwrap();
        for p in 0..4 {
            let mean = (frames[0][p] as f64 + frames[1][p] as f64 + frames[2][p] as f64) / 3.0;
            prop_assert!((fitted[p] as f64 - mean).abs() < 1e-3);
        }
    }
}
