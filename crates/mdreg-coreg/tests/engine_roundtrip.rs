use burn::backend::Autodiff;
use burn::tensor::{Shape, Tensor, TensorData};
use burn_ndarray::NdArray;
use mdreg_core::Image;
use mdreg_coreg::{
    BSplineEngine, BSplineOptions, CoregConfig, CoregError, Coregistration, DiffeomorphicEngine,
    DiffeomorphicOptions, Engine, EngineTransform, OpticalFlowEngine, OpticalFlowOptions, Package,
    SimilarityMetric,
};

type B = Autodiff<NdArray<f32>>;

/// Route engine logs through the test harness; `RUST_LOG` narrows them.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mdreg_coreg=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

fn blob(shape: [usize; 2], cx: f32, cy: f32) -> Image<B, 2> {
    let [ny, nx] = shape;
    let data: Vec<f32> = (0..ny * nx)
        .map(|k| {
            let x = (k % nx) as f32 - cx;
            let y = (k / nx) as f32 - cy;
            200.0 * (-(x * x + y * y) / 18.0).exp()
        })
        .collect();
    let tensor = Tensor::from_data(TensorData::new(data, Shape::new(shape)), &Default::default());
    Image::from_tensor(tensor)
}

fn sum_squared_difference(a: &Image<B, 2>, b: &Image<B, 2>) -> f64 {
    let a = a.to_values().unwrap();
    let b = b.to_values().unwrap();
    a.iter().zip(&b).map(|(x, y)| ((x - y) as f64).powi(2)).sum()
}

fn max_abs_difference<const D: usize>(a: &Image<B, D>, b: &Image<B, D>) -> f32 {
    let a = a.to_values().unwrap();
    let b = b.to_values().unwrap();
    a.iter().zip(&b).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max)
}

fn check_engine(engine: &Engine) {
    init_tracing();
    let fixed = blob([16, 16], 8.0, 8.0);
    let moving = blob([16, 16], 9.0, 8.0);

    let result = engine.coregister(&moving, &fixed).unwrap();
    assert_eq!(result.image.shape(), [16, 16]);
    assert_eq!(result.deformation.shape(), [16, 16]);
    assert_eq!(result.deformation.components(), 2);

    let before = sum_squared_difference(&moving, &fixed);
    let after = sum_squared_difference(&result.image, &fixed);
    println!("{}: {:.3} -> {:.3}", Coregistration::<B, 2>::name(engine), before, after);
    assert!(after < before, "alignment did not improve: {} -> {}", before, after);

    let reapplied = engine.apply(&moving, &result.transform).unwrap();
    assert!(max_abs_difference(&reapplied, &result.image) < 1e-4);

    result.transform.cleanup().unwrap();
}

#[test]
fn test_bspline_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let options = BSplineOptions::default()
        .with_grid_spacing(6.0)
        .with_iterations(150)
        .with_learning_rate(0.05)
        .with_output_dir(dir.path());
    check_engine(&BSplineEngine::new(options).unwrap().into());
}

#[test]
fn test_optical_flow_roundtrip() {
    let options = OpticalFlowOptions::default().with_iterations(150).with_learning_rate(0.05);
    check_engine(&OpticalFlowEngine::new(options).unwrap().into());
}

#[test]
fn test_diffeomorphic_roundtrip() {
    let options = DiffeomorphicOptions::default().with_iterations(150);
    check_engine(&DiffeomorphicEngine::new(options).unwrap().into());
}

#[test]
fn test_diffeomorphic_cc_inverse() {
    let engine: Engine = DiffeomorphicEngine::new(
        DiffeomorphicOptions::default()
            .with_metric(SimilarityMetric::Cc)
            .with_iterations(50),
    )
    .unwrap()
    .into();
    let fixed = blob([12, 12], 6.0, 6.0);
    let moving = blob([12, 12], 7.0, 6.0);
    let result = engine.coregister(&moving, &fixed).unwrap();
    match &result.transform {
        EngineTransform::Diffeomorphic { forward, inverse } => {
            assert_eq!(forward.shape(), inverse.shape());
            assert_eq!(forward.max_difference(&result.deformation).unwrap(), 0.0);
            // Mean x displacement of forward and inverse have opposite signs
            let fx: f32 = forward.component(0).unwrap().mean().into_scalar();
            let ix: f32 = inverse.component(0).unwrap().mean().into_scalar();
            assert!(fx * ix <= 1e-6);
        }
        other => panic!("unexpected transform {}", other.kind()),
    }
}

#[test]
fn test_volume_roundtrip() {
    init_tracing();
    let device = Default::default();
    let data: Vec<f32> = (0..4 * 6 * 6).map(|k| ((k * 7) % 11) as f32).collect();
    let fixed = Image::<B, 3>::from_tensor(Tensor::from_data(TensorData::new(data.clone(), Shape::new([4, 6, 6])), &device));
    let shifted: Vec<f32> = data.iter().map(|v| v * 0.9 + 1.0).collect();
    let moving = Image::<B, 3>::from_tensor(Tensor::from_data(TensorData::new(shifted, Shape::new([4, 6, 6])), &device));

    let engine: Engine = OpticalFlowEngine::new(OpticalFlowOptions::default().with_iterations(10))
        .unwrap()
        .into();
    let result = engine.coregister(&moving, &fixed).unwrap();
    assert_eq!(result.deformation.shape(), [4, 6, 6]);
    assert_eq!(result.deformation.components(), 3);
    let reapplied = engine.apply(&moving, &result.transform).unwrap();
    assert!(max_abs_difference(&reapplied, &result.image) < 1e-4);
}

#[test]
fn test_engine_rejects_mismatched_inputs() {
    let engine = CoregConfig::new(Package::OpticalFlow).build_engine().unwrap();
    let fixed = blob([8, 8], 4.0, 4.0);
    let moving = blob([8, 9], 4.0, 4.0);
    assert!(matches!(
        engine.coregister(&moving, &fixed),
        Err(CoregError::ShapeMismatch { .. })
    ));

    let dir = tempfile::tempdir().unwrap();
    let bspline = CoregConfig::new(Package::Bspline)
        .with_bspline(BSplineOptions::default().with_iterations(3).with_output_dir(dir.path()))
        .build_engine()
        .unwrap();
    let result = bspline.coregister(&fixed, &fixed).unwrap();
    assert!(matches!(
        engine.apply(&fixed, &result.transform),
        Err(CoregError::TransformMismatch { engine: "optical_flow", transform: "bspline" })
    ));
    result.transform.cleanup().unwrap();
}
