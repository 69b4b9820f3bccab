use anyhow::Result;
use burn::backend::Autodiff;
use burn::tensor::{Shape, Tensor, TensorData};
use burn_ndarray::NdArray;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use mdreg::{goodness, Driver, DriverConfig, MdregConfig};
use mdreg_core::{Image, ImageSeries};
use mdreg_coreg::{CoregConfig, Package, ProgressCallback, ProgressInfo, ProgressTracker};
use mdreg_fit::{ModelConfig, ModelFitter};

type Backend = Autodiff<NdArray<f32>>;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Developer tasks for mdreg")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run motion correction on a synthetic moving phantom
    Demo {
        /// Coregistration engine (bspline, optical_flow, diffeomorphic or
        /// their package aliases)
        #[arg(short, long, default_value = "optical_flow")]
        package: String,

        /// Number of frames
        #[arg(short, long, default_value_t = 8)]
        frames: usize,

        /// Image size in pixels
        #[arg(short, long, default_value_t = 32)]
        size: usize,

        /// Maximum number of fit/coregister passes
        #[arg(short, long, default_value_t = 3)]
        iterations: usize,

        /// TOML configuration; overrides the options above except the data
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// List the built-in signal models
    Models,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            package,
            frames,
            size,
            iterations,
            config,
        } => {
            demo(&package, frames, size, iterations, config)?;
        }
        Commands::Models => {
            list_models();
        }
    }

    Ok(())
}

/// Echo times of the phantom, in milliseconds.
fn echo_times(frames: usize) -> Vec<f64> {
    (0..frames).map(|t| 5.0 + 10.0 * t as f64).collect()
}

/// Mono-exponential decay of a disc whose centre moves on a circle.
fn phantom(frames: usize, size: usize) -> Result<ImageSeries<Backend, 2>> {
    let device = Default::default();
    let te = echo_times(frames);
    let radius = size as f64 / 4.0;
    let images = te
        .iter()
        .enumerate()
        .map(|(t, te)| {
            let phase = 2.0 * std::f64::consts::PI * t as f64 / frames as f64;
            let cx = size as f64 / 2.0 + 1.5 * phase.cos();
            let cy = size as f64 / 2.0 + 1.5 * phase.sin();
            let values: Vec<f32> = (0..size * size)
                .map(|k| {
                    let x = (k % size) as f64 - cx;
                    let y = (k / size) as f64 - cy;
                    let inside = 1.0 / (1.0 + ((x * x + y * y).sqrt() - radius).exp());
                    let t2 = 40.0 + 40.0 * (k % size) as f64 / size as f64;
                    (10.0 + 500.0 * inside * (-te / t2).exp()) as f32
                })
                .collect();
            let data = Tensor::from_data(TensorData::new(values, Shape::new([size, size])), &device);
            Image::from_tensor(data)
        })
        .collect();
    Ok(ImageSeries::new(images)?)
}

/// Drives a progress bar from the driver's pass reports.
struct PassProgress {
    bar: ProgressBar,
}

impl ProgressCallback for PassProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.stage == "mdreg" {
            self.bar.set_position(info.iteration as u64);
            self.bar.set_message(format!("change {:.3} px", info.value));
        }
    }

    fn on_complete(&self, info: &ProgressInfo) {
        if info.stage == "mdreg" {
            self.bar.finish_with_message(format!("{} passes", info.iteration));
        }
    }
}

fn mean(image: &Image<Backend, 2>) -> Result<f64> {
    let values = image.to_values()?;
    Ok(values.iter().map(|&v| v as f64).sum::<f64>() / values.len().max(1) as f64)
}

fn demo(package: &str, frames: usize, size: usize, iterations: usize, config: Option<PathBuf>) -> Result<()> {
    let config = match config {
        Some(path) => MdregConfig::from_file(&path)?,
        None => MdregConfig::default()
            .with_model(ModelConfig::ExpDecay { te: echo_times(frames) })
            .with_coreg(CoregConfig::new(package.parse::<Package>()?).with_return_deformation(true))
            .with_driver(DriverConfig::default().with_max_iterations(iterations)),
    };
    info!("Running {} demo on {} frames of {}x{}", config.coreg.package, frames, size, size);

    let series = phantom(frames, size)?;
    let model = config.model.build()?;

    let bar = ProgressBar::new(config.driver.max_iterations as u64);
    bar.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?);
    let mut tracker = ProgressTracker::new("demo");
    tracker.add_callback(Arc::new(PassProgress { bar }));

    let driver = Driver::new(&config)?.with_tracker(tracker);
    let output = driver.run(&series, model.as_ref())?;

    let uncorrected = ModelFitter::new(config.fit.clone()).fit(&series, model.as_ref())?;
    let chi2_before = mean(&goodness::chi_squared(&series, &uncorrected.fitted)?)?;
    let chi2_after = mean(&goodness::chi_squared(&output.coreg, &output.fit)?)?;

    println!("Passes:            {}", output.iterations);
    println!("Converged:         {}", output.converged);
    if let Some(deformation) = &output.deformation {
        let max = deformation.iter().map(|d| d.max_norm()).fold(0.0, f64::max);
        println!("Max deformation:   {:.3} px", max);
    }
    println!("Mean chi-squared:  {:.3} -> {:.3}", chi2_before, chi2_after);
    for (name, map) in output.parameters.iter() {
        println!("Mean {:<12} {:.3}", format!("{}:", name), mean(map)?);
    }

    output.cleanup()?;
    Ok(())
}

fn list_models() {
    println!("Built-in signal models (the `func` field of [model]):");
    println!();
    println!("  constant             - temporal mean, no inputs");
    println!("  exp_decay            - S0 exp(-TE/T), inputs: te");
    println!("  exp_recovery_2p      - S0 (1 - exp(-TI/T1)), inputs: ti");
    println!("  abs_exp_recovery_2p  - |S0 (1 - 2 exp(-TI/T1))|, inputs: ti");
    println!("  spgr_vfa_lin         - linearised variable flip angle SPGR, inputs: fa, tr");
    println!("  spgr_vfa_nonlin      - variable flip angle SPGR, inputs: fa, tr");
    println!();
    println!("Accepted names: {}", ModelConfig::NAMES.join(", "));
}
