//! The alternating fit/coregister loop.

use std::time::Instant;
use burn::tensor::backend::{AutodiffBackend, Backend};
use mdreg_coreg::{Coregistration, Engine, EngineTransform, ProgressTracker};
use mdreg_core::spatial::Spacing;
use mdreg_core::{DeformationField, ImageSeries};
use mdreg_fit::{ModelFit, ModelFitter, SignalModel};
use crate::config::MdregConfig;
use crate::error::{MdregError, Result};
use crate::output::{cleanup_all, FrameTransforms, MdregOutput};

/// Outcome of the loop on one series, before output options are applied.
pub(crate) struct Pass<B: Backend, const D: usize> {
    pub coreg: ImageSeries<B, D>,
    pub fit: ModelFit<B, D>,
    pub deformations: Vec<DeformationField<B, D>>,
    pub transforms: Vec<EngineTransform<B, D>>,
    pub iterations: usize,
    pub converged: bool,
}

type Step<B, const D: usize> = (ModelFit<B, D>, Vec<DeformationField<B, D>>, Vec<EngineTransform<B, D>>);

/// Remove superseded parameter files, logging rather than failing.
pub(crate) fn discard<B: Backend, const D: usize>(transforms: &[EngineTransform<B, D>]) {
    if let Err(e) = cleanup_all(transforms) {
        tracing::warn!("failed to remove transform parameters: {}", e);
    }
}

/// Runs model-driven motion correction with one configuration.
#[derive(Debug)]
pub struct Driver {
    config: MdregConfig,
    engine: Engine,
    fitter: ModelFitter,
    tracker: ProgressTracker,
}

impl Driver {
    pub fn new(config: &MdregConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
            engine: config.coreg.build_engine()?,
            fitter: ModelFitter::new(config.fit.clone()),
            tracker: ProgressTracker::new("mdreg"),
        })
    }

    /// Report driver passes and engine optimisation to `tracker`'s callbacks.
    pub fn with_tracker(self, tracker: ProgressTracker) -> Self {
        let Self { config, engine, fitter, .. } = self;
        Self {
            config,
            engine: engine.with_tracker(tracker.clone()),
            fitter,
            tracker: tracker.with_stage("mdreg"),
        }
    }

    pub fn config(&self) -> &MdregConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Copy of the driver tracker reporting under `stage`.
    pub(crate) fn tracker_for(&self, stage: &str) -> ProgressTracker {
        self.tracker.with_stage(stage)
    }

    /// Correct `series` with the model named in the configuration.
    pub fn run_configured<B: AutodiffBackend, const D: usize>(
        &self,
        series: &ImageSeries<B, D>,
    ) -> Result<MdregOutput<B, D>> {
        let model = self.config.model.build()?;
        self.run(series, model.as_ref())
    }

    /// Correct `series` as a whole, in its own dimensionality.
    ///
    /// A volume series with `force_2d` set is rejected; slice-wise
    /// correction goes through [`run_volume`](Self::run_volume).
    pub fn run<B: AutodiffBackend, const D: usize>(
        &self,
        series: &ImageSeries<B, D>,
        model: &dyn SignalModel,
    ) -> Result<MdregOutput<B, D>> {
        if self.config.coreg.force_2d && D == 3 {
            return Err(MdregError::invalid_configuration(
                "force_2d applies to volume series; use run_volume or fit_volume",
            ));
        }
        self.run_whole(series, model)
    }

    fn run_whole<B: AutodiffBackend, const D: usize>(
        &self,
        series: &ImageSeries<B, D>,
        model: &dyn SignalModel,
    ) -> Result<MdregOutput<B, D>> {
        let series = self.prepare(series)?;
        let mut tracker = self.tracker_for("mdreg");
        tracker.start();
        let pass = self.iterate(&series, model, &tracker)?;
        tracker.complete(pass.iterations, if pass.converged { 1.0 } else { 0.0 });

        let transforms = if self.config.coreg.return_transform {
            Some(FrameTransforms::Volume(pass.transforms))
        } else {
            cleanup_all(&pass.transforms)?;
            None
        };
        Ok(MdregOutput {
            coreg: pass.coreg,
            fit: pass.fit.fitted,
            parameters: pass.fit.parameters,
            deformation: self.config.coreg.return_deformation.then_some(pass.deformations),
            transforms,
            iterations: pass.iterations,
            converged: pass.converged,
        })
    }

    /// Correct a volume series, slice by slice when `force_2d` is set.
    pub fn run_volume<B: AutodiffBackend>(
        &self,
        series: &ImageSeries<B, 3>,
        model: &dyn SignalModel,
    ) -> Result<MdregOutput<B, 3>> {
        if self.config.coreg.force_2d {
            self.run_slicewise(series, model)
        } else {
            self.run_whole(series, model)
        }
    }

    /// Apply the configured spacing override.
    pub(crate) fn prepare<B: Backend, const D: usize>(&self, series: &ImageSeries<B, D>) -> Result<ImageSeries<B, D>> {
        match &self.config.coreg.spacing {
            Some(values) => {
                let spacing = Spacing::<D>::from_slice(values).ok_or_else(|| {
                    MdregError::invalid_configuration(format!(
                        "spacing {:?} does not describe a {}D series",
                        values, D
                    ))
                })?;
                Ok(series.clone().with_spacing(spacing))
            }
            None => Ok(series.clone()),
        }
    }

    /// Fit the model to `current`, then align each frame of `original` to
    /// its fitted frame.
    fn step<B: AutodiffBackend, const D: usize>(
        &self,
        original: &ImageSeries<B, D>,
        current: &ImageSeries<B, D>,
        model: &dyn SignalModel,
    ) -> Result<(Step<B, D>, ImageSeries<B, D>)> {
        let fit = self.fitter.fit(current, model)?;
        let mut frames = Vec::with_capacity(original.len());
        let mut deformations = Vec::with_capacity(original.len());
        let mut transforms = Vec::with_capacity(original.len());
        for (k, (moving, fixed)) in original.iter().zip(fit.fitted.iter()).enumerate() {
            match self.engine.coregister(moving, fixed) {
                Ok(result) => {
                    frames.push(result.image);
                    deformations.push(result.deformation);
                    transforms.push(result.transform);
                }
                Err(e) => {
                    tracing::debug!(frame = k, "coregistration failed");
                    discard(&transforms);
                    return Err(e.into());
                }
            }
        }
        let coreg = ImageSeries::new(frames)?;
        Ok(((fit, deformations, transforms), coreg))
    }

    pub(crate) fn iterate<B: AutodiffBackend, const D: usize>(
        &self,
        original: &ImageSeries<B, D>,
        model: &dyn SignalModel,
        tracker: &ProgressTracker,
    ) -> Result<Pass<B, D>> {
        let controls = &self.config.driver;
        let start = Instant::now();
        let mut coreg = original.clone();
        let mut last: Option<Step<B, D>> = None;
        let mut iterations = 0;
        let mut converged = false;

        for iteration in 1..=controls.max_iterations {
            let (step, next) = match self.step(original, &coreg, model) {
                Ok(result) => result,
                Err(e) => {
                    if let Some((_, _, transforms)) = &last {
                        discard(transforms);
                    }
                    return Err(e);
                }
            };
            coreg = next;
            iterations = iteration;

            let change = match &last {
                Some((_, previous, _)) => Some(max_change(previous, &step.1)?),
                None => None,
            };
            if let Some((_, _, transforms)) = &last {
                discard(transforms);
            }
            let max_displacement = step.1.iter().map(|d| d.max_norm()).fold(0.0, f64::max);
            tracing::info!(
                iteration,
                change = ?change,
                max_displacement,
                elapsed = ?start.elapsed(),
                "mdreg pass complete"
            );
            tracker.update_with_metrics(
                iteration,
                Some(controls.max_iterations),
                change.unwrap_or(max_displacement),
                vec![("max_displacement".to_string(), max_displacement)],
            );

            last = Some(step);
            if controls.precision > 0.0 && change.is_some_and(|c| c < controls.precision) {
                converged = true;
                break;
            }
        }

        let (fit, deformations, transforms) =
            last.ok_or_else(|| MdregError::invalid_configuration("max_iterations must be at least 1"))?;
        Ok(Pass {
            coreg,
            fit,
            deformations,
            transforms,
            iterations,
            converged,
        })
    }
}

/// Largest per-pixel change between two sets of frame deformations.
fn max_change<B: Backend, const D: usize>(
    previous: &[DeformationField<B, D>],
    current: &[DeformationField<B, D>],
) -> Result<f64> {
    let mut change = 0.0f64;
    for (old, new) in previous.iter().zip(current) {
        change = change.max(new.max_difference(old)?);
    }
    Ok(change)
}

/// Correct `series` with `model`.
pub fn fit_series<B: AutodiffBackend, const D: usize>(
    series: &ImageSeries<B, D>,
    model: &dyn SignalModel,
    config: &MdregConfig,
) -> Result<MdregOutput<B, D>> {
    Driver::new(config)?.run(series, model)
}

/// Correct a volume series, honouring `force_2d`.
pub fn fit_volume<B: AutodiffBackend>(
    series: &ImageSeries<B, 3>,
    model: &dyn SignalModel,
    config: &MdregConfig,
) -> Result<MdregOutput<B, 3>> {
    Driver::new(config)?.run_volume(series, model)
}
