//! Slice-by-slice correction of volume series.
//!
//! Each z-slice runs its own alternating loop with the same settings; the
//! per-slice results are stacked back into volumes. Deformations keep two
//! in-plane components.

use burn::tensor::backend::AutodiffBackend;
use mdreg_core::{DeformationField, Image, ImageSeries};
use mdreg_fit::{ParameterMap, SignalModel};
use crate::config::MdregConfig;
use crate::driver::{discard, Driver, Pass};
use crate::error::Result;
use crate::output::{FrameTransforms, MdregOutput};

impl Driver {
    /// Correct every z-slice of `series` independently.
    pub fn run_slicewise<B: AutodiffBackend>(
        &self,
        series: &ImageSeries<B, 3>,
        model: &dyn SignalModel,
    ) -> Result<MdregOutput<B, 3>> {
        let volume = self.prepare(series)?;
        let shape = volume.shape();
        let mut tracker = self.tracker_for("mdreg_slicewise");
        tracker.start();

        let mut passes: Vec<Pass<B, 2>> = Vec::with_capacity(shape[0]);
        for z in 0..shape[0] {
            let slice = volume.slice_z(z)?;
            match self.iterate(&slice, model, &tracker) {
                Ok(pass) => {
                    tracing::debug!(slice = z, iterations = pass.iterations, "slice corrected");
                    passes.push(pass);
                }
                Err(e) => {
                    for pass in &passes {
                        discard(&pass.transforms);
                    }
                    return Err(e);
                }
            }
        }

        let coreg_slices: Vec<_> = passes.iter().map(|p| p.coreg.clone()).collect();
        let fit_slices: Vec<_> = passes.iter().map(|p| p.fit.fitted.clone()).collect();
        let coreg = ImageSeries::stack_z(&coreg_slices, &volume)?;
        let fit = ImageSeries::stack_z(&fit_slices, &volume)?;
        let parameters = stack_parameters(&passes, &volume)?;

        let deformation = if self.config().coreg.return_deformation {
            let fields = (0..volume.len())
                .map(|k| {
                    let planes: Vec<DeformationField<B, 2>> =
                        passes.iter().map(|p| p.deformations[k].clone()).collect();
                    DeformationField::stack_z(&planes, shape)
                })
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Some(fields)
        } else {
            None
        };

        let iterations = passes.iter().map(|p| p.iterations).max().unwrap_or(0);
        let converged = passes.iter().all(|p| p.converged);
        tracker.complete(iterations, if converged { 1.0 } else { 0.0 });

        let transforms: Vec<_> = passes.into_iter().map(|p| p.transforms).collect();
        let transforms = if self.config().coreg.return_transform {
            Some(FrameTransforms::Slices(transforms))
        } else {
            let transforms: FrameTransforms<B, 3> = FrameTransforms::Slices(transforms);
            transforms.cleanup()?;
            None
        };

        Ok(MdregOutput {
            coreg,
            fit,
            parameters,
            deformation,
            transforms,
            iterations,
            converged,
        })
    }
}

/// Stack per-slice parameter maps into volumes shaped like `volume`.
fn stack_parameters<B: AutodiffBackend>(
    passes: &[Pass<B, 2>],
    volume: &ImageSeries<B, 3>,
) -> Result<ParameterMap<B, 3>> {
    let template = &volume.frames()[0];
    let names = passes
        .first()
        .map(|p| p.fit.parameters.names().to_vec())
        .unwrap_or_default();
    let maps = (0..names.len())
        .map(|i| {
            let planes: Vec<Image<B, 2>> = passes.iter().map(|p| p.fit.parameters.maps()[i].clone()).collect();
            Image::stack_z(&planes, template)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ParameterMap::new(names, maps))
}

/// Correct every z-slice of `series` independently with `config`.
pub fn fit_series_slicewise<B: AutodiffBackend>(
    series: &ImageSeries<B, 3>,
    model: &dyn SignalModel,
    config: &MdregConfig,
) -> Result<MdregOutput<B, 3>> {
    Driver::new(config)?.run_slicewise(series, model)
}
