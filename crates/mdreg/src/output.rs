//! Results of a motion-correction run.

use burn::tensor::backend::Backend;
use mdreg_coreg::EngineTransform;
use mdreg_core::{DeformationField, ImageSeries};
use mdreg_fit::ParameterMap;
use crate::error::Result;

/// Per-frame transforms of the final pass.
#[derive(Debug, Clone)]
pub enum FrameTransforms<B: Backend, const D: usize> {
    /// One transform per frame.
    Volume(Vec<EngineTransform<B, D>>),
    /// Slice-wise runs: `slices[z][frame]`.
    Slices(Vec<Vec<EngineTransform<B, 2>>>),
}

impl<B: Backend, const D: usize> FrameTransforms<B, D> {
    /// Remove every parameter file held by these transforms.
    pub fn cleanup(&self) -> Result<()> {
        match self {
            Self::Volume(transforms) => cleanup_all(transforms),
            Self::Slices(slices) => slices.iter().try_for_each(|t| cleanup_all(t)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Volume(transforms) => transforms.len(),
            Self::Slices(slices) => slices.iter().map(Vec::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub(crate) fn cleanup_all<B: Backend, const D: usize>(transforms: &[EngineTransform<B, D>]) -> Result<()> {
    for transform in transforms {
        transform.cleanup()?;
    }
    Ok(())
}

/// Final state of the alternating loop.
#[derive(Debug, Clone)]
pub struct MdregOutput<B: Backend, const D: usize> {
    /// Coregistered series.
    pub coreg: ImageSeries<B, D>,
    /// Model fit from the last pass.
    pub fit: ImageSeries<B, D>,
    pub parameters: ParameterMap<B, D>,
    /// One field per frame, when requested.
    pub deformation: Option<Vec<DeformationField<B, D>>>,
    /// Engine transforms, when requested. B-spline transforms keep their
    /// parameter files on disk until [`MdregOutput::cleanup`].
    pub transforms: Option<FrameTransforms<B, D>>,
    /// Passes performed.
    pub iterations: usize,
    /// Whether the deformation change fell below the precision.
    pub converged: bool,
}

impl<B: Backend, const D: usize> MdregOutput<B, D> {
    pub fn cleanup(&self) -> Result<()> {
        match &self.transforms {
            Some(transforms) => transforms.cleanup(),
            None => Ok(()),
        }
    }
}
