//! Ordered image series sharing one spatial grid.
//!
//! A series is indexed by acquisition (time, flip angle, inversion time).
//! It is never modified in place; operations return a new series.

use burn::tensor::backend::Backend;
use crate::error::{ImageError, Result};
use crate::spatial::Spacing;
use super::Image;

/// Non-empty sequence of frames with identical shape.
#[derive(Debug, Clone)]
pub struct ImageSeries<B: Backend, const D: usize> {
    frames: Vec<Image<B, D>>,
}

impl<B: Backend, const D: usize> ImageSeries<B, D> {
    /// Build a series, checking that it is non-empty and that every frame
    /// has the shape of the first one.
    pub fn new(frames: Vec<Image<B, D>>) -> Result<Self> {
        let first = frames.first().ok_or(ImageError::EmptySeries)?;
        let shape = first.shape();
        for frame in &frames[1..] {
            if frame.shape() != shape {
                return Err(ImageError::ShapeMismatch {
                    expected: shape.to_vec(),
                    actual: frame.shape().to_vec(),
                });
            }
        }
        Ok(Self { frames })
    }

    /// Rebuild a series from pixel-major signals (`signals[p * T + t]`),
    /// copying per-frame metadata from `template`.
    pub fn from_signals(signals: &[f32], template: &ImageSeries<B, D>) -> Result<Self> {
        let n = template.num_pixels();
        let t = template.len();
        if signals.len() != n * t {
            return Err(ImageError::LengthMismatch {
                expected: n * t,
                actual: signals.len(),
            });
        }
        let frames = template
            .frames
            .iter()
            .enumerate()
            .map(|(k, frame)| {
                let values = (0..n).map(|p| signals[p * t + k]).collect();
                Image::from_values(values, frame)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Always false for a constructed series; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Image<B, D>] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Image<B, D>> {
        self.frames.get(index)
    }

    pub fn into_frames(self) -> Vec<Image<B, D>> {
        self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Image<B, D>> {
        self.frames.iter()
    }

    /// Spatial shape shared by all frames.
    pub fn shape(&self) -> [usize; D] {
        self.frames[0].shape()
    }

    pub fn num_pixels(&self) -> usize {
        self.frames[0].num_pixels()
    }

    /// Spacing of the first frame.
    pub fn spacing(&self) -> Spacing<D> {
        *self.frames[0].spacing()
    }

    /// Override the spacing of every frame.
    pub fn with_spacing(self, spacing: Spacing<D>) -> Self {
        Self {
            frames: self.frames.into_iter().map(|f| f.with_spacing(spacing)).collect(),
        }
    }

    /// Copy the series to the host as pixel-major signals
    /// (`signals[p * T + t]`), the layout used by pixel-wise fitting.
    pub fn to_signals(&self) -> Result<Vec<f32>> {
        let n = self.num_pixels();
        let t = self.len();
        let mut signals = vec![0.0f32; n * t];
        for (k, frame) in self.frames.iter().enumerate() {
            let values = frame.to_values()?;
            for (p, v) in values.into_iter().enumerate() {
                signals[p * t + k] = v;
            }
        }
        Ok(signals)
    }
}

impl<B: Backend> ImageSeries<B, 3> {
    pub fn num_slices(&self) -> usize {
        self.shape()[0]
    }

    /// The 2D series at slice `z` of every frame.
    pub fn slice_z(&self, z: usize) -> Result<ImageSeries<B, 2>> {
        let frames = self
            .frames
            .iter()
            .map(|f| f.slice_z(z))
            .collect::<Result<Vec<_>>>()?;
        ImageSeries::new(frames)
    }

    /// Reassemble per-slice series into a volume series shaped like `template`.
    pub fn stack_z(slices: &[ImageSeries<B, 2>], template: &ImageSeries<B, 3>) -> Result<Self> {
        let frames = template
            .frames
            .iter()
            .enumerate()
            .map(|(k, frame)| {
                let planes = slices
                    .iter()
                    .map(|s| {
                        s.frame(k).cloned().ok_or(ImageError::IndexOutOfBounds {
                            index: k,
                            len: s.len(),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Image::stack_z(&planes, frame)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { frames })
    }
}
