//! Per-pixel goodness of fit.

use burn::tensor::backend::Backend;
use mdreg_core::{Image, ImageError, ImageSeries};
use crate::error::Result;

fn paired_signals<B: Backend, const D: usize>(
    data: &ImageSeries<B, D>,
    fit: &ImageSeries<B, D>,
) -> Result<(Vec<f32>, Vec<f32>)> {
    if data.shape() != fit.shape() {
        return Err(ImageError::ShapeMismatch {
            expected: data.shape().to_vec(),
            actual: fit.shape().to_vec(),
        }
        .into());
    }
    if data.len() != fit.len() {
        return Err(ImageError::LengthMismatch {
            expected: data.len(),
            actual: fit.len(),
        }
        .into());
    }
    Ok((data.to_signals()?, fit.to_signals()?))
}

fn per_pixel<B: Backend, const D: usize>(
    data: &ImageSeries<B, D>,
    fit: &ImageSeries<B, D>,
    reduce: impl Fn(&[f32], &[f32]) -> f32,
) -> Result<Image<B, D>> {
    let (observed, expected) = paired_signals(data, fit)?;
    let t = data.len();
    let values = observed
        .chunks_exact(t)
        .zip(expected.chunks_exact(t))
        .map(|(o, e)| reduce(o, e))
        .collect();
    let template = &data.frames()[0];
    Ok(Image::from_values(values, template)?)
}

/// Pearson chi-squared `sum_t (fit - data)^2 / data`. Frames where the
/// data is zero contribute nothing.
pub fn chi_squared<B: Backend, const D: usize>(
    data: &ImageSeries<B, D>,
    fit: &ImageSeries<B, D>,
) -> Result<Image<B, D>> {
    per_pixel(data, fit, |observed, expected| {
        observed
            .iter()
            .zip(expected)
            .filter(|(o, _)| **o != 0.0)
            .map(|(o, e)| (e - o) * (e - o) / o)
            .sum()
    })
}

/// Root-mean-square residual over the series.
pub fn residual_rms<B: Backend, const D: usize>(
    data: &ImageSeries<B, D>,
    fit: &ImageSeries<B, D>,
) -> Result<Image<B, D>> {
    per_pixel(data, fit, |observed, expected| {
        let sum: f32 = observed.iter().zip(expected).map(|(o, e)| (e - o) * (e - o)).sum();
        (sum / observed.len() as f32).sqrt()
    })
}
