//! Core types for model-driven motion correction.
//!
//! Images and image series carry `burn` tensors together with their
//! physical metadata; transforms and deformation fields describe how a
//! moving frame maps onto a fixed one.

pub mod error;
pub mod image;
pub mod spatial;
pub mod transform;
pub mod interpolation;

pub use error::{ImageError, Result};
pub use image::{Image, ImageSeries};
pub use spatial::{Point, Vector, Spacing, Direction};
pub use transform::DeformationField;
