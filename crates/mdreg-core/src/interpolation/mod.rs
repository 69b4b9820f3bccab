//! Interpolation of tensors at continuous indices, and image warping.

pub mod trait_;
pub mod linear;
pub mod warp;

pub use trait_::Interpolator;
pub use linear::LinearInterpolator;
pub use warp::{warp_image, warp_field};
