//! Spatial transforms and dense deformation fields.
//!
//! Trainable transforms (`BSplineTransform`, `DisplacementFieldTransform`,
//! `VelocityField`) are burn modules optimised by the coregistration
//! engines; `DeformationField` is the plain per-pixel result handed back to
//! callers.

pub mod trait_;
pub mod bspline;
pub mod displacement_field;
pub mod velocity;
pub mod deformation;

pub use trait_::Transform;
pub use bspline::{BSplineParameters, BSplineTransform};
pub use displacement_field::DisplacementFieldTransform;
pub use velocity::VelocityField;
pub use deformation::DeformationField;
