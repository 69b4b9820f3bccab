//! Smoothness penalties for displacement, velocity and coefficient fields.
//!
//! Fields are `[N, C]` tensors laid out on a grid of shape `[.., Y, X]`
//! (slowest axis first). Finite differences are taken along each grid axis
//! without reshaping to a rank-specific layout, so the same code serves 2D
//! and 3D fields.
//!
//! * **DiffusionRegularizer**: first-order smoothness (membrane energy)
//! * **TotalVariationRegularizer**: L1 norm of gradients (edge-preserving)
//! * **BendingEnergyRegularizer**: thin-plate second-order smoothness

pub mod trait_;
pub mod diffusion;
pub mod total_variation;
pub mod bending_energy;

pub use trait_::Regularizer;
pub use diffusion::DiffusionRegularizer;
pub use total_variation::TotalVariationRegularizer;
pub use bending_energy::BendingEnergyRegularizer;
