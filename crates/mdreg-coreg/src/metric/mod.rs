//! Similarity metrics between sampled fixed and warped moving intensities.

pub mod trait_;
pub mod mse;
pub mod ncc;
pub mod charbonnier;

pub use trait_::Metric;
pub use mse::MeanSquaredError;
pub use ncc::NormalizedCrossCorrelation;
pub use charbonnier::Charbonnier;
