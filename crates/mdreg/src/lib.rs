//! Model-driven motion correction.
//!
//! The driver alternates two steps on an image series: fit a signal model
//! to the current series, then coregister every original frame to its
//! fitted frame. Because the fitted series carries no motion, repeated
//! passes pull the frames onto a common grid without having to pick a
//! reference frame.
//!
//! ```no_run
//! use burn::backend::Autodiff;
//! use burn_ndarray::NdArray;
//! use mdreg::{Driver, MdregConfig};
//! # fn series() -> mdreg_core::ImageSeries<Autodiff<NdArray<f32>>, 2> { unimplemented!() }
//!
//! let config = MdregConfig::from_toml_str(r#"
//!     [model]
//!     func = "exp_decay"
//!     te = [5.0, 15.0, 30.0, 60.0]
//!
//!     [coreg]
//!     package = "optical_flow"
//! "#)?;
//! let output = Driver::new(&config)?.run_configured(&series())?;
//! println!("{} iterations, converged: {}", output.iterations, output.converged);
//! output.cleanup()?;
//! # Ok::<(), mdreg::MdregError>(())
//! ```

pub mod error;
pub mod config;
pub mod driver;
pub mod slicewise;
pub mod output;
pub mod goodness;

pub use error::{MdregError, Result};
pub use config::{DriverConfig, MdregConfig};
pub use driver::{fit_series, fit_volume, Driver};
pub use slicewise::fit_series_slicewise;
pub use output::{FrameTransforms, MdregOutput};
