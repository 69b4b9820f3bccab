//! Images, image series and index grids.

pub mod image;
pub mod series;
pub mod grid;

pub use image::Image;
pub use series::ImageSeries;
pub use grid::generate_grid;
