//! Physical distance between adjacent pixels/voxels.

use super::Vector;

/// Spacing between adjacent pixels/voxels along each axis (x first).
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Same spacing along every axis.
    pub fn uniform(value: f64) -> Self {
        Vector::new([value; D])
    }

    /// Build spacing from a slice, e.g. a user supplied `spacing` option.
    ///
    /// Returns `None` when the slice length does not match `D` or a value is
    /// not strictly positive.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        if values.len() != D || values.iter().any(|v| *v <= 0.0 || !v.is_finite()) {
            return None;
        }
        Some(Vector::new(std::array::from_fn(|i| values[i])))
    }

    /// Smallest spacing component.
    pub fn min_spacing(&self) -> f64 {
        (0..D).map(|i| self[i]).fold(f64::INFINITY, f64::min)
    }

    /// Keep the in-plane (x, y) spacing of a 3D spacing.
    pub fn in_plane(&self) -> Spacing<2> {
        Vector::new([self[0], self[1]])
    }
}
