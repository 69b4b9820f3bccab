//! Direction cosine matrix describing image orientation.

use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};

/// Direction matrix; column `i` is the physical direction of image axis `x_i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

impl<const D: usize> Direction<D> {
    /// Identity orientation.
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    /// Try to compute the inverse matrix.
    pub fn try_inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Upper-left 2x2 block, the in-plane orientation of a 3D direction.
    pub fn in_plane(&self) -> Direction<2> {
        Direction(SMatrix::<f64, 2, 2>::new(
            self.0[(0, 0)], self.0[(0, 1)],
            self.0[(1, 0)], self.0[(1, 1)],
        ))
    }
}

impl<const D: usize> std::ops::Mul<super::Vector<D>> for Direction<D> {
    type Output = super::Vector<D>;

    fn mul(self, rhs: super::Vector<D>) -> Self::Output {
        super::Vector(self.0 * rhs.0)
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_inverse() {
        let d = Direction::<3>::identity();
        assert_eq!(d.try_inverse(), Some(d));
        assert_eq!(d.in_plane(), Direction::<2>::identity());
    }
}
