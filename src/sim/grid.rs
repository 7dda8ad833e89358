// Fixed-size square grids with a one-cell halo

use na::DMatrix;
use serde::{Deserialize, Serialize};

use crate::{BoundaryMask, ScalarField, VectorField};

/// Dimensions of a simulation grid: `n` addressable cells per axis, surrounded
/// by a one-cell halo. Every per-cell array of a field is `(n + 2) x (n + 2)`
/// and indexed `(x, y)`; the interior is `1..=n` on both axes.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    n: usize,
}

impl Grid {
    pub fn new(n: usize) -> Self {
        debug_assert!(n >= 2, "grid needs at least two interior cells per axis");
        Grid { n }
    }

    /// Number of interior cells per axis
    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of cells per axis, halo included
    pub fn side(&self) -> usize {
        self.n + 2
    }

    pub fn scalar_field(&self) -> ScalarField {
        DMatrix::zeros(self.side(), self.side())
    }

    pub fn vector_field(&self) -> VectorField {
        [self.scalar_field(), self.scalar_field()]
    }

    pub fn boundary_mask(&self) -> BoundaryMask {
        DMatrix::from_element(self.side(), self.side(), false)
    }

    /// Whether `(x, y)` is an addressable interior cell
    pub fn contains(&self, x: usize, y: usize) -> bool {
        (1..=self.n).contains(&x) && (1..=self.n).contains(&y)
    }

    /// Iterate the interior cells row by row, yielding `(x, y)`.
    pub fn interior(&self) -> impl Iterator<Item = (usize, usize)> + use<> {
        let n = self.n;
        (1..=n).flat_map(move |y| (1..=n).map(move |x| (x, y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_include_halo() {
        let grid = Grid::new(8);

        assert_eq!(grid.scalar_field().shape(), (10, 10));
        assert_eq!(grid.boundary_mask().shape(), (10, 10));
        assert!(grid.vector_field().iter().all(|f| f.shape() == (10, 10)));
    }

    #[test]
    fn test_interior_excludes_halo() {
        let grid = Grid::new(4);
        let cells: Vec<(usize, usize)> = grid.interior().collect();

        assert_eq!(cells.len(), 16);
        assert!(cells.iter().all(|&(x, y)| grid.contains(x, y)));
        assert!(!grid.contains(0, 2));
        assert!(!grid.contains(5, 2));
        assert_eq!(cells[0], (1, 1));
        assert_eq!(cells[15], (4, 4));
    }
}
