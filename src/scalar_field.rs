// src/scalar_field.rs

use crate::grid::Grid2D;

/// Scalar field on a 2D grid (Ms maps, imaging signals, ...).
#[derive(Debug, Clone)]
pub struct ScalarField2D {
    pub grid: Grid2D,
    pub data: Vec<f64>,
}

impl ScalarField2D {
    pub fn zeros(grid: Grid2D) -> Self {
        Self {
            grid,
            data: vec![0.0; grid.n_cells()],
        }
    }

    /// Sample `f` at every cell centre (absolute coordinates).
    pub fn from_fn<F>(grid: Grid2D, f: F) -> Self
    where
        F: Fn([f64; 3]) -> f64,
    {
        let mut data = Vec::with_capacity(grid.n_cells());
        for j in 0..grid.ny {
            for i in 0..grid.nx {
                data.push(f(grid.cell_center(i, j)));
            }
        }
        Self { grid, data }
    }

    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        self.grid.idx(i, j)
    }

    /// (min, max) over finite values; `None` if there are none.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for &v in &self.data {
            if v.is_finite() {
                lo = lo.min(v);
                hi = hi.max(v);
            }
        }
        if lo.is_finite() && hi.is_finite() {
            Some((lo, hi))
        } else {
            None
        }
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |acc, v| acc.max(v.abs()))
    }
}
