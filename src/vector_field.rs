// src/vector_field.rs

use crate::grid::Grid2D;
use crate::scalar_field::ScalarField2D;

/// Vector field defined on a 2D grid (magnetisation, effective induction, ...).
/// Each cell stores (vx, vy, vz).
#[derive(Debug, Clone)]
pub struct VectorField2D {
    pub grid: Grid2D,
    pub data: Vec<[f64; 3]>,
}

impl VectorField2D {
    /// Create a new field on the given grid, initialised along +z.
    pub fn new(grid: Grid2D) -> Self {
        let n = grid.n_cells();
        Self {
            grid,
            data: vec![[0.0, 0.0, 1.0]; n],
        }
    }

    /// Zero field on the given grid.
    pub fn zeros(grid: Grid2D) -> Self {
        Self {
            grid,
            data: vec![[0.0; 3]; grid.n_cells()],
        }
    }

    /// Sample `f` at every cell centre (absolute coordinates).
    pub fn from_fn<F>(grid: Grid2D, f: F) -> Self
    where
        F: Fn([f64; 3]) -> [f64; 3],
    {
        let mut data = Vec::with_capacity(grid.n_cells());
        for j in 0..grid.ny {
            for i in 0..grid.nx {
                data.push(f(grid.cell_center(i, j)));
            }
        }
        Self { grid, data }
    }

    pub fn set_uniform(&mut self, vx: f64, vy: f64, vz: f64) {
        for cell in &mut self.data {
            *cell = [vx, vy, vz];
        }
    }

    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        self.grid.idx(i, j)
    }

    /// One component (0=x, 1=y, 2=z) as a scalar field.
    pub fn component(&self, axis: usize) -> ScalarField2D {
        debug_assert!(axis < 3);
        ScalarField2D {
            grid: self.grid,
            data: self.data.iter().map(|v| v[axis]).collect(),
        }
    }

    /// Ms-weighted average over magnetic cells; vacuum (weight 0) is ignored.
    pub fn average(&self, ms: &[f64]) -> [f64; 3] {
        debug_assert_eq!(ms.len(), self.data.len());
        let mut s = [0.0; 3];
        let mut w_tot = 0.0;
        for (v, &w) in self.data.iter().zip(ms.iter()) {
            if w <= 0.0 {
                continue;
            }
            s[0] += w * v[0];
            s[1] += w * v[1];
            s[2] += w * v[2];
            w_tot += w;
        }
        if w_tot == 0.0 {
            return [0.0; 3];
        }
        [s[0] / w_tot, s[1] / w_tot, s[2] / w_tot]
    }

    /// Largest per-cell |a - b|.
    pub fn max_abs_diff(&self, other: &VectorField2D) -> f64 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| {
                let d = [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
                (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt()
            })
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_ignores_vacuum_cells() {
        let grid = Grid2D::new(3, 1, 1.0, 1.0, 1.0);
        let mut m = VectorField2D::new(grid);
        m.data[0] = [0.0, 0.0, 1.0];
        m.data[1] = [0.0, 0.0, -1.0];
        m.data[2] = [1.0, 0.0, 0.0];
        let ms = [1.0, 1.0, 0.0];
        let avg = m.average(&ms);
        assert_eq!(avg, [0.0, 0.0, 0.0]);

        let ms = [1.0, 0.0, 1.0];
        let avg = m.average(&ms);
        assert!((avg[0] - 0.5).abs() < 1e-15 && (avg[2] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn from_fn_samples_cell_centres() {
        let grid = Grid2D::new(4, 2, 1.0, 1.0, 1.0);
        let f = VectorField2D::from_fn(grid, |p| [p[0], p[1], 0.0]);
        assert_eq!(f.data[f.idx(3, 1)], [3.5, 1.5, 0.0]);
        assert_eq!(f.component(1).data[f.idx(0, 1)], 1.5);
    }
}
