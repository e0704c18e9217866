// src/grid.rs
//
// Region (physical box) and the single-layer finite-difference grid that samples it.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Axis-aligned box between two corner points (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub p1: [f64; 3],
    pub p2: [f64; 3],
}

impl Region {
    pub fn new(p1: [f64; 3], p2: [f64; 3]) -> Result<Self> {
        for a in 0..3 {
            if !(p2[a] > p1[a]) {
                return Err(SimError::InvalidRegion(format!(
                    "p2[{a}]={} must exceed p1[{a}]={}",
                    p2[a], p1[a]
                )));
            }
        }
        Ok(Self { p1, p2 })
    }

    pub fn edges(&self) -> [f64; 3] {
        [
            self.p2[0] - self.p1[0],
            self.p2[1] - self.p1[1],
            self.p2[2] - self.p1[2],
        ]
    }

    /// Discretise the region into cells of size `cell`.
    ///
    /// Each edge must be an integer multiple of the cell size. Only single-layer
    /// films are supported, so the z edge must equal `cell[2]`.
    pub fn mesh(&self, cell: [f64; 3]) -> Result<Grid2D> {
        let edges = self.edges();
        let mut counts = [0usize; 3];
        for a in 0..3 {
            if !(cell[a] > 0.0) {
                return Err(SimError::InvalidMesh(format!(
                    "cell[{a}]={} must be positive",
                    cell[a]
                )));
            }
            let ratio = edges[a] / cell[a];
            let n = ratio.round();
            if n < 1.0 || (ratio - n).abs() > 1e-6 * n.max(1.0) {
                return Err(SimError::InvalidMesh(format!(
                    "edge {a} ({:.6e} m) is not a multiple of the cell size ({:.6e} m)",
                    edges[a], cell[a]
                )));
            }
            counts[a] = n as usize;
        }
        if counts[2] != 1 {
            return Err(SimError::InvalidMesh(format!(
                "only single-layer films are supported, got {} cells along z",
                counts[2]
            )));
        }
        Ok(Grid2D {
            nx: counts[0],
            ny: counts[1],
            dx: cell[0],
            dy: cell[1],
            dz: cell[2],
            origin: self.p1,
        })
    }
}

/// Single-layer 2D finite-difference grid. `dz` is the film thickness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid2D {
    pub nx: usize,
    pub ny: usize,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    /// Lower corner of the sampled region (metres).
    pub origin: [f64; 3],
}

impl Grid2D {
    /// Grid with its lower corner at the coordinate origin.
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            nx,
            ny,
            dx,
            dy,
            dz,
            origin: [0.0; 3],
        }
    }

    pub fn n_cells(&self) -> usize {
        self.nx * self.ny
    }

    pub fn cell_volume(&self) -> f64 {
        self.dx * self.dy * self.dz
    }

    /// Physical size (Lx, Ly, thickness).
    pub fn extent(&self) -> [f64; 3] {
        [self.nx as f64 * self.dx, self.ny as f64 * self.dy, self.dz]
    }

    /// Flat index of cell (i, j), x fastest.
    #[inline]
    pub fn idx(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.nx && j < self.ny);
        j * self.nx + i
    }

    /// Absolute coordinates of the centre of cell (i, j).
    #[inline]
    pub fn cell_center(&self, i: usize, j: usize) -> [f64; 3] {
        [
            self.origin[0] + (i as f64 + 0.5) * self.dx,
            self.origin[1] + (j as f64 + 0.5) * self.dy,
            self.origin[2] + 0.5 * self.dz,
        ]
    }

    pub fn same_shape(&self, other: &Grid2D) -> bool {
        self.nx == other.nx
            && self.ny == other.ny
            && self.dx == other.dx
            && self.dy == other.dy
            && self.dz == other.dz
    }
}
