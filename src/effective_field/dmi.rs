// src/effective_field/dmi.rs
//
// Interfacial (Néel-type, C∞v with z normal) Dzyaloshinskii–Moriya interaction.
//
// Energy density:
//   w_DMI = D [ m_z (∇·m) - (m · ∇) m_z ]
//
// Effective field:
//   B_DMI = (2D / M_s) * ( ∂x m_z, ∂y m_z, -(∂x m_x + ∂y m_y) )
//
// Derivatives are central where both neighbours are magnetic, one-sided next to
// vacuum or a grid edge, and zero when a cell has no magnetic neighbour on that axis.

use crate::grid::Grid2D;
use crate::params::Material;
use crate::vector_field::VectorField2D;

/// d/ds of component `c` at `idx` given optional lower/upper neighbours.
#[inline]
fn diff(
    m: &VectorField2D,
    idx: usize,
    lo: Option<usize>,
    hi: Option<usize>,
    c: usize,
    h: f64,
) -> f64 {
    match (lo, hi) {
        (Some(l), Some(u)) => (m.data[u][c] - m.data[l][c]) / (2.0 * h),
        (None, Some(u)) => (m.data[u][c] - m.data[idx][c]) / h,
        (Some(l), None) => (m.data[idx][c] - m.data[l][c]) / h,
        (None, None) => 0.0,
    }
}

pub fn add_dmi_field(grid: &Grid2D, m: &VectorField2D, b_eff: &mut VectorField2D, mat: &Material) {
    let d = match mat.dmi {
        Some(d) if d != 0.0 => d,
        _ => return,
    };

    let nx = grid.nx;
    let ny = grid.ny;
    let magnetic = |k: usize| mat.ms[k] > 0.0;

    for j in 0..ny {
        for i in 0..nx {
            let idx = grid.idx(i, j);
            let ms = mat.ms[idx];
            if ms <= 0.0 {
                continue;
            }

            let left = if i > 0 && magnetic(idx - 1) { Some(idx - 1) } else { None };
            let right = if i + 1 < nx && magnetic(idx + 1) { Some(idx + 1) } else { None };
            let down = if j > 0 && magnetic(idx - nx) { Some(idx - nx) } else { None };
            let up = if j + 1 < ny && magnetic(idx + nx) { Some(idx + nx) } else { None };

            let dmz_dx = diff(m, idx, left, right, 2, grid.dx);
            let dmz_dy = diff(m, idx, down, up, 2, grid.dy);
            let dmx_dx = diff(m, idx, left, right, 0, grid.dx);
            let dmy_dy = diff(m, idx, down, up, 1, grid.dy);

            let prefactor = 2.0 * d / ms;
            let b = &mut b_eff.data[idx];
            b[0] += prefactor * dmz_dx;
            b[1] += prefactor * dmz_dy;
            b[2] -= prefactor * (dmx_dx + dmy_dy);
        }
    }
}
