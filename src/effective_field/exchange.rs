// src/effective_field/exchange.rs
//
// Exchange field from the 5-point Laplacian.
//
//   B_ex,i = (2 A / Ms_i) Σ_j (m_j - m_i) / d_ij^2
//
// The sum runs over magnetic neighbours only, so grid edges and vacuum
// cells behave as free (Neumann) surfaces.

use crate::grid::Grid2D;
use crate::params::Material;
use crate::vector_field::VectorField2D;

pub fn add_exchange_field(grid: &Grid2D, m: &VectorField2D, b_eff: &mut VectorField2D, mat: &Material) {
    let a_ex = mat.a_ex;
    if a_ex == 0.0 {
        return;
    }

    let nx = grid.nx;
    let ny = grid.ny;
    let inv_dx2 = 1.0 / (grid.dx * grid.dx);
    let inv_dy2 = 1.0 / (grid.dy * grid.dy);

    for j in 0..ny {
        for i in 0..nx {
            let idx = grid.idx(i, j);
            let ms = mat.ms[idx];
            if ms <= 0.0 {
                continue;
            }
            let mi = m.data[idx];
            let mut lap = [0.0_f64; 3];

            let mut accumulate = |nb: usize, w: f64| {
                if mat.ms[nb] > 0.0 {
                    let mj = m.data[nb];
                    lap[0] += w * (mj[0] - mi[0]);
                    lap[1] += w * (mj[1] - mi[1]);
                    lap[2] += w * (mj[2] - mi[2]);
                }
            };

            if i > 0 {
                accumulate(idx - 1, inv_dx2);
            }
            if i + 1 < nx {
                accumulate(idx + 1, inv_dx2);
            }
            if j > 0 {
                accumulate(idx - nx, inv_dy2);
            }
            if j + 1 < ny {
                accumulate(idx + nx, inv_dy2);
            }

            let coeff = 2.0 * a_ex / ms;
            let b = &mut b_eff.data[idx];
            b[0] += coeff * lap[0];
            b[1] += coeff * lap[1];
            b[2] += coeff * lap[2];
        }
    }
}
