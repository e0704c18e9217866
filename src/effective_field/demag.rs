// src/effective_field/demag.rs
//
// Magnetostatic (demagnetising) field via FFT-accelerated convolution.
//
// We compute (discrete convolution):
//   B_demag_i = K_ij * M_j
// where M = Ms_cell * m is magnetisation in A/m and B_demag is in Tesla.
//
// - 2D zero-padding to 2*Nx × 2*Ny (linear convolution / open boundaries)
// - Volume-averaged rectangular-prism kernel from face-charge integration
//   (MuMax3 style), evaluated once per grid and cached in-process.
// - Single layer: Kxz = Kyz = 0 by symmetry, so z decouples from x/y.
// - For a cubic single cell the self term is exactly -mu0/3 on the diagonal.

use std::f64::consts::PI;
use std::sync::{Mutex, OnceLock};

use tracing::debug;

use crate::fft::{Fft2, C64};
use crate::grid::Grid2D;
use crate::params::{Material, MU0};
use crate::vector_field::VectorField2D;

// Integration accuracy of the near-field kernel (MuMax default).
const DEMAG_ACCURACY: f64 = 6.0;

static DEMAG_CACHE: OnceLock<Mutex<Option<Demag2D>>> = OnceLock::new();

/// Add the demagnetising induction B_demag (Tesla) to b_eff.
///
/// The kernel is cached and rebuilt only when the grid changes.
pub fn add_demag_field(grid: &Grid2D, m: &VectorField2D, b_eff: &mut VectorField2D, mat: &Material) {
    if !mat.demag {
        return;
    }

    let cache = DEMAG_CACHE.get_or_init(|| Mutex::new(None));
    let mut guard = cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let rebuild = match guard.as_ref() {
        Some(d) => !d.grid.same_shape(grid),
        None => true,
    };
    if rebuild {
        *guard = Some(Demag2D::new(*grid));
    }

    if let Some(d) = guard.as_mut() {
        d.add_field(m, b_eff, &mat.ms);
    }
}

#[inline]
fn wrap_index(d: isize, n: usize) -> usize {
    d.rem_euclid(n as isize) as usize
}

struct Demag2D {
    grid: Grid2D,
    px: usize,
    py: usize,

    // Kernel in Fourier domain (Tesla per (A/m))
    kxx: Vec<C64>,
    kxy: Vec<C64>,
    kyy: Vec<C64>,
    kzz: Vec<C64>,

    mx: Vec<C64>,
    my: Vec<C64>,
    mz: Vec<C64>,

    fft: Fft2,
}

impl Demag2D {
    fn new(grid: Grid2D) -> Self {
        let nx = grid.nx;
        let ny = grid.ny;
        let px = 2 * nx;
        let py = 2 * ny;
        let n_pad = px * py;
        let zero = C64::new(0.0, 0.0);

        debug!(nx, ny, "building demag kernel");

        let mut kxx = vec![zero; n_pad];
        let mut kxy = vec![zero; n_pad];
        let mut kyy = vec![zero; n_pad];
        let mut kzz = vec![zero; n_pad];

        // Fill displacements in [-(N-1), +(N-1)]; the ±N plane stays zero.
        let rx_max = nx as isize - 1;
        let ry_max = ny as isize - 1;
        for sy in -ry_max..=ry_max {
            let iy = wrap_index(sy, py);
            for sx in -rx_max..=rx_max {
                let ix = wrap_index(sx, px);
                let k = prism_kernel_tensor(grid.dx, grid.dy, grid.dz, sx, sy);
                let idx = iy * px + ix;
                kxx[idx].re = k[0][0];
                kxy[idx].re = k[0][1];
                kyy[idx].re = k[1][1];
                kzz[idx].re = k[2][2];
            }
        }

        let mut fft = Fft2::new(px, py);
        fft.forward(&mut kxx);
        fft.forward(&mut kxy);
        fft.forward(&mut kyy);
        fft.forward(&mut kzz);

        Self {
            grid,
            px,
            py,
            kxx,
            kxy,
            kyy,
            kzz,
            mx: vec![zero; n_pad],
            my: vec![zero; n_pad],
            mz: vec![zero; n_pad],
            fft,
        }
    }

    fn add_field(&mut self, m: &VectorField2D, b_eff: &mut VectorField2D, ms: &[f64]) {
        debug_assert!(m.grid.same_shape(&self.grid));

        let zero = C64::new(0.0, 0.0);
        self.mx.fill(zero);
        self.my.fill(zero);
        self.mz.fill(zero);

        // Pack M = Ms*m into padded arrays (lower-left block), zeros elsewhere
        let nx = self.grid.nx;
        let ny = self.grid.ny;
        let px = self.px;
        for j in 0..ny {
            for i in 0..nx {
                let src = j * nx + i;
                let dst = j * px + i;
                let v = m.data[src];
                let w = ms[src];
                self.mx[dst].re = w * v[0];
                self.my[dst].re = w * v[1];
                self.mz[dst].re = w * v[2];
            }
        }

        self.fft.forward(&mut self.mx);
        self.fft.forward(&mut self.my);
        self.fft.forward(&mut self.mz);

        // B = K * M in k-space, written back into the M buffers
        for idx in 0..self.px * self.py {
            let mx = self.mx[idx];
            let my = self.my[idx];
            let mz = self.mz[idx];
            self.mx[idx] = self.kxx[idx] * mx + self.kxy[idx] * my;
            self.my[idx] = self.kxy[idx] * mx + self.kyy[idx] * my;
            self.mz[idx] = self.kzz[idx] * mz;
        }

        self.fft.inverse(&mut self.mx);
        self.fft.inverse(&mut self.my);
        self.fft.inverse(&mut self.mz);

        for j in 0..ny {
            for i in 0..nx {
                let dst = j * nx + i;
                let src = j * px + i;
                b_eff.data[dst][0] += self.mx[src].re;
                b_eff.data[dst][1] += self.my[src].re;
                b_eff.data[dst][2] += self.mz[src].re;
            }
        }
    }
}

/// Demag kernel K (Tesla per A/m) between cells displaced by (sx, sy),
/// symmetrised so that K = K^T.
fn prism_kernel_tensor(dx: f64, dy: f64, dz: f64, sx: isize, sy: isize) -> [[f64; 3]; 3] {
    if sx == 0 && sy == 0 {
        let cube = (dx - dy).abs() < 1e-15 * dx && (dy - dz).abs() < 1e-15 * dy;
        if cube {
            let k = -MU0 / 3.0;
            return [[k, 0.0, 0.0], [0.0, k, 0.0], [0.0, 0.0, k]];
        }
    }

    let r_center = [sx as f64 * dx, sy as f64 * dy, 0.0_f64];

    // K[dest][source] = B_dest due to unit magnetisation along source
    let mut k = [[0.0_f64; 3]; 3];
    for source_axis in 0..3 {
        let h = h_from_unit_m(source_axis, r_center, [dx, dy, dz], [sx, sy, 0]);
        for dest_axis in 0..3 {
            k[dest_axis][source_axis] = MU0 * h[dest_axis];
        }
    }

    let kxy = 0.5 * (k[0][1] + k[1][0]);
    let kxz = 0.5 * (k[0][2] + k[2][0]);
    let kyz = 0.5 * (k[1][2] + k[2][1]);
    [
        [k[0][0], kxy, kxz],
        [kxy, k[1][1], kyz],
        [kxz, kyz, k[2][2]],
    ]
}

/// Demag field H at displacement `r_center` due to a unit magnetisation along
/// `source_axis`, averaged over the destination cell.
///
/// The source cell is replaced by its two charged faces (±1 surface charge),
/// each split into nv × nw point charges; the destination volume is sampled on
/// an nx × ny × nz lattice. Point counts grow as cells get closer.
fn h_from_unit_m(source_axis: usize, r_center: [f64; 3], cell: [f64; 3], disp: [isize; 3]) -> [f64; 3] {
    let u = source_axis;
    let v = (u + 1) % 3;
    let w = (u + 2) % 3;

    let lmin = cell[0].min(cell[1]).min(cell[2]);

    // closest distance between the two cells (zero if they touch)
    let gap = |d: isize, c: f64| (d.unsigned_abs().saturating_sub(1)) as f64 * c;
    let gx = gap(disp[0], cell[0]);
    let gy = gap(disp[1], cell[1]);
    let gz = gap(disp[2], cell[2]);
    let mut d = (gx * gx + gy * gy + gz * gz).sqrt();
    if d == 0.0 {
        d = lmin;
    }

    let max_size = d / DEMAG_ACCURACY;
    let count = |len: f64| ((len / max_size).ceil().max(1.0)) as usize;

    let nx = count(cell[0]);
    let ny = count(cell[1]);
    let nz = count(cell[2]);
    let nv = 2 * count(cell[v]);
    let nw = 2 * count(cell[w]);

    let scale = 1.0 / ((nv * nw * nx * ny * nz) as f64);
    let charge = cell[v] * cell[w] * scale;

    let sample = |c: f64, n: usize, k: usize| -0.5 * c + c / (2.0 * n as f64) + k as f64 * (c / n as f64);

    let mut pole = [0.0_f64; 3];
    let mut h = [0.0_f64; 3];

    for a in 0..nv {
        pole[v] = sample(cell[v], nv, a);
        for b in 0..nw {
            pole[w] = sample(cell[w], nw, b);

            for ax in 0..nx {
                let rx = r_center[0] + sample(cell[0], nx, ax);
                for ay in 0..ny {
                    let ry = r_center[1] + sample(cell[1], ny, ay);
                    for az in 0..nz {
                        let rz = r_center[2] + sample(cell[2], nz, az);

                        for (sign, pu) in [(1.0, 0.5 * cell[u]), (-1.0, -0.5 * cell[u])] {
                            pole[u] = pu;
                            let r = [rx - pole[0], ry - pole[1], rz - pole[2]];
                            let rr = (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt();
                            let q = sign * charge / (4.0 * PI * rr * rr * rr);
                            h[0] += r[0] * q;
                            h[1] += r[1] * q;
                            h[2] += r[2] * q;
                        }
                    }
                }
            }
        }
    }

    h
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demag_only(n_cells: usize, ms: f64) -> Material {
        Material::uniform(n_cells, ms, 0.0, None, 0.0, [0.0, 0.0, 1.0], true)
    }

    #[test]
    fn demag_single_cell_uniform_matches_cube_self_term() {
        let grid = Grid2D::new(1, 1, 1.0, 1.0, 1.0);
        let mut m = VectorField2D::new(grid);
        m.set_uniform(0.0, 0.0, 1.0);
        let mat = demag_only(1, 1.0);

        let mut b_eff = VectorField2D::zeros(grid);
        add_demag_field(&grid, &m, &mut b_eff, &mat);

        let b = b_eff.data[0];
        assert!(b[0].abs() < 1e-12, "Bx={}", b[0]);
        assert!(b[1].abs() < 1e-12, "By={}", b[1]);
        let expected = -MU0 / 3.0;
        assert!((b[2] - expected).abs() < 1e-10, "Bz={}, expected={}", b[2], expected);
    }

    #[test]
    fn kernel_is_symmetric_under_displacement_reversal() {
        let a = prism_kernel_tensor(2e-9, 2e-9, 1e-9, 3, 1);
        let b = prism_kernel_tensor(2e-9, 2e-9, 1e-9, -3, -1);
        for (r, c) in [(0, 0), (0, 1), (1, 1), (2, 2)] {
            assert!(a[r][c] != 0.0);
            assert!((a[r][c] - b[r][c]).abs() <= 1e-9 * a[r][c].abs());
        }
    }

    #[test]
    fn vacuum_cells_do_not_source_field() {
        let grid = Grid2D::new(4, 4, 2e-9, 2e-9, 2e-9);
        let m = VectorField2D::new(grid);
        let mat = demag_only(16, 0.0);
        let mut b = VectorField2D::zeros(grid);
        add_demag_field(&grid, &m, &mut b, &mat);
        assert!(b.data.iter().all(|v| v.iter().all(|c| c.abs() < 1e-20)));
    }
}
