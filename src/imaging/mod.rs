// src/imaging/mod.rs
//
// Synthetic experimental images from a magnetisation snapshot.
//
//  - mfm:  stray field above the film -> cantilever phase shift
//  - xray: circular-dichroism holography contrast (+ SAXS pattern)
//  - ltem: Aharonov–Bohm phase -> Fresnel defocus images
//
// All transforms treat the sampled window as periodic (no padding), which is
// what the imaging formulas assume. Keep a vacuum margin around the footprint.

pub mod ltem;
pub mod mfm;
pub mod xray;

use crate::fft::{angular_wavenumbers, to_complex, Fft2, C64};
use crate::grid::Grid2D;
use crate::scalar_field::ScalarField2D;
use crate::vector_field::VectorField2D;

/// FFT plans plus angular wavenumbers for one grid.
pub(crate) struct Spectral {
    pub grid: Grid2D,
    pub kx: Vec<f64>,
    pub ky: Vec<f64>,
    fft: Fft2,
}

impl Spectral {
    pub fn new(grid: Grid2D) -> Self {
        Self {
            grid,
            kx: angular_wavenumbers(grid.nx, grid.dx),
            ky: angular_wavenumbers(grid.ny, grid.dy),
            fft: Fft2::new(grid.nx, grid.ny),
        }
    }

    pub fn forward_real(&mut self, data: &[f64]) -> Vec<C64> {
        let mut buf = to_complex(data);
        self.fft.forward(&mut buf);
        buf
    }

    pub fn forward(&mut self, buf: &mut [C64]) {
        self.fft.forward(buf);
    }

    pub fn inverse(&mut self, buf: &mut [C64]) {
        self.fft.inverse(buf);
    }

    /// Inverse transform, keeping the real part.
    pub fn inverse_real(&mut self, mut buf: Vec<C64>) -> Vec<f64> {
        self.fft.inverse(&mut buf);
        buf.into_iter().map(|c| c.re).collect()
    }

    /// (kx, ky) of flat bin `idx`.
    #[inline]
    pub fn k_at(&self, idx: usize) -> (f64, f64) {
        (self.kx[idx % self.grid.nx], self.ky[idx / self.grid.nx])
    }
}

/// M = Ms m per component (A/m). Vacuum cells contribute zero.
pub(crate) fn magnetisation_components(m: &VectorField2D, ms: &[f64]) -> [Vec<f64>; 3] {
    let mut out = [
        vec![0.0; m.data.len()],
        vec![0.0; m.data.len()],
        vec![0.0; m.data.len()],
    ];
    for (idx, (v, &w)) in m.data.iter().zip(ms.iter()).enumerate() {
        if w > 0.0 {
            for c in 0..3 {
                out[c][idx] = w * v[c];
            }
        }
    }
    out
}

/// Gaussian blur with full width at half maximum `fwhm` (metres), applied in
/// Fourier space with periodic wrap. `fwhm <= 0` returns the input unchanged.
pub fn gaussian_filter(field: &ScalarField2D, fwhm: f64) -> ScalarField2D {
    if !(fwhm > 0.0) {
        return field.clone();
    }
    let sigma = fwhm / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt());
    let mut sp = Spectral::new(field.grid);
    let mut spec = sp.forward_real(&field.data);
    for (idx, c) in spec.iter_mut().enumerate() {
        let (kx, ky) = sp.k_at(idx);
        *c *= (-0.5 * sigma * sigma * (kx * kx + ky * ky)).exp();
    }
    ScalarField2D {
        grid: field.grid,
        data: sp.inverse_real(spec),
    }
}

/// Apply an optional blur.
pub(crate) fn maybe_blur(field: ScalarField2D, fwhm: Option<f64>) -> ScalarField2D {
    match fwhm {
        Some(w) => gaussian_filter(&field, w),
        None => field,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_keeps_constant_fields() {
        let grid = Grid2D::new(16, 8, 1e-9, 1e-9, 1e-9);
        let f = ScalarField2D::from_fn(grid, |_| 2.5);
        let g = gaussian_filter(&f, 4e-9);
        for v in &g.data {
            assert!((v - 2.5).abs() < 1e-12);
        }
    }

    #[test]
    fn blur_spreads_a_point_and_keeps_its_sum() {
        let grid = Grid2D::new(32, 32, 1e-9, 1e-9, 1e-9);
        let mut f = ScalarField2D::zeros(grid);
        let c = f.idx(16, 16);
        f.data[c] = 1.0;
        let g = gaussian_filter(&f, 5e-9);
        let sum: f64 = g.data.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(g.data[c] < 0.1);
        assert!(g.data[g.idx(17, 16)] > g.data[g.idx(20, 16)]);
    }
}
