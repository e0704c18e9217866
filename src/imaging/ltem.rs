// src/imaging/ltem.rs
//
// Lorentz TEM (Fresnel mode).
//
// Magnetic phase of a film of thickness t with magnetisation M = Ms m
// (Mansuripur / Beleggia form, beam along z):
//
//   φ(k) = -i (e μ0 t / ħ) (kx My(k) - ky Mx(k)) / (k² + kc²),   φ(0) = 0
//
// kc > 0 regularises the k -> 0 limit (finite-window artefacts).
// Defocus images apply the objective transfer function exp(-iχ(q)) to
// ψ = exp(iφ), with q the spatial frequency in 1/m:
//
//   χ(q) = π λ Δf q² + ½ π Cs λ³ q⁴

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{magnetisation_components, Spectral};
use crate::fft::C64;
use crate::params::{C_LIGHT, E_CHARGE, HBAR, H_PLANCK, MU0, M_ELECTRON};
use crate::scalar_field::ScalarField2D;
use crate::vector_field::VectorField2D;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LtemSettings {
    /// Accelerating voltage (V).
    pub voltage: f64,
    /// Defocus values to image (m).
    pub defocus: [f64; 3],
    /// Spherical aberration (m).
    pub cs: f64,
    /// Low-k cutoff (1/m).
    pub kc: f64,
}

impl Default for LtemSettings {
    fn default() -> Self {
        Self {
            voltage: 300e3,
            defocus: [-1e-3, 0.0, 1e-3],
            cs: 0.0,
            kc: 1e5,
        }
    }
}

/// Relativistic electron wavelength (m) for accelerating voltage `voltage` (V).
pub fn electron_wavelength(voltage: f64) -> f64 {
    let ev = E_CHARGE * voltage;
    H_PLANCK / (2.0 * M_ELECTRON * ev * (1.0 + ev / (2.0 * M_ELECTRON * C_LIGHT * C_LIGHT))).sqrt()
}

/// Electron phase (rad) accumulated through the film.
pub fn magnetic_phase(m: &VectorField2D, ms: &[f64], kc: f64) -> ScalarField2D {
    let grid = m.grid;
    let mut sp = Spectral::new(grid);
    let [mx, my, _] = magnetisation_components(m, ms);
    let fx = sp.forward_real(&mx);
    let fy = sp.forward_real(&my);
    let pref = E_CHARGE * MU0 * grid.dz / HBAR;

    let spec: Vec<C64> = (0..grid.n_cells())
        .map(|idx| {
            let (kx, ky) = sp.k_at(idx);
            let denom = kx * kx + ky * ky + kc * kc;
            if idx == 0 || denom == 0.0 {
                return C64::new(0.0, 0.0);
            }
            let num = fy[idx] * kx - fx[idx] * ky;
            C64::new(0.0, -pref) * num / denom
        })
        .collect();

    ScalarField2D {
        grid,
        data: sp.inverse_real(spec),
    }
}

/// Fresnel image intensity |ψ|² (unit mean for a phase object).
pub fn defocus_image(phase: &ScalarField2D, voltage: f64, defocus: f64, cs: f64) -> ScalarField2D {
    let grid = phase.grid;
    let lambda = electron_wavelength(voltage);
    let mut sp = Spectral::new(grid);
    let mut psi: Vec<C64> = phase.data.iter().map(|&p| C64::from_polar(1.0, p)).collect();
    sp.forward(&mut psi);

    for (idx, c) in psi.iter_mut().enumerate() {
        let (kx, ky) = sp.k_at(idx);
        let q2 = (kx * kx + ky * ky) / (4.0 * PI * PI);
        let chi = PI * lambda * defocus * q2 + 0.5 * PI * cs * lambda.powi(3) * q2 * q2;
        *c *= C64::from_polar(1.0, -chi);
    }

    sp.inverse(&mut psi);
    ScalarField2D {
        grid,
        data: psi.iter().map(|c| c.norm_sqr()).collect(),
    }
}

/// Projected in-plane induction (Bx·t, By·t) in T·m from the phase gradient:
/// ∂φ/∂x = (e/ħ) By t,  ∂φ/∂y = -(e/ħ) Bx t.
pub fn integrated_induction(phase: &ScalarField2D) -> (ScalarField2D, ScalarField2D) {
    let grid = phase.grid;
    let mut sp = Spectral::new(grid);
    let spec = sp.forward_real(&phase.data);
    let scale = HBAR / E_CHARGE;

    let mut dx = Vec::with_capacity(spec.len());
    let mut dy = Vec::with_capacity(spec.len());
    for (idx, c) in spec.iter().enumerate() {
        let (kx, ky) = sp.k_at(idx);
        dx.push(C64::new(0.0, kx) * c);
        dy.push(C64::new(0.0, ky) * c);
    }
    let dphi_dx = sp.inverse_real(dx);
    let dphi_dy = sp.inverse_real(dy);

    let bx_t = ScalarField2D {
        grid,
        data: dphi_dy.iter().map(|v| -scale * v).collect(),
    };
    let by_t = ScalarField2D {
        grid,
        data: dphi_dx.iter().map(|v| scale * v).collect(),
    };
    (bx_t, by_t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid2D;
    use approx::assert_relative_eq;

    #[test]
    fn wavelength_at_300kv() {
        // 1.9687 pm
        assert_relative_eq!(electron_wavelength(300e3), 1.9687e-12, max_relative = 1e-4);
    }

    #[test]
    fn out_of_plane_m_has_no_phase() {
        let grid = Grid2D::new(16, 16, 2e-9, 2e-9, 2e-9);
        let m = VectorField2D::from_fn(grid, |p| if p[0] < 16e-9 { [0.0, 0.0, 1.0] } else { [0.0, 0.0, -1.0] });
        let ms = vec![5e5; grid.n_cells()];
        assert_eq!(magnetic_phase(&m, &ms, 1e5).max_abs(), 0.0);
    }

    #[test]
    fn zero_defocus_gives_unit_intensity() {
        let grid = Grid2D::new(16, 8, 2e-9, 2e-9, 2e-9);
        let phase = ScalarField2D::from_fn(grid, |p| (p[0] * 2e8).sin() + (p[1] * 1e8).cos());
        let img = defocus_image(&phase, 300e3, 0.0, 0.0);
        for v in &img.data {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn defocus_keeps_mean_intensity() {
        let grid = Grid2D::new(32, 32, 2e-9, 2e-9, 2e-9);
        let phase = ScalarField2D::from_fn(grid, |p| 0.5 * (p[0] * 2.0 * PI / 64e-9).sin());
        let img = defocus_image(&phase, 300e3, 500e-6, 1e-3);
        assert_relative_eq!(img.mean(), 1.0, epsilon = 1e-10);
        assert!(img.max_abs() > 1.0);
    }

    #[test]
    fn phase_gradient_recovers_in_plane_induction() {
        // My(x) = Ms sin(2πx/L), periodic; no cutoff so the inversion is exact
        let (n, d, t, ms0) = (32usize, 2e-9, 3e-9, 4e5);
        let grid = Grid2D::new(n, 4, d, d, t);
        let l = n as f64 * d;
        let m = VectorField2D::from_fn(grid, |p| {
            let s = (2.0 * PI * p[0] / l).sin();
            [0.0, s, (1.0 - s * s).max(0.0).sqrt()]
        });
        let ms = vec![ms0; grid.n_cells()];
        let phase = magnetic_phase(&m, &ms, 0.0);
        assert!(phase.max_abs() > 0.0);

        let (bx_t, by_t) = integrated_induction(&phase);
        for (idx, v) in m.data.iter().enumerate() {
            assert!((by_t.data[idx] - MU0 * ms0 * v[1] * t).abs() < 1e-6 * MU0 * ms0 * t);
            assert!(bx_t.data[idx].abs() < 1e-6 * MU0 * ms0 * t);
        }
    }
}
