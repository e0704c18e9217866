// src/imaging/mfm.rs
//
// Magnetic force microscopy in the point-probe approximation.
//
// Stray field z-component at height h above the top surface of a film of
// thickness t (Fourier space, k = |k|):
//
//   Hz(k) = 1/2 e^{-k h} (1 - e^{-k t}) [ Mz(k) - i k̂·M∥(k) ]
//
// Phase shift of a cantilever with quality factor Q and spring constant k_c,
// tip monopole q and dipole m_tip along z:
//
//   Δφ = (Q μ0 / k_c) ( q ∂Hz/∂z + m_tip ∂²Hz/∂z² ),   ∂z -> -k

use serde::{Deserialize, Serialize};

use super::{magnetisation_components, maybe_blur, Spectral};
use crate::fft::C64;
use crate::params::MU0;
use crate::scalar_field::ScalarField2D;
use crate::vector_field::VectorField2D;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfmTip {
    /// Effective monopole moment (A·m).
    pub q: f64,
    /// Effective dipole moment along z (A·m²).
    pub m_tip: f64,
    /// Cantilever quality factor.
    pub quality: f64,
    /// Cantilever spring constant (N/m).
    pub k_spring: f64,
}

impl Default for MfmTip {
    fn default() -> Self {
        Self {
            q: 1e-8,
            m_tip: 0.0,
            quality: 650.0,
            k_spring: 3.0,
        }
    }
}

/// Hz(k) at height `height` above the top surface; index 0 (k = 0) is zero.
fn hz_spectrum(sp: &mut Spectral, m: &VectorField2D, ms: &[f64], height: f64) -> Vec<C64> {
    let thickness = m.grid.dz;
    let [mx, my, mz] = magnetisation_components(m, ms);
    let fx = sp.forward_real(&mx);
    let fy = sp.forward_real(&my);
    let mut hz = sp.forward_real(&mz);

    for (idx, h) in hz.iter_mut().enumerate() {
        let (kx, ky) = sp.k_at(idx);
        let k = (kx * kx + ky * ky).sqrt();
        if k == 0.0 {
            *h = C64::new(0.0, 0.0);
            continue;
        }
        let transfer = 0.5 * (-k * height).exp() * (1.0 - (-k * thickness).exp());
        let in_plane = (fx[idx] * kx + fy[idx] * ky) / k;
        *h = (*h - C64::new(0.0, 1.0) * in_plane) * transfer;
    }
    hz
}

/// Out-of-plane stray field Hz (A/m) on a plane `height` above the film.
pub fn stray_field_hz(m: &VectorField2D, ms: &[f64], height: f64) -> ScalarField2D {
    let mut sp = Spectral::new(m.grid);
    let hz = hz_spectrum(&mut sp, m, ms, height);
    ScalarField2D {
        grid: m.grid,
        data: sp.inverse_real(hz),
    }
}

/// MFM phase shift (rad) at scan height `height`, optionally blurred by `fwhm` (m).
pub fn phase_shift(m: &VectorField2D, ms: &[f64], height: f64, tip: &MfmTip, fwhm: Option<f64>) -> ScalarField2D {
    let mut sp = Spectral::new(m.grid);
    let mut spec = hz_spectrum(&mut sp, m, ms, height);
    let pref = tip.quality * MU0 / tip.k_spring;

    for (idx, h) in spec.iter_mut().enumerate() {
        let (kx, ky) = sp.k_at(idx);
        let k = (kx * kx + ky * ky).sqrt();
        let dz = -k * tip.q + k * k * tip.m_tip;
        *h *= pref * dz;
    }

    let phase = ScalarField2D {
        grid: m.grid,
        data: sp.inverse_real(spec),
    };
    maybe_blur(phase, fwhm)
}
