// src/params.rs
//
// Physical constants and the per-run scalar parameters.
// Everything here is SI; fields inside the solver are inductions B in Tesla.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::vec3::normalize;

/// Vacuum permeability (T m / A).
pub const MU0: f64 = 4.0e-7 * PI;

/// Electron gyromagnetic ratio (rad s^-1 T^-1).
pub const GAMMA_E_RAD_PER_S_T: f64 = 1.760_859_630_23e11;

/// Reduced Planck constant (J s).
pub const HBAR: f64 = 1.054_571_817e-34;

/// Planck constant (J s).
pub const H_PLANCK: f64 = 6.626_070_15e-34;

/// Elementary charge (C).
pub const E_CHARGE: f64 = 1.602_176_634e-19;

/// Electron rest mass (kg).
pub const M_ELECTRON: f64 = 9.109_383_701_5e-31;

/// Speed of light (m/s).
pub const C_LIGHT: f64 = 299_792_458.0;

/// Parameters for the LLG equation.
#[derive(Debug, Clone, Copy)]
pub struct LLGParams {
    pub gamma: f64,      // gyromagnetic ratio (rad s^-1 T^-1)
    pub alpha: f64,      // Gilbert damping
    pub dt: f64,         // time step (s); initial guess for adaptive steppers
    pub b_ext: [f64; 3], // uniform applied induction (T)
}

impl LLGParams {
    /// Build with the applied field given as H (A/m).
    pub fn with_h_ext(gamma: f64, alpha: f64, dt: f64, h_ext: [f64; 3]) -> Self {
        Self {
            gamma,
            alpha,
            dt,
            b_ext: [MU0 * h_ext[0], MU0 * h_ext[1], MU0 * h_ext[2]],
        }
    }
}

/// Slonczewski spin-transfer torque parameters (current perpendicular to the film).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpinTorque {
    /// Current density (A/m^2).
    pub j: f64,
    /// Spin polarisation.
    pub p: f64,
    /// Slonczewski Λ parameter.
    pub lambda: f64,
    /// Secondary (field-like) spin-torque term ε'.
    pub eps_prime: f64,
    /// Polariser direction, normalised on use.
    pub mp: [f64; 3],
}

impl SpinTorque {
    /// Unit polariser direction.
    pub fn mp_unit(&self) -> [f64; 3] {
        normalize(self.mp)
    }

    /// Torque prefactor β = ħ J / (e Ms t) in Tesla.
    #[inline]
    pub fn beta(&self, ms: f64, thickness: f64) -> f64 {
        if ms == 0.0 || thickness == 0.0 {
            return 0.0;
        }
        HBAR * self.j / (E_CHARGE * ms * thickness)
    }

    /// Slonczewski efficiency ε(m·mp).
    #[inline]
    pub fn epsilon(&self, m_dot_mp: f64) -> f64 {
        let l2 = self.lambda * self.lambda;
        self.p * l2 / ((l2 + 1.0) + (l2 - 1.0) * m_dot_mp)
    }
}

/// Energy-term parameters of the film.
///
/// `ms` is per cell: zero marks vacuum (outside the lithographic footprint).
#[derive(Debug, Clone)]
pub struct Material {
    pub ms: Vec<f64>,        // saturation magnetisation per cell (A/m)
    pub a_ex: f64,           // exchange stiffness (J/m)
    pub dmi: Option<f64>,    // interfacial DMI constant (J/m^2)
    pub k_u: f64,            // uniaxial anisotropy (J/m^3), > 0 easy axis
    pub easy_axis: [f64; 3], // unit vector
    pub demag: bool,
}

impl Material {
    /// Uniform Ms over `n_cells` cells.
    pub fn uniform(
        n_cells: usize,
        ms: f64,
        a_ex: f64,
        dmi: Option<f64>,
        k_u: f64,
        easy_axis: [f64; 3],
        demag: bool,
    ) -> Self {
        Self {
            ms: vec![ms; n_cells],
            a_ex,
            dmi,
            k_u,
            easy_axis: normalize(easy_axis),
            demag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h_ext_is_converted_to_tesla() {
        let p = LLGParams::with_h_ext(GAMMA_E_RAD_PER_S_T, 0.1, 1e-13, [0.0, 0.0, 1.0e5]);
        assert!((p.b_ext[2] - MU0 * 1.0e5).abs() < 1e-15);
        assert_eq!(p.b_ext[0], 0.0);
    }

    #[test]
    fn slonczewski_epsilon_reduces_to_half_polarisation_for_unit_lambda() {
        let stt = SpinTorque {
            j: 1e11,
            p: 0.4,
            lambda: 1.0,
            eps_prime: 0.0,
            mp: [0.0, 1.0, 0.0],
        };
        for &c in &[-1.0, 0.0, 0.3, 1.0] {
            assert!((stt.epsilon(c) - 0.2).abs() < 1e-15);
        }
    }

    #[test]
    fn beta_vanishes_in_vacuum() {
        let stt = SpinTorque {
            j: 1e12,
            p: 0.4,
            lambda: 2.0,
            eps_prime: 0.0,
            mp: [0.0, 0.0, 1.0],
        };
        assert_eq!(stt.beta(0.0, 1e-9), 0.0);
        assert!(stt.beta(1e6, 1e-9) > 0.0);
    }
}
