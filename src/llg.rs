// src/llg.rs
//
// Landau–Lifshitz–Gilbert–Slonczewski dynamics on the 2D film.
//
//   dm/dt = -γ/(1+α²) [ m×B + α m×(m×B) ] + γ τ_SL
//
//   τ_SL = β/(1+α²) [ (ε - α ε') m×(mp×m) - (ε' - α ε) m×mp ]
//   β    = ħ J / (e Ms t),   ε = P Λ² / ((Λ²+1) + (Λ²-1)(m·mp))
//
// B is the full effective induction (Tesla), recomputed at every stage.
// Vacuum cells (Ms = 0) have dm/dt = 0 and stay at m = 0.

use serde::{Deserialize, Serialize};

use crate::effective_field::build_b_eff;
use crate::grid::Grid2D;
use crate::params::{LLGParams, Material, SpinTorque};
use crate::vec3::{cross, dot};
use crate::vector_field::VectorField2D;

/// dm/dt for one cell. `stt` is (β, mp, settings) when a current flows.
#[inline]
pub fn llgs_rhs_cell(
    m: [f64; 3],
    b: [f64; 3],
    gamma: f64,
    alpha: f64,
    stt: Option<(f64, [f64; 3], &SpinTorque)>,
) -> [f64; 3] {
    let inv = 1.0 / (1.0 + alpha * alpha);
    let mxb = cross(m, b);
    let mxmxb = cross(m, mxb);
    let mut d = [
        -gamma * inv * (mxb[0] + alpha * mxmxb[0]),
        -gamma * inv * (mxb[1] + alpha * mxmxb[1]),
        -gamma * inv * (mxb[2] + alpha * mxmxb[2]),
    ];

    if let Some((beta, mp, s)) = stt {
        if beta != 0.0 {
            let eps = s.epsilon(dot(m, mp));
            let damping_like = beta * inv * (eps - alpha * s.eps_prime);
            let field_like = beta * inv * (s.eps_prime - alpha * eps);
            let m_x_mp = cross(m, mp);
            let m_x_mp_x_m = cross(m, cross(mp, m));
            for c in 0..3 {
                d[c] += gamma * (damping_like * m_x_mp_x_m[c] - field_like * m_x_mp[c]);
            }
        }
    }
    d
}

/// Evaluate dm/dt over the whole grid into `out`, using `b_eff` as scratch.
pub fn llgs_rhs(
    grid: &Grid2D,
    m: &VectorField2D,
    params: &LLGParams,
    material: &Material,
    stt: Option<&SpinTorque>,
    b_eff: &mut VectorField2D,
    out: &mut VectorField2D,
) {
    build_b_eff(grid, m, b_eff, params, material);

    let thickness = grid.dz;
    let mp = stt.map(|s| s.mp_unit()).unwrap_or([0.0, 0.0, 1.0]);

    for (k, ((mi, bi), oi)) in m.data.iter().zip(b_eff.data.iter()).zip(out.data.iter_mut()).enumerate() {
        let ms = material.ms[k];
        if ms <= 0.0 {
            *oi = [0.0; 3];
            continue;
        }
        let cell_stt = stt.map(|s| (s.beta(ms, thickness), mp, s));
        *oi = llgs_rhs_cell(*mi, *bi, params.gamma, params.alpha, cell_stt);
    }
}

/// Renormalise magnetic cells to |m| = 1; vacuum stays zero.
fn renormalize(m: &mut VectorField2D, ms: &[f64]) {
    for (v, &w) in m.data.iter_mut().zip(ms.iter()) {
        if w <= 0.0 {
            *v = [0.0; 3];
            continue;
        }
        let n2 = dot(*v, *v);
        if n2 > 0.0 {
            let inv = 1.0 / n2.sqrt();
            v[0] *= inv;
            v[1] *= inv;
            v[2] *= inv;
        }
    }
}

/// out = m + h Σ coeffs[s] * k[s]
fn combine(out: &mut VectorField2D, m: &VectorField2D, h: f64, ks: &[&VectorField2D], coeffs: &[f64]) {
    for (idx, o) in out.data.iter_mut().enumerate() {
        let mut v = m.data[idx];
        for (k, &c) in ks.iter().zip(coeffs.iter()) {
            if c == 0.0 {
                continue;
            }
            let kv = k.data[idx];
            v[0] += h * c * kv[0];
            v[1] += h * c * kv[1];
            v[2] += h * c * kv[2];
        }
        *o = v;
    }
}

pub struct RK4Scratch {
    b_eff: VectorField2D,
    k1: VectorField2D,
    k2: VectorField2D,
    k3: VectorField2D,
    k4: VectorField2D,
    tmp: VectorField2D,
}

impl RK4Scratch {
    pub fn new(grid: Grid2D) -> Self {
        Self {
            b_eff: VectorField2D::zeros(grid),
            k1: VectorField2D::zeros(grid),
            k2: VectorField2D::zeros(grid),
            k3: VectorField2D::zeros(grid),
            k4: VectorField2D::zeros(grid),
            tmp: VectorField2D::zeros(grid),
        }
    }
}

/// One classical RK4 step of size `params.dt`, recomputing B_eff at each stage.
pub fn step_llgs_rk4(
    grid: &Grid2D,
    m: &mut VectorField2D,
    params: &LLGParams,
    material: &Material,
    stt: Option<&SpinTorque>,
    s: &mut RK4Scratch,
) {
    let h = params.dt;

    llgs_rhs(grid, m, params, material, stt, &mut s.b_eff, &mut s.k1);

    combine(&mut s.tmp, m, h, &[&s.k1], &[0.5]);
    llgs_rhs(grid, &s.tmp, params, material, stt, &mut s.b_eff, &mut s.k2);

    combine(&mut s.tmp, m, h, &[&s.k2], &[0.5]);
    llgs_rhs(grid, &s.tmp, params, material, stt, &mut s.b_eff, &mut s.k3);

    combine(&mut s.tmp, m, h, &[&s.k3], &[1.0]);
    llgs_rhs(grid, &s.tmp, params, material, stt, &mut s.b_eff, &mut s.k4);

    let w = 1.0 / 6.0;
    combine(
        &mut s.tmp,
        m,
        h,
        &[&s.k1, &s.k2, &s.k3, &s.k4],
        &[w, 2.0 * w, 2.0 * w, w],
    );
    std::mem::swap(&mut m.data, &mut s.tmp.data);
    renormalize(m, &material.ms);
}

/// Adaptive step-size controller settings (MuMax MaxErr / Headroom analogues).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
    pub max_err: f64,
    pub headroom: f64,
    pub dt_min: f64,
    pub dt_max: f64,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            max_err: 1e-5,
            headroom: 0.8,
            dt_min: 1e-18,
            dt_max: 1e-11,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StepReport {
    /// Step actually taken (s).
    pub dt_used: f64,
    /// Suggested size of the next step (s).
    pub dt_next: f64,
    /// Error estimate of the accepted step (max per-cell |m5 - m4|).
    pub err: f64,
    /// Attempts thrown away before acceptance.
    pub rejected: usize,
}

// Dormand–Prince 5(4) tableau
const DP_A: [[f64; 6]; 6] = [
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0, 0.0, 0.0],
    [9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0, 0.0],
    [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0],
];

// b5 - b4
const DP_E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

pub struct RK45Scratch {
    b_eff: VectorField2D,
    k: [VectorField2D; 7],
    y5: VectorField2D,
    tmp: VectorField2D,
    fsal_valid: bool,
}

impl RK45Scratch {
    pub fn new(grid: Grid2D) -> Self {
        Self {
            b_eff: VectorField2D::zeros(grid),
            k: std::array::from_fn(|_| VectorField2D::zeros(grid)),
            y5: VectorField2D::zeros(grid),
            tmp: VectorField2D::zeros(grid),
            fsal_valid: false,
        }
    }
}

/// One accepted adaptive Dormand–Prince step starting from `params.dt`.
///
/// Rejected attempts shrink dt and retry; a step at or below `dt_min` is always
/// accepted. A requested `params.dt` shorter than `dt_min` (the remainder before a
/// frame time) is taken as is. `params.dt` is left at the suggested next step.
pub fn step_llgs_rk45_adaptive(
    grid: &Grid2D,
    m: &mut VectorField2D,
    params: &mut LLGParams,
    material: &Material,
    stt: Option<&SpinTorque>,
    ctrl: &AdaptiveSettings,
    s: &mut RK45Scratch,
) -> StepReport {
    if !s.fsal_valid {
        llgs_rhs(grid, m, params, material, stt, &mut s.b_eff, &mut s.k[0]);
        s.fsal_valid = true;
    }

    let mut rejected = 0usize;
    let mut h = if params.dt > 0.0 {
        params.dt.min(ctrl.dt_max)
    } else {
        ctrl.dt_min
    };

    loop {
        for stage in 1..7 {
            let (done, rest) = s.k.split_at_mut(stage);
            let ks: Vec<&VectorField2D> = done.iter().collect();
            let target = if stage == 6 { &mut s.y5 } else { &mut s.tmp };
            combine(target, m, h, &ks, &DP_A[stage - 1][..stage]);
            if stage == 6 {
                renormalize(&mut s.y5, &material.ms);
                llgs_rhs(grid, &s.y5, params, material, stt, &mut s.b_eff, &mut rest[0]);
            } else {
                llgs_rhs(grid, &s.tmp, params, material, stt, &mut s.b_eff, &mut rest[0]);
            }
        }

        // err = h * max_i |Σ e_s k_s|
        let mut err = 0.0_f64;
        for idx in 0..m.data.len() {
            let mut e = [0.0_f64; 3];
            for (k, &c) in s.k.iter().zip(DP_E.iter()) {
                if c == 0.0 {
                    continue;
                }
                let kv = k.data[idx];
                e[0] += c * kv[0];
                e[1] += c * kv[1];
                e[2] += c * kv[2];
            }
            err = err.max(h * dot(e, e).sqrt());
        }

        let factor = if err > 0.0 {
            (ctrl.headroom * (ctrl.max_err / err).powf(0.2)).clamp(0.1, 2.0)
        } else {
            2.0
        };

        if err <= ctrl.max_err || h <= ctrl.dt_min {
            std::mem::swap(&mut m.data, &mut s.y5.data);
            let (first, last) = s.k.split_at_mut(6);
            std::mem::swap(&mut first[0].data, &mut last[0].data);

            let dt_next = (h * factor).clamp(ctrl.dt_min, ctrl.dt_max);
            params.dt = dt_next;
            return StepReport {
                dt_used: h,
                dt_next,
                err,
                rejected,
            };
        }

        rejected += 1;
        h = (h * factor).max(ctrl.dt_min);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GAMMA_E_RAD_PER_S_T;

    fn macrospin(ms: f64) -> (Grid2D, Material) {
        let grid = Grid2D::new(1, 1, 2e-9, 2e-9, 2e-9);
        let mat = Material::uniform(1, ms, 0.0, None, 0.0, [0.0, 0.0, 1.0], false);
        (grid, mat)
    }

    #[test]
    fn zero_current_reduces_to_plain_llg() {
        let stt = SpinTorque {
            j: 0.0,
            p: 0.4,
            lambda: 2.0,
            eps_prime: 0.1,
            mp: [0.0, 1.0, 0.0],
        };
        let m = [0.6, 0.0, 0.8];
        let b = [0.0, 0.1, 0.2];
        let a = llgs_rhs_cell(m, b, GAMMA_E_RAD_PER_S_T, 0.1, None);
        let c = llgs_rhs_cell(m, b, GAMMA_E_RAD_PER_S_T, 0.1, Some((stt.beta(1e6, 1e-9), [0.0, 1.0, 0.0], &stt)));
        assert_eq!(a, c);
    }

    #[test]
    fn rhs_is_perpendicular_to_m() {
        let stt = SpinTorque {
            j: 1e12,
            p: 0.5,
            lambda: 2.0,
            eps_prime: 0.05,
            mp: [0.0, 1.0, 0.0],
        };
        let m = [0.48, 0.6, 0.64];
        let d = llgs_rhs_cell(m, [0.01, -0.2, 0.3], GAMMA_E_RAD_PER_S_T, 0.3, Some((0.05, [0.0, 1.0, 0.0], &stt)));
        assert!(dot(d, m).abs() < 1e-9 * dot(d, d).sqrt());
    }

    #[test]
    fn rk45_tracks_precession_frequency() {
        let (grid, mat) = macrospin(8e5);
        let mut m = VectorField2D::new(grid);
        m.set_uniform(1.0, 0.0, 0.0);
        let b0 = 0.1;
        let mut params = LLGParams {
            gamma: GAMMA_E_RAD_PER_S_T,
            alpha: 0.0,
            dt: 1e-13,
            b_ext: [0.0, 0.0, b0],
        };
        let ctrl = AdaptiveSettings {
            max_err: 1e-7,
            ..AdaptiveSettings::default()
        };
        let mut s = RK45Scratch::new(grid);

        // half a period: m goes from +x to -x
        let t_half = std::f64::consts::PI / (GAMMA_E_RAD_PER_S_T * b0);
        let mut t = 0.0;
        while t < t_half {
            params.dt = params.dt.min(t_half - t);
            let r = step_llgs_rk45_adaptive(&grid, &mut m, &mut params, &mat, None, &ctrl, &mut s);
            t += r.dt_used;
        }
        assert!(m.data[0][0] < -0.999, "mx = {}", m.data[0][0]);
        assert!(m.data[0][2].abs() < 1e-6);
    }

    fn precessing_macrospin() -> (Grid2D, Material, VectorField2D, LLGParams) {
        let (grid, mat) = macrospin(8e5);
        let mut m = VectorField2D::new(grid);
        m.set_uniform(1.0, 0.0, 0.0);
        let params = LLGParams {
            gamma: GAMMA_E_RAD_PER_S_T,
            alpha: 0.0,
            dt: 1e-11,
            b_ext: [0.0, 0.0, 0.1],
        };
        (grid, mat, m, params)
    }

    #[test]
    fn oversized_step_is_rejected_then_shrunk() {
        let (grid, mat, mut m, mut params) = precessing_macrospin();
        let ctrl = AdaptiveSettings {
            max_err: 1e-12,
            ..AdaptiveSettings::default()
        };
        let mut s = RK45Scratch::new(grid);
        let r = step_llgs_rk45_adaptive(&grid, &mut m, &mut params, &mat, None, &ctrl, &mut s);
        assert!(r.rejected > 0);
        assert!(r.dt_used < 1e-11);
        assert!(r.err <= ctrl.max_err, "err = {}", r.err);
        assert_eq!(params.dt, r.dt_next);
        assert!((dot(m.data[0], m.data[0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn step_at_dt_min_is_accepted_regardless_of_error() {
        let (grid, mat, mut m, mut params) = precessing_macrospin();
        let ctrl = AdaptiveSettings {
            max_err: 1e-12,
            dt_min: 1e-11,
            dt_max: 1e-11,
            ..AdaptiveSettings::default()
        };
        let mut s = RK45Scratch::new(grid);
        let r = step_llgs_rk45_adaptive(&grid, &mut m, &mut params, &mat, None, &ctrl, &mut s);
        assert_eq!(r.rejected, 0);
        assert_eq!(r.dt_used, 1e-11);
        assert!(r.err > ctrl.max_err);
        assert!(m.data[0][1] > 0.0);
    }

    #[test]
    fn short_remainder_below_dt_min_is_taken_as_requested() {
        let (grid, mat, mut m, mut params) = precessing_macrospin();
        params.dt = 2e-15;
        let ctrl = AdaptiveSettings {
            dt_min: 1e-13,
            ..AdaptiveSettings::default()
        };
        let mut s = RK45Scratch::new(grid);
        let r = step_llgs_rk45_adaptive(&grid, &mut m, &mut params, &mat, None, &ctrl, &mut s);
        assert_eq!(r.dt_used, 2e-15);
        let phi = m.data[0][1].atan2(m.data[0][0]);
        let expected = GAMMA_E_RAD_PER_S_T * 0.1 * 2e-15;
        assert!((phi - expected).abs() < 1e-9 * expected);
    }

    #[test]
    fn vacuum_cells_stay_zero_under_rk4() {
        let grid = Grid2D::new(2, 1, 2e-9, 2e-9, 2e-9);
        let mut mat = Material::uniform(2, 8e5, 13e-12, None, 0.0, [0.0, 0.0, 1.0], false);
        mat.ms[1] = 0.0;
        let mut m = VectorField2D::new(grid);
        m.data[1] = [0.0; 3];
        let params = LLGParams {
            gamma: GAMMA_E_RAD_PER_S_T,
            alpha: 0.1,
            dt: 1e-13,
            b_ext: [0.05, 0.0, 0.0],
        };
        let mut s = RK4Scratch::new(grid);
        for _ in 0..10 {
            step_llgs_rk4(&grid, &mut m, &params, &mat, None, &mut s);
        }
        assert_eq!(m.data[1], [0.0; 3]);
        assert!((dot(m.data[0], m.data[0]) - 1.0).abs() < 1e-12);
    }
}
