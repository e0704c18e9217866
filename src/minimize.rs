// src/minimize.rs
//
// Damping-only energy minimiser (the ground-state driver).
// One effective-field build per iteration (≈ one demag FFT per iter).
//
// Update direction: d = (m × B) × m = B - m (m·B)
// i.e. the damping-only descent direction (up to a scalar factor).
//
// Stop: max |m × B| < torque_threshold (Tesla), or max dM stays below
// dm_stop for dm_samples iterations, or the mean torque plateaus.

use std::collections::VecDeque;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::effective_field::{build_b_eff_masked, FieldMask};
use crate::grid::Grid2D;
use crate::params::{LLGParams, Material};
use crate::vec3::cross;
use crate::vector_field::VectorField2D;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimizeSettings {
    pub torque_threshold: f64, // Tesla
    pub max_iters: usize,

    // Pseudo-step size for descent (dimensionless scale multiplying d, in 1/T).
    pub lambda0: f64,
    pub lambda_min: f64,
    pub lambda_max: f64,
    pub grow: f64,
    pub shrink: f64,

    // Stall detection: mean torque fails to improve by stall_rel for stall_iters iterations.
    pub stall_iters: usize,
    pub stall_rel: f64,
    pub min_iters_before_stall: usize,

    /// Converged when the last `dm_samples` values of max dM are all below this.
    pub dm_stop: Option<f64>,
    pub dm_samples: usize,
    pub dm_min_iters: usize,
    /// Mean torque (Tesla) that must also hold for a dM stop to count as converged.
    pub dm_torque_gate: Option<f64>,

    /// Rayon parallelism for the per-cell update pass.
    pub parallel: bool,

    /// Log progress every N iterations (0 disables).
    pub log_every: usize,
}

impl Default for MinimizeSettings {
    fn default() -> Self {
        Self {
            torque_threshold: 1e-4,
            max_iters: 50_000,

            lambda0: 2e-2,
            lambda_min: 1e-5,
            lambda_max: 5e-2,
            grow: 1.05,
            shrink: 0.8,

            stall_iters: 2000,
            stall_rel: 1e-4,
            min_iters_before_stall: 500,

            dm_stop: Some(1e-7),
            dm_samples: 10,
            dm_min_iters: 50,
            dm_torque_gate: Some(1e-3),

            parallel: false,

            log_every: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MinimizeReport {
    pub iters: usize,
    pub final_torque: f64,
    pub final_tmean: f64,
    pub final_max_dm: f64,
    pub final_lambda: f64,
    pub converged: bool,
    pub dm_converged: bool,
    pub stalled: bool,
}

#[derive(Clone, Copy, Default)]
struct PassStats {
    tmax: f64,
    tsum: f64,
    max_dm: f64,
}

impl PassStats {
    fn merge(self, o: PassStats) -> PassStats {
        PassStats {
            tmax: self.tmax.max(o.tmax),
            tsum: self.tsum + o.tsum,
            max_dm: self.max_dm.max(o.max_dm),
        }
    }
}

/// Update one chunk of cells in place and return its stats.
fn descend_chunk(m: &mut [[f64; 3]], b: &[[f64; 3]], ms: &[f64], lambda: f64) -> PassStats {
    let mut st = PassStats::default();
    for ((mi, bi), &w) in m.iter_mut().zip(b.iter()).zip(ms.iter()) {
        if w <= 0.0 {
            continue;
        }
        let m0 = *mi;

        // torque = m × B
        let t = cross(m0, *bi);
        let tmag = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
        st.tsum += tmag;
        st.tmax = st.tmax.max(tmag);

        // descent direction: d = (m × B) × m
        let d = cross(t, m0);
        let mut x = m0[0] + lambda * d[0];
        let mut y = m0[1] + lambda * d[1];
        let mut z = m0[2] + lambda * d[2];

        let n2 = x * x + y * y + z * z;
        if n2 > 0.0 {
            let inv = 1.0 / n2.sqrt();
            x *= inv;
            y *= inv;
            z *= inv;
        }

        let dx = x - m0[0];
        let dy = y - m0[1];
        let dz = z - m0[2];
        st.max_dm = st.max_dm.max((dx * dx + dy * dy + dz * dz).sqrt());

        *mi = [x, y, z];
    }
    st
}

/// Minimise in place. Non-convergence is reported, not an error.
pub fn minimize_damping_only(
    grid: &Grid2D,
    m: &mut VectorField2D,
    params: &LLGParams,
    material: &Material,
    mask: FieldMask,
    settings: &MinimizeSettings,
) -> MinimizeReport {
    let mut b_eff = VectorField2D::zeros(*grid);
    const CHUNK: usize = 2048;

    let n_magnetic = material.ms.iter().filter(|&&w| w > 0.0).count();
    let mut lambda = settings.lambda0;
    let mut t_prev_mean = f64::INFINITY;
    let mut stall_count = 0usize;
    let mut dm_hist: VecDeque<f64> = VecDeque::new();
    let mut last = PassStats {
        tmax: f64::INFINITY,
        tsum: f64::INFINITY,
        max_dm: f64::INFINITY,
    };
    let mut last_tmean = f64::INFINITY;

    let report = |iters: usize, st: PassStats, tmean: f64, lambda: f64, converged, dm_converged, stalled| MinimizeReport {
        iters,
        final_torque: st.tmax,
        final_tmean: tmean,
        final_max_dm: st.max_dm,
        final_lambda: lambda,
        converged,
        dm_converged,
        stalled,
    };

    if n_magnetic == 0 {
        return report(0, PassStats::default(), 0.0, lambda, true, false, false);
    }

    for it in 0..settings.max_iters {
        build_b_eff_masked(grid, m, &mut b_eff, params, material, mask);

        // Deterministic reduction: per-chunk stats merged in chunk order on both paths.
        let chunks: Vec<PassStats> = if settings.parallel {
            let lambda_step = lambda;
            m.data
                .par_chunks_mut(CHUNK)
                .zip(b_eff.data.par_chunks(CHUNK))
                .zip(material.ms.par_chunks(CHUNK))
                .map(|((mc, bc), wc)| descend_chunk(mc, bc, wc, lambda_step))
                .collect()
        } else {
            m.data
                .chunks_mut(CHUNK)
                .zip(b_eff.data.chunks(CHUNK))
                .zip(material.ms.chunks(CHUNK))
                .map(|((mc, bc), wc)| descend_chunk(mc, bc, wc, lambda))
                .collect()
        };
        let st = chunks.into_iter().fold(PassStats::default(), PassStats::merge);

        let tmean = st.tsum / n_magnetic as f64;
        last = st;
        last_tmean = tmean;

        if settings.log_every > 0 && it % settings.log_every == 0 {
            debug!(it, tmax = st.tmax, tmean, lambda, "minimize");
        }

        if st.tmax < settings.torque_threshold {
            return report(it + 1, st, tmean, lambda, true, false, false);
        }

        if let Some(dm_stop) = settings.dm_stop {
            if it + 1 >= settings.dm_min_iters {
                let n = settings.dm_samples.max(1);
                dm_hist.push_back(st.max_dm);
                while dm_hist.len() > n {
                    dm_hist.pop_front();
                }
                if dm_hist.len() == n && dm_hist.iter().all(|&v| v < dm_stop) {
                    let torque_ok = settings.dm_torque_gate.map_or(true, |g| tmean <= g);
                    return report(it + 1, st, tmean, lambda, torque_ok, true, false);
                }
            }
        }

        // Adapt lambda on the mean torque (no extra field builds)
        if tmean < t_prev_mean {
            lambda = (lambda * settings.grow).min(settings.lambda_max);
        } else {
            lambda = (lambda * settings.shrink).max(settings.lambda_min);
        }

        if it + 1 >= settings.min_iters_before_stall && t_prev_mean.is_finite() {
            let need = settings.stall_rel * t_prev_mean.abs().max(1e-30);
            if t_prev_mean - tmean <= need {
                stall_count += 1;
            } else {
                stall_count = 0;
            }
        }
        if stall_count >= settings.stall_iters {
            return report(it + 1, st, tmean, lambda, false, false, true);
        }

        t_prev_mean = tmean;
    }

    report(settings.max_iters, last, last_tmean, lambda, false, false, false)
}
