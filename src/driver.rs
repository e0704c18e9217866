// src/driver.rs
//
// Drivers advance a System and record what they did:
//
//   <out>/<system name>/drive-<n>/
//       info.json   DriveInfo
//       m0.ovf      state before the drive
//       m<k>.ovf    frames k = 1..=n_frames
//       table.csv   one row per frame
//
// `n` is the next free drive index under the system directory.

use std::fs::{self, create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::effective_field::FieldMask;
use crate::energy::EnergyBreakdown;
use crate::error::{Result, SimError};
use crate::grid::Grid2D;
use crate::llg::{step_llgs_rk45_adaptive, AdaptiveSettings, RK45Scratch};
use crate::minimize::{minimize_damping_only, MinimizeReport, MinimizeSettings};
use crate::ovf::{write_ovf, OvfFormat, OvfMeta};
use crate::system::System;

pub const TABLE_HEADER: &str = "t,mx,my,mz,E_total,E_exchange,E_dmi,E_anisotropy,E_zeeman,E_demag";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverKind {
    MinDriver,
    TimeDriver,
}

/// Contents of `info.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveInfo {
    pub drive_number: usize,
    pub driver: DriverKind,
    pub system: String,
    pub grid: Grid2D,
    pub n_frames: usize,
    /// System time at the start and end of the drive (s).
    pub t_start: f64,
    pub t_end: f64,
    pub final_energy: EnergyBreakdown,
    pub final_m: [f64; 3],
    /// MinDriver only.
    pub minimize: Option<MinimizeReport>,
    /// TimeDriver only: accepted and rejected RK45 steps.
    pub steps: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone)]
pub struct DriveSummary {
    pub dir: PathBuf,
    pub info: DriveInfo,
}

/// Next free `drive-<n>` directory under `<out>/<name>`, created empty.
pub fn next_drive_dir(out: &Path, name: &str) -> Result<(usize, PathBuf)> {
    let system_dir = out.join(name);
    create_dir_all(&system_dir)?;

    let mut next = 0usize;
    for entry in fs::read_dir(&system_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let fname = entry.file_name();
        if let Some(n) = fname
            .to_str()
            .and_then(|s| s.strip_prefix("drive-"))
            .and_then(|s| s.parse::<usize>().ok())
        {
            next = next.max(n + 1);
        }
    }

    let dir = system_dir.join(format!("drive-{next}"));
    create_dir_all(&dir)?;
    Ok((next, dir))
}

struct FrameWriter {
    dir: PathBuf,
    table: BufWriter<File>,
    frames: usize,
}

impl FrameWriter {
    fn create(dir: &Path, sys: &System) -> Result<Self> {
        write_ovf(
            &dir.join("m0.ovf"),
            &sys.m,
            &OvfMeta::magnetization().with_total_sim_time(sys.t),
            OvfFormat::Text,
        )?;
        let mut table = BufWriter::new(File::create(dir.join("table.csv"))?);
        writeln!(table, "{TABLE_HEADER}")?;
        Ok(Self {
            dir: dir.to_path_buf(),
            table,
            frames: 0,
        })
    }

    /// Save the current state as the next frame and append its table row.
    fn record(&mut self, sys: &System) -> Result<(EnergyBreakdown, [f64; 3])> {
        self.frames += 1;
        write_ovf(
            &self.dir.join(format!("m{}.ovf", self.frames)),
            &sys.m,
            &OvfMeta::magnetization().with_total_sim_time(sys.t),
            OvfFormat::Text,
        )?;

        let e = sys.energy();
        let avg = sys.average_m();
        writeln!(
            self.table,
            "{:.16e},{:.16e},{:.16e},{:.16e},{:.16e},{:.16e},{:.16e},{:.16e},{:.16e},{:.16e}",
            sys.t, avg[0], avg[1], avg[2], e.total, e.exchange, e.dmi, e.anisotropy, e.zeeman, e.demag
        )?;
        Ok((e, avg))
    }

    fn finish(mut self, info: &DriveInfo) -> Result<()> {
        self.table.flush()?;
        let mut f = BufWriter::new(File::create(self.dir.join("info.json"))?);
        serde_json::to_writer_pretty(&mut f, info)?;
        f.flush()?;
        Ok(())
    }
}

/// Energy minimisation to the nearest local minimum.
#[derive(Debug, Clone, Default)]
pub struct MinDriver {
    pub settings: MinimizeSettings,
}

impl MinDriver {
    pub fn new(settings: MinimizeSettings) -> Self {
        Self { settings }
    }

    pub fn drive(&self, sys: &mut System, out: &Path) -> Result<DriveSummary> {
        let (drive_number, dir) = next_drive_dir(out, &sys.name)?;
        info!(system = %sys.name, drive = drive_number, dir = %dir.display(), "MinDriver start");

        let mut frames = FrameWriter::create(&dir, sys)?;
        let t_start = sys.t;

        let report = minimize_damping_only(
            &sys.grid,
            &mut sys.m,
            &sys.params,
            &sys.material,
            FieldMask::Full,
            &self.settings,
        );
        if report.converged {
            info!(
                iters = report.iters,
                torque = report.final_torque,
                "minimisation converged"
            );
        } else {
            warn!(
                iters = report.iters,
                torque = report.final_torque,
                stalled = report.stalled,
                "minimisation did not converge"
            );
        }

        let (final_energy, final_m) = frames.record(sys)?;
        let info = DriveInfo {
            drive_number,
            driver: DriverKind::MinDriver,
            system: sys.name.clone(),
            grid: sys.grid,
            n_frames: 1,
            t_start,
            t_end: sys.t,
            final_energy,
            final_m,
            minimize: Some(report),
            steps: 0,
            rejected: 0,
        };
        frames.finish(&info)?;
        info!(energy = final_energy.total, "MinDriver done");

        Ok(DriveSummary { dir, info })
    }
}

/// LLGS time integration with the adaptive Dormand–Prince stepper.
#[derive(Debug, Clone, Default)]
pub struct TimeDriver {
    pub settings: AdaptiveSettings,
}

impl TimeDriver {
    pub fn new(settings: AdaptiveSettings) -> Self {
        Self { settings }
    }

    /// Integrate for `t` seconds, saving `n` evenly spaced frames.
    pub fn drive(&self, sys: &mut System, t: f64, n: usize, out: &Path) -> Result<DriveSummary> {
        if !(t > 0.0) || !t.is_finite() {
            return Err(SimError::InvalidParameter(format!("drive time must be > 0, got {t}")));
        }
        if n == 0 {
            return Err(SimError::InvalidParameter("number of frames must be > 0".into()));
        }
        let ctrl = self.settings;
        if !(ctrl.dt_min > 0.0 && ctrl.dt_min <= ctrl.dt_max && ctrl.max_err > 0.0) {
            return Err(SimError::InvalidParameter(format!("bad adaptive settings {ctrl:?}")));
        }

        let (drive_number, dir) = next_drive_dir(out, &sys.name)?;
        info!(
            system = %sys.name,
            drive = drive_number,
            t,
            n,
            current = sys.stt.as_ref().map_or(0.0, |s| s.j),
            "TimeDriver start"
        );

        let mut frames = FrameWriter::create(&dir, sys)?;
        let mut scratch = RK45Scratch::new(sys.grid);
        let t_start = sys.t;
        let mut steps = 0usize;
        let mut rejected = 0usize;
        let mut last = (EnergyBreakdown::default(), [0.0; 3]);

        for k in 1..=n {
            let t_frame = t_start + t * k as f64 / n as f64;

            while sys.t < t_frame {
                let remaining = t_frame - sys.t;
                let wanted = sys.params.dt;
                let clamped = wanted >= remaining;
                if clamped {
                    sys.params.dt = remaining;
                }

                let r = step_llgs_rk45_adaptive(
                    &sys.grid,
                    &mut sys.m,
                    &mut sys.params,
                    &sys.material,
                    sys.stt.as_ref(),
                    &ctrl,
                    &mut scratch,
                );
                steps += 1;
                rejected += r.rejected;

                if clamped && r.rejected == 0 {
                    // landed on the frame time: snap, and resume from the unclamped step size
                    sys.t = t_frame;
                    sys.params.dt = wanted.max(r.dt_next).min(ctrl.dt_max);
                } else {
                    sys.t = (sys.t + r.dt_used).min(t_frame);
                }
            }

            last = frames.record(sys)?;
            debug!(frame = k, t = sys.t, mz = last.1[2], dt = sys.params.dt, "frame");
        }

        let info = DriveInfo {
            drive_number,
            driver: DriverKind::TimeDriver,
            system: sys.name.clone(),
            grid: sys.grid,
            n_frames: n,
            t_start,
            t_end: sys.t,
            final_energy: last.0,
            final_m: last.1,
            minimize: None,
            steps,
            rejected,
        };
        frames.finish(&info)?;
        info!(steps, rejected, t_end = sys.t, "TimeDriver done");

        Ok(DriveSummary { dir, info })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{LLGParams, Material, GAMMA_E_RAD_PER_S_T};

    fn macrospin() -> System {
        let grid = Grid2D::new(1, 1, 2e-9, 2e-9, 2e-9);
        let mat = Material::uniform(1, 8e5, 0.0, None, 0.0, [0.0, 0.0, 1.0], false);
        let params = LLGParams {
            gamma: GAMMA_E_RAD_PER_S_T,
            alpha: 0.1,
            dt: 1e-13,
            b_ext: [0.0, 0.0, 0.1],
        };
        let mut sys = System::new("macro", grid, mat, params).unwrap();
        sys.set_m_fn(|_| [1.0, 0.0, 0.0]);
        sys
    }

    #[test]
    fn drive_numbers_increase() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _) = next_drive_dir(dir.path(), "s").unwrap();
        let (b, pb) = next_drive_dir(dir.path(), "s").unwrap();
        assert_eq!((a, b), (0, 1));
        assert!(pb.ends_with("s/drive-1"));
    }

    #[test]
    fn time_drive_lands_on_frame_times() {
        let dir = tempfile::tempdir().unwrap();
        let mut sys = macrospin();
        let d = TimeDriver::default();
        let s = d.drive(&mut sys, 5e-11, 4, dir.path()).unwrap();
        assert_eq!(sys.t, 5e-11);
        assert_eq!(s.info.n_frames, 4);
        for k in 0..=4 {
            assert!(s.dir.join(format!("m{k}.ovf")).exists());
        }
        let table = fs::read_to_string(s.dir.join("table.csv")).unwrap();
        assert_eq!(table.lines().count(), 5);
        assert_eq!(table.lines().next(), Some(TABLE_HEADER));

        // time accumulates across drives
        d.drive(&mut sys, 1e-11, 1, dir.path()).unwrap();
        assert!((sys.t - 6e-11).abs() < 1e-24);
    }

    #[test]
    fn frame_remainder_below_dt_min_advances_m_by_the_remainder() {
        let dir = tempfile::tempdir().unwrap();
        let mut sys = macrospin();
        sys.params.alpha = 0.0;
        sys.params.dt = 1e-13;
        let d = TimeDriver::new(AdaptiveSettings {
            dt_min: 1e-13,
            dt_max: 1e-13,
            ..AdaptiveSettings::default()
        });
        let s = d.drive(&mut sys, 1.5e-13, 1, dir.path()).unwrap();
        assert_eq!(sys.t, 1.5e-13);
        assert_eq!(s.info.steps, 2);

        // free precession about +z: the in-plane angle is γ B t
        let v = sys.m.data[0];
        let phi = v[1].atan2(v[0]);
        let expected = GAMMA_E_RAD_PER_S_T * 0.1 * 1.5e-13;
        assert!((phi - expected).abs() < 1e-9 * expected, "phi = {phi}, expected {expected}");
    }

    #[test]
    fn invalid_time_drive_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let mut sys = macrospin();
        let d = TimeDriver::default();
        assert!(matches!(d.drive(&mut sys, 0.0, 3, dir.path()), Err(SimError::InvalidParameter(_))));
        assert!(matches!(d.drive(&mut sys, 1e-12, 0, dir.path()), Err(SimError::InvalidParameter(_))));
    }

    #[test]
    fn min_drive_writes_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut sys = macrospin();
        let s = MinDriver::default().drive(&mut sys, dir.path()).unwrap();
        assert_eq!(s.info.driver, DriverKind::MinDriver);
        assert!(s.info.minimize.map_or(false, |r| r.converged));
        assert!(sys.m.data[0][2] > 0.999);
        assert!(s.dir.join("m1.ovf").exists());
        assert!(!s.dir.join("m2.ovf").exists());
        assert_eq!(sys.t, 0.0);
    }
}
