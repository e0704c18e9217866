// src/workflow.rs
//
// The complete domain-wall-pair pipeline, driven by a SimConfig:
//
//   mesh -> Ms footprint -> DW-pair initial state -> MinDriver
//        -> TimeDriver (LLGS) -> reload trajectory -> MFM / X-ray / LTEM images
//
// Output tree:
//   <out_dir>/<name>/config.json
//   <out_dir>/<name>/drive-0/      relaxation
//   <out_dir>/<name>/drive-1/      dynamics (unless skipped)
//   <out_dir>/<name>/images/       PNGs + imaging.json

use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::config::SimConfig;
use crate::driver::{DriveSummary, MinDriver, TimeDriver};
use crate::error::Result;
use crate::geometry::{mask_bbox, mask_from_ms};
use crate::imaging::{ltem, mfm, xray};
use crate::initial_states::DomainWallPair;
use crate::params::{LLGParams, Material};
use crate::scalar_field::ScalarField2D;
use crate::system::System;
use crate::trajectory::Drive;
use crate::vector_field::VectorField2D;
use crate::visualisation::{save_energy_plot, save_m_avg_plot, save_mz_map, save_scalar_map};

/// Mesh, material and initial state from the config (nothing is written).
pub fn build_system(cfg: &SimConfig) -> Result<System> {
    cfg.validate()?;
    let grid = cfg.grid()?;
    let mc = &cfg.material;

    let material = Material::uniform(
        grid.n_cells(),
        mc.ms,
        mc.aex,
        mc.dmi,
        mc.ku1,
        mc.easy_axis,
        mc.demag,
    );
    let d = &cfg.dynamics;
    let params = LLGParams::with_h_ext(d.gamma, d.alpha, d.dt, cfg.fields.h_ext);

    let mut sys = System::new(cfg.run.name.clone(), grid, material, params)?;
    let footprint = cfg.footprint;
    sys.set_ms_fn(|p| footprint.ms_at(p, mc.ms))?;

    let dw = DomainWallPair {
        x_range: cfg.domain.x_range,
        easy_axis: mc.easy_axis,
    };
    sys.set_m_fn(|p| dw.direction_at(p));
    sys.stt = d.stt;

    let bbox = mask_bbox(&mask_from_ms(&sys.material.ms), grid.nx, grid.ny);
    info!(
        nx = grid.nx,
        ny = grid.ny,
        magnetic_cells = sys.magnetic_cells(),
        footprint_cells = ?bbox,
        "system built"
    );
    Ok(sys)
}

#[derive(Debug, Clone, Serialize)]
pub struct DefocusRange {
    pub defocus: f64,
    pub min: f64,
    pub max: f64,
}

/// Value ranges of the synthetic images, written to `imaging.json`.
#[derive(Debug, Clone, Serialize)]
pub struct ImagingSummary {
    pub source: PathBuf,
    pub mfm_phase: (f64, f64),
    pub xray_contrast: (f64, f64),
    pub ltem_phase: (f64, f64),
    pub ltem_intensity: Vec<DefocusRange>,
}

fn range(f: &ScalarField2D) -> (f64, f64) {
    f.min_max().unwrap_or((0.0, 0.0))
}

/// Compute every image for snapshot `m` and write them to `dir`.
pub fn render_images(
    cfg: &SimConfig,
    m: &VectorField2D,
    ms: &[f64],
    source: &Path,
    dir: &Path,
    plots: bool,
) -> Result<ImagingSummary> {
    create_dir_all(dir)?;
    let im = &cfg.imaging;

    let phase = mfm::phase_shift(m, ms, im.mfm.height, &im.mfm.tip, im.mfm.fwhm);
    let contrast = xray::holography_contrast(m, ms, im.xray.polarisation, im.xray.fwhm);
    let ltem_phase = ltem::magnetic_phase(m, ms, im.ltem.kc);

    let mut ltem_intensity = Vec::with_capacity(im.ltem.defocus.len());
    for (k, &df) in im.ltem.defocus.iter().enumerate() {
        let img = ltem::defocus_image(&ltem_phase, im.ltem.voltage, df, im.ltem.cs);
        let (min, max) = range(&img);
        ltem_intensity.push(DefocusRange { defocus: df, min, max });
        if plots {
            let title = format!("LTEM |psi|^2, defocus {:.2} mm", df * 1e3);
            save_scalar_map(&img, &title, &dir.join(format!("ltem_defocus_{k}.png")), false)?;
        }
    }

    if plots {
        save_mz_map(m, "m_z", &dir.join("mz.png"))?;
        save_scalar_map(&phase, "MFM phase shift (rad)", &dir.join("mfm_phase.png"), true)?;
        save_scalar_map(&contrast, "X-ray holography contrast", &dir.join("xray_contrast.png"), true)?;
        save_scalar_map(&ltem_phase, "LTEM magnetic phase (rad)", &dir.join("ltem_phase.png"), true)?;

        let saxs = xray::saxs(&contrast);
        let peak = saxs.max_abs().max(f64::MIN_POSITIVE);
        let log_saxs = ScalarField2D {
            grid: saxs.grid,
            data: saxs.data.iter().map(|v| (v / peak).max(1e-12).log10()).collect(),
        };
        save_scalar_map(&log_saxs, "SAXS log10(I / I_max)", &dir.join("xray_saxs.png"), false)?;
    }

    let summary = ImagingSummary {
        source: source.to_path_buf(),
        mfm_phase: range(&phase),
        xray_contrast: range(&contrast),
        ltem_phase: range(&ltem_phase),
        ltem_intensity,
    };
    let mut f = BufWriter::new(File::create(dir.join("imaging.json"))?);
    serde_json::to_writer_pretty(&mut f, &summary)?;
    f.flush()?;
    Ok(summary)
}

#[derive(Debug, Clone)]
pub struct WorkflowSummary {
    pub run_dir: PathBuf,
    pub relax: DriveSummary,
    pub dynamics: Option<DriveSummary>,
    pub imaging: ImagingSummary,
}

/// Run the whole pipeline. Each stage's output is on disk before the next starts.
pub fn run_workflow(cfg: &SimConfig) -> Result<WorkflowSummary> {
    let mut sys = build_system(cfg)?;
    let run_dir = cfg.run_dir();
    create_dir_all(&run_dir)?;
    cfg.write_to_dir(&run_dir)?;
    info!(dir = %run_dir.display(), "run directory ready");

    let out = cfg.run.out_dir.as_path();
    let relax = MinDriver::new(cfg.minimizer.clone()).drive(&mut sys, out)?;

    let dynamics = if cfg.run.skip_dynamics {
        info!("dynamics skipped");
        None
    } else {
        let td = TimeDriver::new(cfg.dynamics.adaptive);
        Some(td.drive(&mut sys, cfg.run.t_drive, cfg.run.n_frames, out)?)
    };

    // Everything downstream works from the drives saved by this invocation;
    // the run directory may also hold drives from earlier ones.
    let relaxed = Drive::open(&relax.dir)?;
    let driven = dynamics.as_ref().map(|d| Drive::open(&d.dir)).transpose()?;
    let images = run_dir.join("images");
    create_dir_all(&images)?;

    if cfg.run.plots {
        save_mz_map(&relaxed.last_frame()?, "relaxed m_z", &images.join("relaxed_mz.png"))?;
        if let Some(drive) = &driven {
            save_m_avg_plot(&drive.table, &images.join("m_avg.png"))?;
            save_energy_plot(&drive.table, &images.join("energy.png"))?;
        }
    }

    let last = driven.as_ref().unwrap_or(&relaxed);
    let snapshot = last.last_frame()?;
    let source = last.dir.join(format!("m{}.ovf", last.n_frames()));
    let imaging = render_images(cfg, &snapshot, &sys.material.ms, &source, &images, cfg.run.plots)?;
    info!(
        mfm = ?imaging.mfm_phase,
        xray = ?imaging.xray_contrast,
        ltem = ?imaging.ltem_phase,
        "images written"
    );

    Ok(WorkflowSummary {
        run_dir,
        relax,
        dynamics,
        imaging,
    })
}
