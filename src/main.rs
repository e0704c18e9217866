// src/main.rs
//
// dwpair-sim: relax a thin-film domain-wall pair, drive it with a
// spin-polarised current and render synthetic MFM / X-ray / LTEM images.
//
// Examples:
//
//   cargo run --release -- --write-default-config dwpair.json
//   cargo run --release -- --config dwpair.json --out runs --name film_a
//   cargo run --release -- --t-drive 5e-11 --n-frames 10 --no-plots
//   cargo run --release -- --skip-dynamics
//
// Logs go to stdout at INFO level.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use dwpair_sim::config::SimConfig;
use dwpair_sim::workflow::run_workflow;

#[derive(Parser, Debug)]
#[command(name = "dwpair-sim")]
#[command(about = "Domain-wall-pair micromagnetics with synthetic MFM, X-ray and LTEM imaging")]
#[command(version)]
struct Args {
    /// JSON config file (defaults are used for anything missing)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory (overrides run.out_dir)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// System name, used as the run sub-directory (overrides run.name)
    #[arg(long)]
    name: Option<String>,

    /// LLGS drive duration in seconds (overrides run.t_drive)
    #[arg(long)]
    t_drive: Option<f64>,

    /// Frames saved during the drive (overrides run.n_frames)
    #[arg(long)]
    n_frames: Option<usize>,

    /// Stop after relaxation; images are taken from the relaxed state
    #[arg(long)]
    skip_dynamics: bool,

    /// Do not write PNG plots
    #[arg(long)]
    no_plots: bool,

    /// Write the default config to this path and exit
    #[arg(long)]
    write_default_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        SimConfig::default()
            .save(path)
            .with_context(|| format!("Failed to write default config to {:?}", path))?;
        info!(path = %path.display(), "default config written");
        return Ok(());
    }

    let mut cfg = match &args.config {
        Some(path) => SimConfig::load(path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => SimConfig::default(),
    };

    if let Some(out) = args.out {
        cfg.run.out_dir = out;
    }
    if let Some(name) = args.name {
        cfg.run.name = name;
    }
    if let Some(t) = args.t_drive {
        cfg.run.t_drive = t;
    }
    if let Some(n) = args.n_frames {
        cfg.run.n_frames = n;
    }
    if args.skip_dynamics {
        cfg.run.skip_dynamics = true;
    }
    if args.no_plots {
        cfg.run.plots = false;
    }
    cfg.validate().context("Invalid configuration")?;

    let summary = run_workflow(&cfg).context("Workflow failed")?;

    let relax = &summary.relax.info;
    info!(
        energy = relax.final_energy.total,
        mz = relax.final_m[2],
        converged = relax.minimize.map_or(false, |r| r.converged),
        "relaxed state"
    );
    if let Some(d) = &summary.dynamics {
        info!(
            t_end = d.info.t_end,
            steps = d.info.steps,
            rejected = d.info.rejected,
            mz = d.info.final_m[2],
            "dynamics"
        );
    }
    println!("{}", summary.run_dir.display());
    Ok(())
}
