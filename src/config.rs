// src/config.rs
//
// Run configuration: everything the workflow needs, loaded from JSON and
// written back next to the results as config.json.
// Missing sections / fields fall back to Default.

use std::fs::{self, create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::grid::{Grid2D, Region};
use crate::imaging::ltem::LtemSettings;
use crate::imaging::mfm::MfmTip;
use crate::imaging::xray::Polarisation;
use crate::initial_states::Footprint;
use crate::llg::AdaptiveSettings;
use crate::minimize::MinimizeSettings;
use crate::params::{SpinTorque, GAMMA_E_RAD_PER_S_T};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub geometry: GeometryConfig,
    pub footprint: Footprint,
    pub domain: DomainConfig,
    pub material: MaterialConfig,
    pub fields: FieldConfig,
    pub dynamics: DynamicsConfig,
    pub minimizer: MinimizeSettings,
    pub run: RunConfig,
    pub imaging: ImagingConfig,
}

/// Region corners and cell size (m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub p1: [f64; 3],
    pub p2: [f64; 3],
    pub cell: [f64; 3],
}

/// Reversed domain between two walls, `x_range.0 <= x <= x_range.1` (m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainConfig {
    pub x_range: (f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialConfig {
    /// Saturation magnetisation inside the footprint (A/m).
    pub ms: f64,
    /// Exchange stiffness (J/m).
    pub aex: f64,
    /// Interfacial DMI constant (J/m²); `None` disables the term.
    pub dmi: Option<f64>,
    /// Uniaxial anisotropy constant (J/m³).
    pub ku1: f64,
    pub easy_axis: [f64; 3],
    pub demag: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    /// Applied field H (A/m).
    pub h_ext: [f64; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsConfig {
    pub gamma: f64,
    pub alpha: f64,
    /// Initial step for the adaptive integrator (s).
    pub dt: f64,
    /// Slonczewski current; `None` runs plain LLG.
    pub stt: Option<SpinTorque>,
    pub adaptive: AdaptiveSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub name: String,
    pub out_dir: PathBuf,
    /// Duration of the LLGS drive (s).
    pub t_drive: f64,
    pub n_frames: usize,
    pub skip_dynamics: bool,
    pub plots: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MfmConfig {
    /// Scan height above the film top surface (m).
    pub height: f64,
    pub tip: MfmTip,
    pub fwhm: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrayConfig {
    pub polarisation: Polarisation,
    pub fwhm: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingConfig {
    pub mfm: MfmConfig,
    pub xray: XrayConfig,
    pub ltem: LtemSettings,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            p1: [-100e-9, -50e-9, 0.0],
            p2: [100e-9, 50e-9, 2e-9],
            cell: [2.5e-9, 2.5e-9, 2e-9],
        }
    }
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            x_range: (-20e-9, 20e-9),
        }
    }
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            ms: 5.8e5,
            aex: 15e-12,
            dmi: Some(3e-3),
            ku1: 0.8e6,
            easy_axis: [0.0, 0.0, 1.0],
            demag: true,
        }
    }
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            h_ext: [0.0, 0.0, 1e4],
        }
    }
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        Self {
            gamma: GAMMA_E_RAD_PER_S_T,
            alpha: 0.3,
            dt: 1e-14,
            stt: Some(SpinTorque {
                j: 1e12,
                p: 0.4,
                lambda: 2.0,
                eps_prime: 0.0,
                mp: [0.0, 1.0, 0.0],
            }),
            adaptive: AdaptiveSettings::default(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "dwpair".to_string(),
            out_dir: PathBuf::from("runs"),
            t_drive: 0.2e-9,
            n_frames: 20,
            skip_dynamics: false,
            plots: true,
        }
    }
}

impl Default for MfmConfig {
    fn default() -> Self {
        Self {
            height: 30e-9,
            tip: MfmTip::default(),
            fwhm: Some(10e-9),
        }
    }
}

impl Default for XrayConfig {
    fn default() -> Self {
        Self {
            polarisation: Polarisation::Right,
            fwhm: Some(10e-9),
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            geometry: GeometryConfig::default(),
            footprint: Footprint::default(),
            domain: DomainConfig::default(),
            material: MaterialConfig::default(),
            fields: FieldConfig::default(),
            dynamics: DynamicsConfig::default(),
            minimizer: MinimizeSettings::default(),
            run: RunConfig::default(),
            imaging: ImagingConfig::default(),
        }
    }
}

fn check(ok: bool, what: impl FnOnce() -> String) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(SimError::InvalidParameter(what()))
    }
}

fn finite3(v: [f64; 3]) -> bool {
    v.iter().all(|x| x.is_finite())
}

impl SimConfig {
    /// Read and validate a JSON config.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let cfg: SimConfig = serde_json::from_str(&text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        let mut file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut file, self)?;
        file.flush()?;
        Ok(())
    }

    /// Write `config.json` into `out_dir`.
    pub fn write_to_dir(&self, out_dir: &Path) -> Result<()> {
        self.save(&out_dir.join("config.json"))
    }

    /// `<out_dir>/<name>`, where the drives of this run live.
    pub fn run_dir(&self) -> PathBuf {
        self.run.out_dir.join(&self.run.name)
    }

    /// The mesh described by `geometry`.
    pub fn grid(&self) -> Result<Grid2D> {
        Region::new(self.geometry.p1, self.geometry.p2)?.mesh(self.geometry.cell)
    }

    /// Check everything that would otherwise fail deep inside a run.
    pub fn validate(&self) -> Result<()> {
        self.grid()?;

        let m = &self.material;
        check(m.ms.is_finite() && m.ms >= 0.0, || format!("ms must be >= 0, got {}", m.ms))?;
        check(m.aex.is_finite() && m.aex >= 0.0, || format!("aex must be >= 0, got {}", m.aex))?;
        check(m.dmi.map_or(true, f64::is_finite), || "dmi must be finite".into())?;
        check(m.ku1.is_finite(), || "ku1 must be finite".into())?;
        check(
            finite3(m.easy_axis) && m.easy_axis.iter().any(|&c| c != 0.0),
            || "easy_axis must be a non-zero vector".into(),
        )?;
        check(finite3(self.fields.h_ext), || "h_ext must be finite".into())?;

        let f = &self.footprint;
        check(
            f.half_extent.iter().all(|&h| h.is_finite() && h > 0.0),
            || format!("footprint half_extent must be > 0, got {:?}", f.half_extent),
        )?;
        let (x0, x1) = self.domain.x_range;
        check(x0.is_finite() && x1.is_finite() && x0 <= x1, || {
            format!("domain x_range must be ordered, got ({x0}, {x1})")
        })?;

        let d = &self.dynamics;
        check(d.gamma > 0.0, || format!("gamma must be > 0, got {}", d.gamma))?;
        check(d.alpha >= 0.0, || format!("alpha must be >= 0, got {}", d.alpha))?;
        check(d.dt > 0.0, || format!("dt must be > 0, got {}", d.dt))?;
        if let Some(s) = &d.stt {
            check(s.j.is_finite(), || "stt.j must be finite".into())?;
            check(s.lambda >= 1.0, || format!("stt.lambda must be >= 1, got {}", s.lambda))?;
            check(
                finite3(s.mp) && s.mp.iter().any(|&c| c != 0.0),
                || "stt.mp must be a non-zero vector".into(),
            )?;
        }
        let a = &d.adaptive;
        check(a.max_err > 0.0 && a.headroom > 0.0, || "max_err and headroom must be > 0".into())?;
        check(a.dt_min > 0.0 && a.dt_min <= a.dt_max, || {
            format!("need 0 < dt_min <= dt_max, got {} / {}", a.dt_min, a.dt_max)
        })?;

        let r = &self.run;
        check(!r.name.is_empty() && !r.name.contains(['/', '\\']), || {
            format!("invalid run name {:?}", r.name)
        })?;
        if !r.skip_dynamics {
            check(r.t_drive > 0.0 && r.t_drive.is_finite(), || {
                format!("t_drive must be > 0, got {}", r.t_drive)
            })?;
            check(r.n_frames > 0, || "n_frames must be > 0".into())?;
        }

        let im = &self.imaging;
        check(im.mfm.height >= 0.0, || "mfm height must be >= 0".into())?;
        check(im.mfm.tip.k_spring > 0.0, || "mfm k_spring must be > 0".into())?;
        check(im.ltem.voltage > 0.0, || "ltem voltage must be > 0".into())?;
        check(im.ltem.kc >= 0.0, || "ltem kc must be >= 0".into())?;
        Ok(())
    }
}
