// src/trajectory.rs
//
// Loader for run directories written by the drivers.
//
//   Run::open(<out>/<name>)          -> drives in numeric order
//   Drive::open(<...>/drive-<n>)     -> info.json + table.csv, frames on demand

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::driver::{DriveInfo, TABLE_HEADER};
use crate::error::{Result, SimError};
use crate::ovf::read_ovf;
use crate::vector_field::VectorField2D;

/// One row of `table.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TableRow {
    pub t: f64,
    pub mx: f64,
    pub my: f64,
    pub mz: f64,
    pub e_total: f64,
    pub e_exchange: f64,
    pub e_dmi: f64,
    pub e_anisotropy: f64,
    pub e_zeeman: f64,
    pub e_demag: f64,
}

impl TableRow {
    /// Value of a column by its header name.
    pub fn column(&self, name: &str) -> Option<f64> {
        Some(match name {
            "t" => self.t,
            "mx" => self.mx,
            "my" => self.my,
            "mz" => self.mz,
            "E_total" => self.e_total,
            "E_exchange" => self.e_exchange,
            "E_dmi" => self.e_dmi,
            "E_anisotropy" => self.e_anisotropy,
            "E_zeeman" => self.e_zeeman,
            "E_demag" => self.e_demag,
            _ => return None,
        })
    }
}

pub fn read_table(path: &Path) -> Result<Vec<TableRow>> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines();
    match lines.next() {
        Some(h) if h.trim() == TABLE_HEADER => {}
        other => {
            return Err(SimError::Table(format!(
                "{}: unexpected header {:?}",
                path.display(),
                other
            )))
        }
    }

    let mut rows = Vec::new();
    for (lineno, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let vals: Vec<f64> = line
            .split(',')
            .map(|s| s.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| SimError::Table(format!("{} line {}: {e}", path.display(), lineno + 2)))?;
        let [t, mx, my, mz, e_total, e_exchange, e_dmi, e_anisotropy, e_zeeman, e_demag] = vals[..] else {
            return Err(SimError::Table(format!(
                "{} line {}: expected 10 columns, got {}",
                path.display(),
                lineno + 2,
                vals.len()
            )));
        };
        rows.push(TableRow {
            t,
            mx,
            my,
            mz,
            e_total,
            e_exchange,
            e_dmi,
            e_anisotropy,
            e_zeeman,
            e_demag,
        });
    }
    Ok(rows)
}

#[derive(Debug, Clone)]
pub struct Drive {
    pub dir: PathBuf,
    pub info: DriveInfo,
    pub table: Vec<TableRow>,
}

impl Drive {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let info_path = dir.join("info.json");
        if !info_path.is_file() {
            return Err(SimError::Table(format!(
                "{}: no info.json (drive incomplete or interrupted)",
                dir.display()
            )));
        }
        let info: DriveInfo = serde_json::from_str(&fs::read_to_string(&info_path)?)?;
        let table = read_table(&dir.join("table.csv"))?;
        if table.len() != info.n_frames {
            return Err(SimError::Table(format!(
                "{}: {} rows for {} frames",
                dir.display(),
                table.len(),
                info.n_frames
            )));
        }
        Ok(Self { dir, info, table })
    }

    /// Frames after the initial state (`m0` is not counted).
    pub fn n_frames(&self) -> usize {
        self.info.n_frames
    }

    /// Frame `k`; `0` is the state before the drive.
    pub fn frame(&self, k: usize) -> Result<VectorField2D> {
        if k > self.n_frames() {
            return Err(SimError::InvalidParameter(format!(
                "frame {k} out of range (drive has {} frames)",
                self.n_frames()
            )));
        }
        read_ovf(&self.dir.join(format!("m{k}.ovf")))
    }

    pub fn last_frame(&self) -> Result<VectorField2D> {
        self.frame(self.n_frames())
    }

    /// Table column by header name, one value per frame.
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        self.table
            .iter()
            .map(|r| {
                r.column(name)
                    .ok_or_else(|| SimError::Table(format!("no column {name:?}")))
            })
            .collect()
    }
}

/// All drives of one system, `<out>/<name>`.
#[derive(Debug, Clone)]
pub struct Run {
    pub dir: PathBuf,
    pub drives: Vec<Drive>,
}

impl Run {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut numbered: Vec<(usize, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(n) = path
                .file_name()
                .and_then(|f| f.to_str())
                .and_then(|s| s.strip_prefix("drive-"))
                .and_then(|s| s.parse::<usize>().ok())
            {
                numbered.push((n, path));
            }
        }
        numbered.sort_by_key(|(n, _)| *n);

        let mut drives = Vec::with_capacity(numbered.len());
        for (n, p) in numbered {
            if !p.join("info.json").is_file() {
                warn!(drive = n, dir = %p.display(), "skipping incomplete drive");
                continue;
            }
            drives.push(Drive::open(p)?);
        }
        Ok(Self { dir, drives })
    }

    pub fn drive(&self, n: usize) -> Option<&Drive> {
        self.drives.iter().find(|d| d.info.drive_number == n)
    }

    pub fn last(&self) -> Option<&Drive> {
        self.drives.last()
    }
}
