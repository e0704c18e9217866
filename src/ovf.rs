// src/ovf.rs
//
// OOMMF OVF 2.0 rectangular-mesh files for magnetisation snapshots.
//  - text data (MuMax-like, lossless enough for round trips)
//  - binary4 data (compact; little-endian f32 after the 1234567.0 check value)
//
// The reader accepts both encodings plus binary8, single layer only.

use std::fs::{self, create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::grid::Grid2D;
use crate::vector_field::VectorField2D;

const CHECK4: f32 = 1234567.0;
const CHECK8: f64 = 123456789012345.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OvfFormat {
    #[default]
    Text,
    Binary4,
}

#[derive(Clone, Debug, Default)]
pub struct OvfMeta {
    pub title: String,
    pub desc_lines: Vec<String>,
}

impl OvfMeta {
    pub fn magnetization() -> Self {
        Self {
            title: "m".to_string(),
            desc_lines: vec![],
        }
    }

    pub fn with_total_sim_time(mut self, t_s: f64) -> Self {
        self.desc_lines.push(format!("Total simulation time:  {:.16e}  s", t_s));
        self
    }
}

fn write_header<W: Write>(w: &mut W, grid: &Grid2D, meta: &OvfMeta) -> std::io::Result<()> {
    let [x0, y0, z0] = grid.origin;
    let [lx, ly, lz] = grid.extent();

    writeln!(w, "# OOMMF OVF 2.0")?;
    writeln!(w, "# Segment count: 1")?;
    writeln!(w, "# Begin: Segment")?;
    writeln!(w, "# Begin: Header")?;
    writeln!(w, "# Title: {}", meta.title)?;
    for d in &meta.desc_lines {
        writeln!(w, "# Desc: {}", d)?;
    }
    writeln!(w, "# meshtype: rectangular")?;
    writeln!(w, "# meshunit: m")?;
    writeln!(w, "# xmin: {:.17e}", x0)?;
    writeln!(w, "# ymin: {:.17e}", y0)?;
    writeln!(w, "# zmin: {:.17e}", z0)?;
    writeln!(w, "# xmax: {:.17e}", x0 + lx)?;
    writeln!(w, "# ymax: {:.17e}", y0 + ly)?;
    writeln!(w, "# zmax: {:.17e}", z0 + lz)?;
    writeln!(w, "# valuedim: 3")?;
    writeln!(w, "# valuelabels: m_x m_y m_z")?;
    writeln!(w, "# valueunits: 1 1 1")?;
    writeln!(w, "# xbase: {:.17e}", x0 + 0.5 * grid.dx)?;
    writeln!(w, "# ybase: {:.17e}", y0 + 0.5 * grid.dy)?;
    writeln!(w, "# zbase: {:.17e}", z0 + 0.5 * grid.dz)?;
    writeln!(w, "# xnodes: {}", grid.nx)?;
    writeln!(w, "# ynodes: {}", grid.ny)?;
    writeln!(w, "# znodes: 1")?;
    writeln!(w, "# xstepsize: {:.17e}", grid.dx)?;
    writeln!(w, "# ystepsize: {:.17e}", grid.dy)?;
    writeln!(w, "# zstepsize: {:.17e}", grid.dz)?;
    writeln!(w, "# End: Header")?;
    Ok(())
}

/// Write `m` as OVF 2.0, creating parent directories as needed.
pub fn write_ovf(path: &Path, m: &VectorField2D, meta: &OvfMeta, format: OvfFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let grid = &m.grid;
    if m.data.len() != grid.n_cells() {
        return Err(SimError::InvalidParameter(format!(
            "field length {} does not match grid ({} cells)",
            m.data.len(),
            grid.n_cells()
        )));
    }

    let mut w = BufWriter::new(File::create(path)?);
    write_header(&mut w, grid, meta)?;

    match format {
        OvfFormat::Text => {
            writeln!(w, "# Begin: Data Text")?;
            // x fastest, then y
            for v in &m.data {
                writeln!(w, "{:.17e} {:.17e} {:.17e}", v[0], v[1], v[2])?;
            }
            writeln!(w, "# End: Data Text")?;
        }
        OvfFormat::Binary4 => {
            writeln!(w, "# Begin: Data Binary 4")?;
            w.write_all(&CHECK4.to_le_bytes())?;
            for v in &m.data {
                for c in v {
                    w.write_all(&(*c as f32).to_le_bytes())?;
                }
            }
            writeln!(w)?;
            writeln!(w, "# End: Data Binary 4")?;
        }
    }
    writeln!(w, "# End: Segment")?;
    w.flush()?;
    Ok(())
}

#[derive(Default)]
struct Header {
    xmin: Option<f64>,
    ymin: Option<f64>,
    zmin: Option<f64>,
    xnodes: Option<usize>,
    ynodes: Option<usize>,
    znodes: Option<usize>,
    xstep: Option<f64>,
    ystep: Option<f64>,
    zstep: Option<f64>,
    valuedim: Option<usize>,
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| SimError::Ovf(format!("cannot parse {key} value {value:?}")))
}

impl Header {
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key.to_ascii_lowercase().as_str() {
            "xmin" => self.xmin = Some(parse_num(key, value)?),
            "ymin" => self.ymin = Some(parse_num(key, value)?),
            "zmin" => self.zmin = Some(parse_num(key, value)?),
            "xnodes" => self.xnodes = Some(parse_num(key, value)?),
            "ynodes" => self.ynodes = Some(parse_num(key, value)?),
            "znodes" => self.znodes = Some(parse_num(key, value)?),
            "xstepsize" => self.xstep = Some(parse_num(key, value)?),
            "ystepsize" => self.ystep = Some(parse_num(key, value)?),
            "zstepsize" => self.zstep = Some(parse_num(key, value)?),
            "valuedim" => self.valuedim = Some(parse_num(key, value)?),
            _ => {}
        }
        Ok(())
    }

    fn grid(&self) -> Result<Grid2D> {
        let need = |v: Option<usize>, k: &str| v.ok_or_else(|| SimError::Ovf(format!("missing {k}")));
        let needf = |v: Option<f64>, k: &str| v.ok_or_else(|| SimError::Ovf(format!("missing {k}")));
        let nz = self.znodes.unwrap_or(1);
        if nz != 1 {
            return Err(SimError::Ovf(format!("only single-layer files are supported (znodes={nz})")));
        }
        if self.valuedim.unwrap_or(3) != 3 {
            return Err(SimError::Ovf("valuedim must be 3".into()));
        }
        let nx = need(self.xnodes, "xnodes")?;
        let ny = need(self.ynodes, "ynodes")?;
        if nx == 0 || ny == 0 || nx.checked_mul(ny).is_none() {
            return Err(SimError::Ovf(format!("bad node counts {nx} x {ny}")));
        }
        let step = |v: Option<f64>, k: &str| -> Result<f64> {
            let d = needf(v, k)?;
            if d.is_finite() && d > 0.0 {
                Ok(d)
            } else {
                Err(SimError::Ovf(format!("{k} must be finite and > 0, got {d}")))
            }
        };
        Ok(Grid2D {
            nx,
            ny,
            dx: step(self.xstep, "xstepsize")?,
            dy: step(self.ystep, "ystepsize")?,
            dz: step(self.zstep, "zstepsize")?,
            origin: [
                self.xmin.unwrap_or(0.0),
                self.ymin.unwrap_or(0.0),
                self.zmin.unwrap_or(0.0),
            ],
        })
    }
}

/// Bytes in a binary block of `n` vectors plus the check value.
fn block_len(n: usize, width: usize) -> Option<usize> {
    n.checked_mul(3)?.checked_add(1)?.checked_mul(width)
}

/// Read a single-segment OVF 2.0 file into a field on its own grid.
pub fn read_ovf(path: &Path) -> Result<VectorField2D> {
    let bytes = fs::read(path)?;
    let mut header = Header::default();
    let mut pos = 0usize;

    // Header lines until the data block starts
    let encoding = loop {
        if pos >= bytes.len() {
            return Err(SimError::Ovf("no data block".into()));
        }
        let end = bytes[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(bytes.len(), |e| pos + e);
        let line = String::from_utf8_lossy(&bytes[pos..end]).trim().to_string();
        pos = (end + 1).min(bytes.len());

        let Some(body) = line.strip_prefix('#') else {
            continue;
        };
        let Some((key, value)) = body.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if key.eq_ignore_ascii_case("begin") && value.to_ascii_lowercase().starts_with("data") {
            break value.to_ascii_lowercase();
        }
        header.set(key, value)?;
    };

    let grid = header.grid()?;
    let n = grid.n_cells();
    // every node takes at least one byte in any encoding
    if n > bytes.len() - pos {
        return Err(SimError::Ovf(format!("{n} nodes cannot fit in {} data bytes", bytes.len() - pos)));
    }
    let mut data = Vec::with_capacity(n);

    match encoding.as_str() {
        "data text" => {
            let text = String::from_utf8_lossy(&bytes[pos..]);
            let mut values = text
                .lines()
                .take_while(|l| !l.trim_start().starts_with('#'))
                .flat_map(|l| l.split_whitespace())
                .map(|t| parse_num::<f64>("data", t));
            for _ in 0..n {
                let mut v = [0.0; 3];
                for c in &mut v {
                    *c = values
                        .next()
                        .ok_or_else(|| SimError::Ovf(format!("expected {} values", 3 * n)))??;
                }
                data.push(v);
            }
        }
        "data binary 4" => {
            let raw = block_len(n, 4)
                .and_then(|need| bytes.get(pos..pos.checked_add(need)?))
                .ok_or_else(|| SimError::Ovf("truncated binary4 data".into()))?;
            let word = |k: usize| f32::from_le_bytes([raw[4 * k], raw[4 * k + 1], raw[4 * k + 2], raw[4 * k + 3]]);
            if word(0) != CHECK4 {
                return Err(SimError::Ovf("bad binary4 check value".into()));
            }
            for c in 0..n {
                data.push([
                    word(1 + 3 * c) as f64,
                    word(2 + 3 * c) as f64,
                    word(3 + 3 * c) as f64,
                ]);
            }
        }
        "data binary 8" => {
            let raw = block_len(n, 8)
                .and_then(|need| bytes.get(pos..pos.checked_add(need)?))
                .ok_or_else(|| SimError::Ovf("truncated binary8 data".into()))?;
            let word = |k: usize| {
                let mut b = [0u8; 8];
                b.copy_from_slice(&raw[8 * k..8 * k + 8]);
                f64::from_le_bytes(b)
            };
            if word(0) != CHECK8 {
                return Err(SimError::Ovf("bad binary8 check value".into()));
            }
            for c in 0..n {
                data.push([word(1 + 3 * c), word(2 + 3 * c), word(3 + 3 * c)]);
            }
        }
        other => return Err(SimError::Ovf(format!("unsupported data block {other:?}"))),
    }

    Ok(VectorField2D { grid, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_field() -> VectorField2D {
        let mut grid = Grid2D::new(5, 3, 2e-9, 2.5e-9, 1e-9);
        grid.origin = [-5e-9, -3.75e-9, 0.0];
        VectorField2D::from_fn(grid, |p| crate::vec3::normalize([p[0], p[1], 1e-9]))
    }

    #[test]
    fn text_file_reads_back_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.ovf");
        let m = sample_field();
        write_ovf(&path, &m, &OvfMeta::magnetization().with_total_sim_time(1e-9), OvfFormat::Text).unwrap();
        let back = read_ovf(&path).unwrap();
        assert_eq!(back.grid.nx, 5);
        assert_eq!(back.grid.ny, 3);
        assert!((back.grid.origin[0] + 5e-9).abs() < 1e-24);
        assert_eq!(back.data, m.data);
    }

    #[test]
    fn binary4_reads_back_to_single_precision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("m.ovf");
        let m = sample_field();
        write_ovf(&path, &m, &OvfMeta::magnetization(), OvfFormat::Binary4).unwrap();
        let back = read_ovf(&path).unwrap();
        assert!(back.max_abs_diff(&m) < 1e-6);
    }

    fn binary8_file(check: f64, values: &[f64]) -> Vec<u8> {
        let header = "# OOMMF OVF 2.0\n# Segment count: 1\n# Begin: Segment\n# Begin: Header\n\
                      # xmin: 0\n# ymin: 0\n# zmin: 0\n\
                      # xstepsize: 1e-9\n# ystepsize: 1e-9\n# zstepsize: 2e-9\n\
                      # xnodes: 2\n# ynodes: 1\n# znodes: 1\n# valuedim: 3\n\
                      # End: Header\n# Begin: Data Binary 8\n";
        let mut bytes = header.as_bytes().to_vec();
        bytes.extend_from_slice(&check.to_le_bytes());
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.extend_from_slice(b"\n# End: Data Binary 8\n# End: Segment\n");
        bytes
    }

    #[test]
    fn binary8_reads_back_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m8.ovf");
        let values = [0.6, 0.0, 0.8, -1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0];
        fs::write(&path, binary8_file(CHECK8, &values)).unwrap();
        let back = read_ovf(&path).unwrap();
        assert_eq!((back.grid.nx, back.grid.ny), (2, 1));
        assert_eq!(back.grid.dz, 2e-9);
        assert_eq!(back.data, vec![[0.6, 0.0, 0.8], [-1.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0]]);
    }

    #[test]
    fn wrong_check_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let p8 = dir.path().join("bad8.ovf");
        fs::write(&p8, binary8_file(1234567.0, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0])).unwrap();
        assert!(matches!(read_ovf(&p8), Err(SimError::Ovf(_))));

        let p4 = dir.path().join("bad4.ovf");
        write_ovf(&p4, &sample_field(), &OvfMeta::magnetization(), OvfFormat::Binary4).unwrap();
        let mut bytes = fs::read(&p4).unwrap();
        let marker = b"Begin: Data Binary 4\n";
        let at = bytes
            .windows(marker.len())
            .position(|w| w == marker)
            .unwrap()
            + marker.len();
        bytes[at..at + 4].copy_from_slice(&1.0f32.to_le_bytes());
        fs::write(&p4, bytes).unwrap();
        assert!(matches!(read_ovf(&p4), Err(SimError::Ovf(_))));
    }

    #[test]
    fn absurd_headers_are_rejected_without_allocating() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            "# xnodes: 4294967296\n# ynodes: 4294967297\n# xstepsize: 1\n# ystepsize: 1\n# zstepsize: 1\n",
            "# xnodes: 1000000\n# ynodes: 1000000\n# xstepsize: 1\n# ystepsize: 1\n# zstepsize: 1\n",
            "# xnodes: 0\n# ynodes: 1\n# xstepsize: 1\n# ystepsize: 1\n# zstepsize: 1\n",
            "# xnodes: 1\n# ynodes: 1\n# xstepsize: 0\n# ystepsize: 1\n# zstepsize: 1\n",
            "# xnodes: 1\n# ynodes: 1\n# xstepsize: NaN\n# ystepsize: 1\n# zstepsize: 1\n",
        ];
        for (k, head) in cases.iter().enumerate() {
            let path = dir.path().join(format!("h{k}.ovf"));
            let mut bytes = format!("# OOMMF OVF 2.0\n{head}# Begin: Data Binary 4\n").into_bytes();
            bytes.extend_from_slice(&CHECK4.to_le_bytes());
            bytes.extend_from_slice(&[0u8; 12]);
            fs::write(&path, bytes).unwrap();
            assert!(matches!(read_ovf(&path), Err(SimError::Ovf(_))), "case {k}");
        }
    }

    #[test]
    fn missing_data_block_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ovf");
        fs::write(&path, "# OOMMF OVF 2.0\n# xnodes: 2\n").unwrap();
        assert!(matches!(read_ovf(&path), Err(SimError::Ovf(_))));
    }
}
