// src/visualisation.rs
//
// PNG output with plotters: heat maps of scalar fields (m_z, MFM phase,
// holography contrast, LTEM intensity) and line plots of table columns.

use std::error::Error;
use std::path::Path;

use plotters::prelude::*;

use crate::error::{Result, SimError};
use crate::scalar_field::ScalarField2D;
use crate::trajectory::TableRow;
use crate::vector_field::VectorField2D;

type DrawResult = std::result::Result<(), Box<dyn Error>>;

fn plot_err(e: Box<dyn Error>) -> SimError {
    SimError::Plot(e.to_string())
}

/// Blue–white–red: lo -> blue, midpoint -> white, hi -> red.
pub fn diverging_color(v: f64, lo: f64, hi: f64) -> RGBColor {
    if !v.is_finite() {
        return RGBColor(128, 128, 128);
    }
    let x = if hi > lo { ((v - lo) / (hi - lo)).clamp(0.0, 1.0) } else { 0.5 };

    let r = (255.0 * (2.0 * x).min(1.0)) as u8;
    let b = (255.0 * (2.0 * (1.0 - x)).min(1.0)) as u8;
    let g = (255.0 * (1.0 - 2.0 * (x - 0.5).abs())).clamp(0.0, 255.0) as u8;
    RGBColor(r, g, b)
}

/// Colour range for a field. `symmetric` centres white on zero.
pub fn color_range(field: &ScalarField2D, symmetric: bool) -> (f64, f64) {
    match field.min_max() {
        None => (-1.0, 1.0),
        Some((lo, hi)) if symmetric => {
            let a = lo.abs().max(hi.abs());
            if a > 0.0 {
                (-a, a)
            } else {
                (-1.0, 1.0)
            }
        }
        Some((lo, hi)) if (hi - lo).abs() <= 1e-12 * hi.abs().max(lo.abs()) => (lo - 1.0, hi + 1.0),
        Some(r) => r,
    }
}

fn draw_scalar_map(field: &ScalarField2D, title: &str, path: &Path, (lo, hi): (f64, f64)) -> DrawResult {
    let g = field.grid;

    // axes in nm, absolute coordinates
    let nm = 1e9;
    let x0 = g.origin[0] * nm;
    let y0 = g.origin[1] * nm;
    let (dx, dy) = (g.dx * nm, g.dy * nm);
    let x1 = x0 + g.nx as f64 * dx;
    let y1 = y0 + g.ny as f64 * dy;

    let aspect = (y1 - y0) / (x1 - x0);
    let width = 900u32;
    let height = ((width as f64 * aspect) as u32 + 120).clamp(300, 1400);

    let root = BitMapBackend::new(path, (width, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let caption = format!("{title}  [{lo:.3e}, {hi:.3e}]");
    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(caption, ("sans-serif", 20))
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("x (nm)")
        .y_desc("y (nm)")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series((0..g.ny).flat_map(|j| {
        (0..g.nx).map(move |i| {
            let v = field.data[g.idx(i, j)];
            let xa = x0 + i as f64 * dx;
            let ya = y0 + j as f64 * dy;
            Rectangle::new([(xa, ya), (xa + dx, ya + dy)], diverging_color(v, lo, hi).filled())
        })
    }))?;

    root.present()?;
    Ok(())
}

/// Heat map of a scalar field (blue = min, white = mid, red = max).
pub fn save_scalar_map(field: &ScalarField2D, title: &str, path: &Path, symmetric: bool) -> Result<()> {
    draw_scalar_map(field, title, path, color_range(field, symmetric)).map_err(plot_err)
}

/// Heat map of m_z, colour range fixed to [-1, 1].
pub fn save_mz_map(m: &VectorField2D, title: &str, path: &Path) -> Result<()> {
    // fixed range so frames are comparable
    draw_scalar_map(&m.component(2), title, path, (-1.0, 1.0)).map_err(plot_err)
}

const PALETTE: [RGBColor; 6] = [
    RGBColor(0, 0, 0),
    RGBColor(220, 30, 30),
    RGBColor(30, 30, 220),
    RGBColor(30, 160, 30),
    RGBColor(200, 120, 0),
    RGBColor(150, 0, 150),
];

/// Axis range with a 10% margin; degenerate ranges are widened.
fn padded_range<'a>(values: impl Iterator<Item = &'a f64>) -> (f64, f64) {
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for &v in values {
        if v.is_finite() {
            lo = lo.min(v);
            hi = hi.max(v);
        }
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    if (hi - lo).abs() < 1e-30 {
        let d = if hi.abs() < 1e-30 { 1.0 } else { 0.1 * hi.abs() };
        return (lo - d, hi + d);
    }
    let margin = 0.1 * (hi - lo);
    (lo - margin, hi + margin)
}

fn draw_lines(x: &[f64], series: &[(&str, Vec<f64>)], title: &str, x_desc: &str, y_desc: &str, path: &Path) -> DrawResult {
    let (x_min, x_max) = match (x.first(), x.last()) {
        (Some(&a), Some(&b)) if b > a => (a, b),
        (Some(&a), _) => (a - 1e-12, a + 1e-12),
        _ => return Ok(()),
    };
    let (y_min, y_max) = padded_range(series.iter().flat_map(|(_, v)| v.iter()));

    // 10^n scaling keeps tick labels readable
    let magnitude = y_max.abs().max(y_min.abs());
    let exp = if magnitude > 0.0 { magnitude.log10().floor() as i32 } else { 0 };
    let scale = 10f64.powi(exp);
    let y_label = if exp == 0 {
        y_desc.to_string()
    } else {
        format!("{y_desc} (× 10^{exp})")
    };

    let root = BitMapBackend::new(path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(title, ("sans-serif", 30))
        .set_left_and_bottom_label_area_size(60)
        .build_cartesian_2d(x_min..x_max, (y_min / scale)..(y_max / scale))?;

    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(y_label)
        .x_labels(10)
        .y_labels(10)
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 18))
        .draw()?;

    for (k, (label, ys)) in series.iter().enumerate() {
        let color = PALETTE[k % PALETTE.len()];
        chart
            .draw_series(LineSeries::new(
                x.iter().zip(ys.iter()).map(|(&t, &v)| (t, v / scale)),
                &color,
            ))?
            .label(*label)
            .legend(move |(lx, ly)| PathElement::new(vec![(lx, ly), (lx + 20, ly)], &color));
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .draw()?;

    root.present()?;
    Ok(())
}

/// Line plot of several series against a shared x axis.
pub fn save_line_plot(
    x: &[f64],
    series: &[(&str, Vec<f64>)],
    title: &str,
    x_desc: &str,
    y_desc: &str,
    path: &Path,
) -> Result<()> {
    draw_lines(x, series, title, x_desc, y_desc, path).map_err(plot_err)
}

/// Average magnetisation components against time.
pub fn save_m_avg_plot(rows: &[TableRow], path: &Path) -> Result<()> {
    let t: Vec<f64> = rows.iter().map(|r| r.t).collect();
    let series: [(&str, Vec<f64>); 3] = [
        ("m_x", rows.iter().map(|r| r.mx).collect()),
        ("m_y", rows.iter().map(|r| r.my).collect()),
        ("m_z", rows.iter().map(|r| r.mz).collect()),
    ];
    save_line_plot(&t, &series, "Average magnetisation vs time", "time (s)", "<m>", path)
}

/// Energy terms and total against time.
pub fn save_energy_plot(rows: &[TableRow], path: &Path) -> Result<()> {
    let t: Vec<f64> = rows.iter().map(|r| r.t).collect();
    let col = |f: fn(&TableRow) -> f64| rows.iter().map(f).collect::<Vec<f64>>();
    let series = [
        ("Total", col(|r| r.e_total)),
        ("Exchange", col(|r| r.e_exchange)),
        ("DMI", col(|r| r.e_dmi)),
        ("Anisotropy", col(|r| r.e_anisotropy)),
        ("Zeeman", col(|r| r.e_zeeman)),
        ("Demag", col(|r| r.e_demag)),
    ];
    save_line_plot(&t, &series, "Energy components vs time", "time (s)", "Energy (J)", path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid2D;

    #[test]
    fn colour_map_endpoints() {
        assert_eq!(diverging_color(-1.0, -1.0, 1.0), RGBColor(0, 0, 255));
        assert_eq!(diverging_color(0.0, -1.0, 1.0), RGBColor(255, 255, 255));
        assert_eq!(diverging_color(1.0, -1.0, 1.0), RGBColor(255, 0, 0));
    }

    #[test]
    fn symmetric_range_is_centred() {
        let grid = Grid2D::new(3, 1, 1e-9, 1e-9, 1e-9);
        let f = ScalarField2D {
            grid,
            data: vec![-0.2, 0.1, 0.5],
        };
        assert_eq!(color_range(&f, true), (-0.5, 0.5));
        assert_eq!(color_range(&f, false), (-0.2, 0.5));
    }

    #[test]
    fn flat_line_range_is_widened() {
        let v = [2.0, 2.0];
        let (lo, hi) = padded_range(v.iter());
        assert!(lo < 2.0 && hi > 2.0);
    }
}
