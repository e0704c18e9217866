// src/geometry.rs
//
// Geometry / masking utilities for single-layer films.
//
// - Coordinates are absolute (metres), the same frame the Region is defined in.
// - A mask is a boolean per cell (true = magnetic material, false = vacuum).
// - Vacuum is carried through the solver as Ms = 0 and m = (0,0,0).

use crate::grid::Grid2D;

/// Boolean geometry mask for a 2D grid (length = nx*ny).
pub type Mask2D = Vec<bool>;

/// Axis-aligned rectangle test: |x-cx| <= hx and |y-cy| <= hy.
#[inline]
pub fn inside_rect(x: f64, y: f64, center: (f64, f64), hx: f64, hy: f64) -> bool {
    (x - center.0).abs() <= hx && (y - center.1).abs() <= hy
}

/// Ellipse test: ((x-cx)/a)^2 + ((y-cy)/b)^2 <= 1.
#[inline]
pub fn inside_ellipse(x: f64, y: f64, center: (f64, f64), a: f64, b: f64) -> bool {
    let u = (x - center.0) / a;
    let v = (y - center.1) / b;
    u * u + v * v <= 1.0
}

/// Build a mask from a predicate on cell centres.
pub fn mask_from_fn<F>(grid: &Grid2D, f: F) -> Mask2D
where
    F: Fn([f64; 3]) -> bool,
{
    let mut mask = vec![false; grid.n_cells()];
    for j in 0..grid.ny {
        for i in 0..grid.nx {
            mask[grid.idx(i, j)] = f(grid.cell_center(i, j));
        }
    }
    mask
}

/// Magnetic cells are those with Ms > 0.
pub fn mask_from_ms(ms: &[f64]) -> Mask2D {
    ms.iter().map(|&v| v > 0.0).collect()
}

pub fn mask_count(mask: &[bool]) -> usize {
    mask.iter().filter(|&&v| v).count()
}

/// Bounding box of the mask in (i_min, i_max, j_min, j_max) inclusive indices.
pub fn mask_bbox(mask: &[bool], nx: usize, ny: usize) -> Option<(usize, usize, usize, usize)> {
    assert_eq!(mask.len(), nx * ny);
    let mut bbox: Option<(usize, usize, usize, usize)> = None;
    for j in 0..ny {
        for i in 0..nx {
            if !mask[j * nx + i] {
                continue;
            }
            bbox = Some(match bbox {
                None => (i, i, j, j),
                Some((i0, i1, j0, j1)) => (i0.min(i), i1.max(i), j0.min(j), j1.max(j)),
            });
        }
    }
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_mask_bbox_matches_footprint() {
        let grid = Grid2D::new(10, 6, 1.0, 1.0, 1.0);
        // cells with centres x in [2.5, 6.5], y in [1.5, 3.5]
        let mask = mask_from_fn(&grid, |p| inside_rect(p[0], p[1], (4.5, 2.5), 2.0, 1.0));
        assert_eq!(mask_count(&mask), 5 * 3);
        assert_eq!(mask_bbox(&mask, 10, 6), Some((2, 6, 1, 3)));
    }

    #[test]
    fn empty_mask_has_no_bbox() {
        let mask = mask_from_ms(&[0.0, 0.0, 0.0, 0.0]);
        assert_eq!(mask_count(&mask), 0);
        assert_eq!(mask_bbox(&mask, 2, 2), None);
    }

    #[test]
    fn ellipse_contains_centre_not_corner() {
        assert!(inside_ellipse(0.0, 0.0, (0.0, 0.0), 2.0, 1.0));
        assert!(!inside_ellipse(1.9, 0.9, (0.0, 0.0), 2.0, 1.0));
    }
}
