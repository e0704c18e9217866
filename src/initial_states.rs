// src/initial_states.rs
//
// Sample definition for the domain-wall-pair film:
//  - Footprint: the lithographic shape, as an Ms(position) predicate.
//  - DomainWallPair: the initial direction, reversed easy axis inside an x-range.
//
// Conventions match geometry.rs: absolute coordinates in metres, vacuum is m=(0,0,0).

use serde::{Deserialize, Serialize};

use crate::geometry::{inside_ellipse, inside_rect};
use crate::vec3::{normalize, scale};
use crate::vector_field::VectorField2D;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FootprintShape {
    Rectangle,
    Ellipse,
}

/// In-plane film footprint. `half_extent` is (half-width, half-height) for a
/// rectangle and the semi-axes for an ellipse. Boundaries count as inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub shape: FootprintShape,
    pub center: [f64; 2],
    pub half_extent: [f64; 2],
}

impl Default for Footprint {
    fn default() -> Self {
        Self {
            shape: FootprintShape::Rectangle,
            center: [0.0, 0.0],
            half_extent: [90e-9, 40e-9],
        }
    }
}

impl Footprint {
    pub fn contains(&self, pos: [f64; 3]) -> bool {
        let c = (self.center[0], self.center[1]);
        let [a, b] = self.half_extent;
        match self.shape {
            FootprintShape::Rectangle => inside_rect(pos[0], pos[1], c, a, b),
            FootprintShape::Ellipse => inside_ellipse(pos[0], pos[1], c, a, b),
        }
    }

    /// Saturation magnetisation at `pos`: `ms` inside the footprint, 0 outside.
    pub fn ms_at(&self, pos: [f64; 3], ms: f64) -> f64 {
        if self.contains(pos) {
            ms
        } else {
            0.0
        }
    }
}

/// Two walls bounding a reversed domain at `x_range.0 <= x <= x_range.1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainWallPair {
    pub x_range: (f64, f64),
    pub easy_axis: [f64; 3],
}

impl DomainWallPair {
    /// Unit direction at `pos`: -u inside the x-range, +u elsewhere.
    pub fn direction_at(&self, pos: [f64; 3]) -> [f64; 3] {
        let u = normalize(self.easy_axis);
        let (x0, x1) = self.x_range;
        if x0 <= pos[0] && pos[0] <= x1 {
            scale(u, -1.0)
        } else {
            u
        }
    }
}

/// Set m=(0,0,0) wherever Ms is zero.
pub fn apply_ms_mask(m: &mut VectorField2D, ms: &[f64]) {
    assert_eq!(m.data.len(), ms.len());
    for (v, &w) in m.data.iter_mut().zip(ms.iter()) {
        if w <= 0.0 {
            *v = [0.0; 3];
        }
    }
}

/// Uniform direction (normalised). Does not apply a mask.
pub fn init_uniform(m: &mut VectorField2D, dir: [f64; 3]) {
    let v = normalize(dir);
    m.set_uniform(v[0], v[1], v[2]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip() -> Footprint {
        Footprint {
            shape: FootprintShape::Rectangle,
            center: [0.0, 0.0],
            half_extent: [90e-9, 40e-9],
        }
    }

    #[test]
    fn uniform_state_is_normalised() {
        let grid = crate::grid::Grid2D::new(3, 2, 1e-9, 1e-9, 1e-9);
        let mut m = VectorField2D::zeros(grid);
        init_uniform(&mut m, [0.0, 3.0, 4.0]);
        for v in &m.data {
            assert_eq!(v[0], 0.0);
            assert!((v[1] - 0.6).abs() < 1e-15 && (v[2] - 0.8).abs() < 1e-15);
        }
    }

    #[test]
    fn ms_is_zero_everywhere_outside_the_footprint() {
        let fp = strip();
        let ms = 5.8e5;
        for ix in -20..=20 {
            for iy in -10..=10 {
                let p = [ix as f64 * 5e-9, iy as f64 * 5e-9, 1e-9];
                let v = fp.ms_at(p, ms);
                if p[0].abs() > 90e-9 || p[1].abs() > 40e-9 {
                    assert_eq!(v, 0.0, "outside at {:?}", p);
                } else {
                    assert_eq!(v, ms, "inside at {:?}", p);
                }
            }
        }
    }

    #[test]
    fn ellipse_footprint_excludes_corners() {
        let fp = Footprint {
            shape: FootprintShape::Ellipse,
            ..strip()
        };
        assert_eq!(fp.ms_at([85e-9, 35e-9, 0.0], 1.0), 0.0);
        assert_eq!(fp.ms_at([0.0, 35e-9, 0.0], 1.0), 1.0);
    }

    #[test]
    fn direction_is_reversed_only_inside_x_range() {
        let dw = DomainWallPair {
            x_range: (-20e-9, 20e-9),
            easy_axis: [0.0, 0.0, 2.0],
        };
        assert_eq!(dw.direction_at([0.0, 0.0, 0.0]), [0.0, 0.0, -1.0]);
        assert_eq!(dw.direction_at([-20e-9, 5e-9, 0.0]), [0.0, 0.0, -1.0]);
        assert_eq!(dw.direction_at([20e-9, 0.0, 0.0]), [0.0, 0.0, -1.0]);
        assert_eq!(dw.direction_at([21e-9, 0.0, 0.0]), [0.0, 0.0, 1.0]);
        assert_eq!(dw.direction_at([-50e-9, 0.0, 0.0]), [0.0, 0.0, 1.0]);
    }
}
