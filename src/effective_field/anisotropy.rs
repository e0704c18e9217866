// src/effective_field/anisotropy.rs
//
// Uniaxial anisotropy, w = -K_u (m·u)^2, K_u > 0 for an easy axis.

use crate::params::Material;
use crate::vec3::{add, dot, scale};
use crate::vector_field::VectorField2D;

/// B_ani = (2 K_u / M_s) (m·u) u for one magnetic cell.
#[inline]
pub fn uniaxial_field(m: [f64; 3], u: [f64; 3], k_u: f64, ms: f64) -> [f64; 3] {
    scale(u, 2.0 * k_u / ms * dot(m, u))
}

/// Add the uniaxial anisotropy contribution to B_eff (Tesla). Vacuum is skipped.
pub fn add_uniaxial_anisotropy_field(m: &VectorField2D, b_eff: &mut VectorField2D, mat: &Material) {
    if mat.k_u == 0.0 {
        return;
    }
    let cells = m.data.iter().zip(mat.ms.iter()).zip(b_eff.data.iter_mut());
    for ((&mi, &ms), b) in cells {
        if ms > 0.0 {
            *b = add(*b, uniaxial_field(mi, mat.easy_axis, mat.k_u, ms));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid2D;

    #[test]
    fn field_is_along_axis_and_vanishes_in_plane() {
        let u = [0.0, 0.0, 1.0];
        let b = uniaxial_field([0.6, 0.0, 0.8], u, 1e6, 1e6);
        assert_eq!(b[0], 0.0);
        assert!((b[2] - 1.6).abs() < 1e-12);
        assert_eq!(uniaxial_field([1.0, 0.0, 0.0], u, 1e6, 1e6), [0.0; 3]);
    }

    #[test]
    fn vacuum_cells_get_nothing() {
        let grid = Grid2D::new(2, 1, 1e-9, 1e-9, 1e-9);
        let mut mat = Material::uniform(2, 8e5, 0.0, None, 5e5, [0.0, 0.0, 1.0], false);
        mat.ms[1] = 0.0;
        let m = VectorField2D::new(grid);
        let mut b = VectorField2D::zeros(grid);
        add_uniaxial_anisotropy_field(&m, &mut b, &mat);
        assert!(b.data[0][2] > 0.0);
        assert_eq!(b.data[1], [0.0; 3]);
    }
}
