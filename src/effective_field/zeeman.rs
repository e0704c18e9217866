// src/effective_field/zeeman.rs

use crate::params::Material;
use crate::vector_field::VectorField2D;

/// Add a uniform applied induction B_ext (Tesla) to every magnetic cell.
pub fn add_zeeman_field(b_eff: &mut VectorField2D, b_ext: [f64; 3], mat: &Material) {
    for (b, &ms) in b_eff.data.iter_mut().zip(mat.ms.iter()) {
        if ms > 0.0 {
            b[0] += b_ext[0];
            b[1] += b_ext[1];
            b[2] += b_ext[2];
        }
    }
}
