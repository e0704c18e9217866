// src/energy.rs
//
// Micromagnetic energy per term (Joules), evaluated from the term fields:
//   exchange / DMI / demag (quadratic in m):  E = -1/2 Σ Ms V m·B_term
//   Zeeman (linear):                          E = -Σ Ms V m·B_ext
//   uniaxial anisotropy:                      E = -Σ K V (m·u)^2

use serde::{Deserialize, Serialize};

use crate::effective_field::{build_term, EnergyTerm};
use crate::grid::Grid2D;
use crate::params::{LLGParams, Material};
use crate::vec3::dot;
use crate::vector_field::VectorField2D;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyBreakdown {
    pub exchange: f64,
    pub dmi: f64,
    pub anisotropy: f64,
    pub zeeman: f64,
    pub demag: f64,
    pub total: f64,
}

fn field_energy(m: &VectorField2D, b: &VectorField2D, mat: &Material, volume: f64, weight: f64) -> f64 {
    let mut e = 0.0;
    for ((mi, bi), &ms) in m.data.iter().zip(b.data.iter()).zip(mat.ms.iter()) {
        if ms > 0.0 {
            e += ms * dot(*mi, *bi);
        }
    }
    -weight * e * volume
}

fn anisotropy_energy(m: &VectorField2D, mat: &Material, volume: f64) -> f64 {
    if mat.k_u == 0.0 {
        return 0.0;
    }
    let u = mat.easy_axis;
    let mut e = 0.0;
    for (mi, &ms) in m.data.iter().zip(mat.ms.iter()) {
        if ms > 0.0 {
            let c = dot(*mi, u);
            e -= c * c;
        }
    }
    mat.k_u * volume * e
}

/// Energy of a single term.
pub fn compute_term_energy(
    term: EnergyTerm,
    grid: &Grid2D,
    m: &VectorField2D,
    params: &LLGParams,
    material: &Material,
    scratch: &mut VectorField2D,
) -> f64 {
    let volume = grid.cell_volume();
    match term {
        EnergyTerm::Anisotropy => anisotropy_energy(m, material, volume),
        EnergyTerm::Zeeman => {
            build_term(term, grid, m, scratch, params, material);
            field_energy(m, scratch, material, volume, 1.0)
        }
        _ => {
            build_term(term, grid, m, scratch, params, material);
            field_energy(m, scratch, material, volume, 0.5)
        }
    }
}

/// Energy of every term plus the total.
pub fn compute_energy(grid: &Grid2D, m: &VectorField2D, params: &LLGParams, material: &Material) -> EnergyBreakdown {
    let mut scratch = VectorField2D::zeros(*grid);
    let mut e = EnergyBreakdown::default();
    for term in EnergyTerm::ALL {
        let v = compute_term_energy(term, grid, m, params, material, &mut scratch);
        match term {
            EnergyTerm::Exchange => e.exchange = v,
            EnergyTerm::Dmi => e.dmi = v,
            EnergyTerm::Anisotropy => e.anisotropy = v,
            EnergyTerm::Zeeman => e.zeeman = v,
            EnergyTerm::Demag => e.demag = v,
        }
    }
    e.total = e.exchange + e.dmi + e.anisotropy + e.zeeman + e.demag;
    e
}
