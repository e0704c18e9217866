// src/system.rs
//
// A named micromagnetic system: mesh + energy terms + dynamics + current state.
// Drivers mutate `m` and `t`; everything else is fixed for the run.

use crate::energy::{compute_energy, EnergyBreakdown};
use crate::error::{Result, SimError};
use crate::geometry::{mask_count, mask_from_ms};
use crate::grid::Grid2D;
use crate::initial_states::apply_ms_mask;
use crate::params::{LLGParams, Material, SpinTorque};
use crate::scalar_field::ScalarField2D;
use crate::vec3::normalize;
use crate::vector_field::VectorField2D;

#[derive(Debug, Clone)]
pub struct System {
    pub name: String,
    pub grid: Grid2D,
    pub material: Material,
    pub params: LLGParams,
    pub stt: Option<SpinTorque>,
    pub m: VectorField2D,
    /// Simulated time accumulated over all time drives (s).
    pub t: f64,
}

impl System {
    pub fn new(name: impl Into<String>, grid: Grid2D, material: Material, params: LLGParams) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(SimError::InvalidParameter(format!("invalid system name {name:?}")));
        }
        if material.ms.len() != grid.n_cells() {
            return Err(SimError::InvalidParameter(format!(
                "Ms map has {} cells, grid has {}",
                material.ms.len(),
                grid.n_cells()
            )));
        }
        let mut m = VectorField2D::new(grid);
        apply_ms_mask(&mut m, &material.ms);
        Ok(Self {
            name,
            grid,
            material,
            params,
            stt: None,
            m,
            t: 0.0,
        })
    }

    /// Sample Ms from a position predicate (A/m, 0 = vacuum), then re-mask m.
    pub fn set_ms_fn<F>(&mut self, f: F) -> Result<()>
    where
        F: Fn([f64; 3]) -> f64,
    {
        let ms = ScalarField2D::from_fn(self.grid, f);
        if let Some(bad) = ms.data.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(SimError::InvalidParameter(format!("Ms must be finite and >= 0, got {bad}")));
        }
        self.material.ms = ms.data;
        apply_ms_mask(&mut self.m, &self.material.ms);
        Ok(())
    }

    /// Sample the initial direction from a position predicate.
    /// Directions are normalised; vacuum cells are set to zero.
    pub fn set_m_fn<F>(&mut self, f: F)
    where
        F: Fn([f64; 3]) -> [f64; 3],
    {
        self.m = VectorField2D::from_fn(self.grid, |p| normalize(f(p)));
        apply_ms_mask(&mut self.m, &self.material.ms);
    }

    pub fn energy(&self) -> EnergyBreakdown {
        compute_energy(&self.grid, &self.m, &self.params, &self.material)
    }

    /// Ms-weighted average magnetisation direction.
    pub fn average_m(&self) -> [f64; 3] {
        self.m.average(&self.material.ms)
    }

    pub fn magnetic_cells(&self) -> usize {
        mask_count(&mask_from_ms(&self.material.ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::GAMMA_E_RAD_PER_S_T;

    fn small() -> System {
        let grid = Grid2D::new(4, 2, 1e-9, 1e-9, 1e-9);
        let mat = Material::uniform(8, 1e6, 0.0, None, 0.0, [0.0, 0.0, 1.0], false);
        let params = LLGParams::with_h_ext(GAMMA_E_RAD_PER_S_T, 0.1, 1e-13, [0.0; 3]);
        System::new("s", grid, mat, params).unwrap()
    }

    #[test]
    fn ms_predicate_masks_magnetisation() {
        let mut sys = small();
        sys.set_ms_fn(|p| if p[0] < 2e-9 { 1e6 } else { 0.0 }).unwrap();
        sys.set_m_fn(|_| [1.0, 0.0, 1.0]);
        assert_eq!(sys.magnetic_cells(), 4);
        for j in 0..2 {
            assert_eq!(sys.m.data[sys.grid.idx(3, j)], [0.0; 3]);
            let v = sys.m.data[sys.grid.idx(0, j)];
            assert!((v[0] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-15);
        }
    }

    #[test]
    fn negative_ms_is_rejected() {
        let mut sys = small();
        assert!(matches!(sys.set_ms_fn(|_| -1.0), Err(SimError::InvalidParameter(_))));
    }

    #[test]
    fn name_with_separator_is_rejected() {
        let grid = Grid2D::new(1, 1, 1e-9, 1e-9, 1e-9);
        let mat = Material::uniform(1, 1e6, 0.0, None, 0.0, [0.0, 0.0, 1.0], false);
        let params = LLGParams::with_h_ext(GAMMA_E_RAD_PER_S_T, 0.1, 1e-13, [0.0; 3]);
        assert!(System::new("a/b", grid, mat, params).is_err());
    }
}
