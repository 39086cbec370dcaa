//! Particle size distribution state.
//!
//! The integrated quantity is always the per-bin number surface density
//! `N[k]` (particles per m²). Mass fractions, opacity and optical depth are
//! derived read-only views.

use std::f64::consts::PI;

use ndarray::Array1;

use crate::error::{CascadeError, Result, ensure_bin_vector, ensure_finite, ensure_positive};
use crate::grid::SizeGrid;

/// Per-bin number surface density of one spatial cell.
///
/// The state has a single writer: the integrator mutates it through
/// `&mut PsdState` once per accepted sub-step, everything else reads it.
#[derive(Clone, Debug, PartialEq)]
pub struct PsdState {
    number: Array1<f64>,
}

impl PsdState {
    /// Wrap an explicit number vector (particles per m² per bin).
    pub fn from_numbers(grid: &SizeGrid, numbers: Vec<f64>) -> Result<Self> {
        ensure_bin_vector("initial numbers", &numbers, grid.len())?;
        Ok(Self {
            number: Array1::from(numbers),
        })
    }

    /// Same number in every bin, scaled so the total areal mass is `sigma_surf`.
    pub fn uniform(grid: &SizeGrid, sigma_surf: f64) -> Result<Self> {
        Self::normalized(grid, Array1::ones(grid.len()), sigma_surf)
    }

    /// Three-slope power law scaled to the areal mass `sigma_surf`.
    ///
    /// The differential slope is `alpha` below `10 s_min`, `alpha + 1` in the
    /// middle of the range and `alpha + 1.5` above `s_max / 10`, which mimics
    /// the non-steady shape of a young cascade.
    pub fn three_slope(grid: &SizeGrid, alpha: f64, sigma_surf: f64) -> Result<Self> {
        ensure_finite("alpha", alpha)?;
        let s_min = grid.min_radius();
        let s_break_low = s_min * 10.0;
        let s_break_high = grid.max_radius() / 10.0;

        let shape = grid
            .bins()
            .iter()
            .map(|bin| {
                let slope = if bin.radius < s_break_low {
                    alpha
                } else if bin.radius < s_break_high {
                    alpha + 1.0
                } else {
                    alpha + 1.5
                };
                (bin.radius / s_min).powf(-slope) * bin.width()
            })
            .collect();

        Self::normalized(grid, shape, sigma_surf)
    }

    fn normalized(grid: &SizeGrid, shape: Array1<f64>, sigma_surf: f64) -> Result<Self> {
        ensure_positive("sigma_surf", sigma_surf)?;
        let shape_mass = shape.dot(grid.masses());
        if !(shape_mass.is_finite() && shape_mass > 0.0) {
            return Err(CascadeError::InvalidGrid(format!(
                "distribution shape has unusable total mass {shape_mass:e}"
            )));
        }
        Ok(Self {
            number: shape * (sigma_surf / shape_mass),
        })
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.number.is_empty()
    }

    /// Per-bin number surface density.
    pub fn numbers(&self) -> &Array1<f64> {
        &self.number
    }

    pub(crate) fn numbers_mut(&mut self) -> &mut Array1<f64> {
        &mut self.number
    }

    /// Total areal mass density Σ m_k N_k (kg/m²).
    pub fn total_mass(&self, grid: &SizeGrid) -> f64 {
        self.number.dot(grid.masses())
    }

    /// Mass fraction per bin, `m_k N_k / Σ_surf`. All zero for an empty state.
    pub fn mass_fractions(&self, grid: &SizeGrid) -> Array1<f64> {
        let total = self.total_mass(grid);
        if total <= 0.0 {
            return Array1::zeros(self.len());
        }
        &self.number * grid.masses() / total
    }

    /// Geometric optical depth Σ π s_k² N_k.
    pub fn optical_depth(&self, grid: &SizeGrid) -> f64 {
        self.number
            .iter()
            .zip(grid.radii().iter())
            .map(|(n, s)| PI * s * s * n)
            .sum()
    }

    /// Mass opacity κ = Σ π s² N / Σ m N (m²/kg); zero for an empty state.
    pub fn mass_opacity(&self, grid: &SizeGrid) -> f64 {
        let mass = self.total_mass(grid);
        if mass <= 0.0 {
            return 0.0;
        }
        self.optical_depth(grid) / mass
    }
}
