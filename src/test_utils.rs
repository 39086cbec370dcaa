//! Test utilities for cascade tests.
//!
//! Provides fixtures for grids, populations and forcings, and assertions for
//! the invariants every accepted step must keep.

use ndarray::{Array1, Array2};

use crate::collision::CollisionMatrix;
use crate::dynamics::OrbitalState;
use crate::grid::SizeGrid;
use crate::integrator::{CascadeIntegrator, CascadeSettings, CollisionSource, StepForcing};
use crate::psd::PsdState;
use crate::strength::StrengthModel;
use crate::types::{M_MARS, R_MARS, keplerian_omega};

/// Fixtures for grids, populations and forcings.
pub mod fixtures {
    use super::*;

    /// 40 logarithmic bins from 1 µm to 3 m, basalt density.
    pub fn grid40() -> SizeGrid {
        SizeGrid::logarithmic(1e-6, 3.0, 40, 3000.0).unwrap()
    }

    /// Integrator with default settings and basalt strength.
    pub fn integrator(grid: SizeGrid) -> CascadeIntegrator {
        CascadeIntegrator::new(grid, StrengthModel::basalt(), CascadeSettings::default()).unwrap()
    }

    /// Same number in every bin, 1e-3 kg/m² in total.
    pub fn uniform_psd(grid: &SizeGrid) -> PsdState {
        PsdState::uniform(grid, 1e-3).unwrap()
    }

    /// Three-slope population with α = 3.5, 1e-3 kg/m² in total.
    pub fn three_slope_psd(grid: &SizeGrid) -> PsdState {
        PsdState::three_slope(grid, 3.5, 1e-3).unwrap()
    }

    /// Fixed rate matrix with `rate` off the diagonal and zero on it.
    pub fn frozen_matrix(n: usize, rate: f64) -> CollisionMatrix {
        let mut rates = Array2::from_elem((n, n), rate);
        rates.diag_mut().fill(0.0);
        CollisionMatrix::from_rates(rates).unwrap()
    }

    /// Forcing with frozen collisions and nothing else.
    pub fn frozen_collisions(n: usize, rate: f64, impact_velocity: f64) -> StepForcing {
        StepForcing::default().with_collisions(CollisionSource::Frozen {
            matrix: frozen_matrix(n, rate),
            impact_velocity,
        })
    }

    /// Keplerian annulus around Mars at `radius_in_mars` planetary radii.
    pub fn mars_orbit(radius_in_mars: f64, eccentricity: f64) -> OrbitalState {
        let radius = radius_in_mars * R_MARS;
        OrbitalState {
            radius,
            omega: keplerian_omega(M_MARS, radius),
            eccentricity,
            inclination: 0.5 * eccentricity,
        }
    }

    /// Forcing with the kernel rebuilt from a moderately stirred annulus at 2 R_Mars.
    pub fn dynamic_collisions() -> StepForcing {
        StepForcing::default().with_collisions(CollisionSource::Dynamic(mars_orbit(2.0, 0.05)))
    }
}

/// Assertions for cascade invariants.
pub mod assertions {
    use super::*;

    /// Assert the relative mass change stays within `tolerance`.
    ///
    /// # Panics
    /// Panics if `|final - initial| / initial` exceeds the tolerance.
    pub fn assert_mass_conserved(initial: f64, final_mass: f64, tolerance: f64) {
        let drift = if initial > 0.0 {
            ((final_mass - initial) / initial).abs()
        } else {
            final_mass.abs()
        };
        assert!(
            drift <= tolerance,
            "Mass not conserved: initial={initial:.6e}, final={final_mass:.6e}, drift={drift:.6e}, tolerance={tolerance:.6e}"
        );
    }

    /// Assert every entry is finite and non-negative.
    pub fn assert_non_negative(values: &Array1<f64>) {
        for (k, &v) in values.iter().enumerate() {
            assert!(v.is_finite() && v >= 0.0, "bin {k} holds {v:e}");
        }
    }

    /// Assert the entries sum to one within `tolerance`.
    pub fn assert_normalized(values: &Array1<f64>, tolerance: f64) {
        let sum = values.sum();
        assert!((sum - 1.0).abs() <= tolerance, "fractions sum to {sum:.15}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_matrix_has_empty_diagonal() {
        let matrix = fixtures::frozen_matrix(4, 1e-12);
        assert_eq!(matrix.rate(2, 2), 0.0);
        assert_eq!(matrix.rate(1, 3), 1e-12);
    }

    #[test]
    fn test_mars_orbit_is_keplerian() {
        let orbit = fixtures::mars_orbit(2.0, 0.05);
        let v_k = orbit.keplerian_speed();
        assert!(v_k > 2.0e3 && v_k < 3.0e3);
        assert_eq!(orbit.inclination, 0.025);
    }

    #[test]
    #[should_panic(expected = "Mass not conserved")]
    fn test_mass_assertion_fires() {
        assertions::assert_mass_conserved(1.0, 1.1, 1e-3);
    }
}
