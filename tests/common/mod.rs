//! Common test utilities for integration tests.

#![allow(dead_code)]

use ndarray::Array2;
use smolcascade::collision::CollisionMatrix;
use smolcascade::dynamics::OrbitalState;
use smolcascade::grid::SizeGrid;
use smolcascade::integrator::{CascadeIntegrator, CascadeSettings};
use smolcascade::psd::PsdState;
use smolcascade::strength::StrengthModel;
use smolcascade::types::{M_MARS, R_MARS, keplerian_omega};

/// Route `tracing` output to the test harness; `RUST_LOG` selects the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// 40 logarithmic bins from 1 µm to 3 m at 3000 kg/m³.
pub fn grid40() -> SizeGrid {
    SizeGrid::logarithmic(1e-6, 3.0, 40, 3000.0).unwrap()
}

/// Integrator over `grid` with basalt strength and the given settings.
pub fn integrator_with(grid: SizeGrid, settings: CascadeSettings) -> CascadeIntegrator {
    CascadeIntegrator::new(grid, StrengthModel::basalt(), settings).unwrap()
}

/// Integrator over the 40-bin grid with default settings.
pub fn integrator() -> CascadeIntegrator {
    integrator_with(grid40(), CascadeSettings::default())
}

/// Uniform population holding 1e-3 kg/m².
pub fn uniform_psd(grid: &SizeGrid) -> PsdState {
    PsdState::uniform(grid, 1e-3).unwrap()
}

/// Off-diagonal rate matrix with a zero diagonal.
pub fn frozen_matrix(n: usize, rate: f64) -> CollisionMatrix {
    let mut rates = Array2::from_elem((n, n), rate);
    rates.diag_mut().fill(0.0);
    CollisionMatrix::from_rates(rates).unwrap()
}

/// Annulus around Mars at `radius_in_mars` planetary radii with i = e/2.
pub fn mars_orbit(radius_in_mars: f64, eccentricity: f64) -> OrbitalState {
    let radius = radius_in_mars * R_MARS;
    OrbitalState {
        radius,
        omega: keplerian_omega(M_MARS, radius),
        eccentricity,
        inclination: 0.5 * eccentricity,
    }
}
