//! Parallel evolution of independent annuli from 1.5 to 8 Mars radii.
//!
//! Run with `RUST_LOG=info cargo run --example annulus_sweep`.

use smolcascade::Result;
use smolcascade::cells::{Cell, CellSet};
use smolcascade::dynamics::{EquilibriumConfig, OrbitalState, VelocityConfig};
use smolcascade::grid::SizeGrid;
use smolcascade::integrator::{CascadeIntegrator, CascadeSettings, CollisionSource, StepForcing};
use smolcascade::loss::{BlowoutSink, DEFAULT_SOUND_SPEED, gas_drag_sink};
use smolcascade::psd::PsdState;
use smolcascade::strength::StrengthModel;
use smolcascade::types::{M_MARS, R_MARS, SECONDS_PER_YEAR, keplerian_omega};

const ANNULI: usize = 12;
const GAS_DENSITY: f64 = 1e-12;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let grid = SizeGrid::logarithmic(1e-6, 1.0, 36, 3000.0)?;
    let settings = CascadeSettings {
        velocity: VelocityConfig {
            equilibrium: Some(EquilibriumConfig::default()),
            ..Default::default()
        },
        ..Default::default()
    };
    let integrator = CascadeIntegrator::new(grid, StrengthModel::basalt(), settings)?;
    let grid = integrator.grid();
    let drag = gas_drag_sink(grid, GAS_DENSITY, DEFAULT_SOUND_SPEED)?;

    let mut radii = Vec::with_capacity(ANNULI);
    let mut cells = CellSet::default();
    for k in 0..ANNULI {
        let r_over_mars = 1.5 + 6.5 * k as f64 / (ANNULI - 1) as f64;
        let radius = r_over_mars * R_MARS;
        let omega = keplerian_omega(M_MARS, radius);
        let orbit = OrbitalState {
            radius,
            omega,
            eccentricity: 1e-3,
            inclination: 5e-4,
        };
        let forcing = StepForcing::default()
            .with_collisions(CollisionSource::Dynamic(orbit))
            .with_blowout(BlowoutSink::from_orbit(Some(2), omega, 1.0)?)
            .with_sink(drag.clone());
        cells.push(Cell::new(PsdState::three_slope(grid, 3.5, 1e-2)?, forcing));
        radii.push(r_over_mars);
    }

    let initial = cells.masses(&integrator);
    let reports = cells.step_all(&integrator, 1e-3 * SECONDS_PER_YEAR)?;

    println!("{:>7} {:>12} {:>12} {:>12} {:>9} {:>5}", "r/R_M", "sigma_0", "sigma", "blowout", "substeps", "conv");
    for ((r, sigma0), report) in radii.iter().zip(&initial).zip(&reports) {
        println!(
            "{:>7.2} {:>12.4e} {:>12.4e} {:>12.4e} {:>9} {:>5}",
            r, sigma0, report.mass_final, report.blowout_mass, report.substeps, report.velocity_converged
        );
    }
    Ok(())
}
