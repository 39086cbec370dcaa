//! Collisional grinding of a debris annulus around a hot Mars.
//!
//! Run with `RUST_LOG=info cargo run --example blowout_cascade`.

use smolcascade::Result;
use smolcascade::dynamics::OrbitalState;
use smolcascade::grid::SizeGrid;
use smolcascade::integrator::{CascadeIntegrator, CascadeSettings, CollisionSource, StepForcing};
use smolcascade::loss::BlowoutSink;
use smolcascade::psd::PsdState;
use smolcascade::radiation::{BlowoutSearch, CentralBody, blowout_threshold};
use smolcascade::strength::StrengthModel;
use smolcascade::types::{M_MARS, R_MARS, SECONDS_PER_DAY, keplerian_omega};

const ORBIT_IN_MARS_RADII: f64 = 2.5;
const MARS_TEMPERATURE: f64 = 4000.0;
const OUTER_STEPS: usize = 10;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let grid = SizeGrid::logarithmic(1e-7, 3.0, 48, 3000.0)?;
    let body = CentralBody::mars(MARS_TEMPERATURE);
    let threshold = blowout_threshold(&grid, &body, |_, _| 1.0, &BlowoutSearch::default())?;

    let radius = ORBIT_IN_MARS_RADII * R_MARS;
    let omega = keplerian_omega(M_MARS, radius);
    let orbit = OrbitalState {
        radius,
        omega,
        eccentricity: 0.05,
        inclination: 0.025,
    };
    let forcing = StepForcing::default()
        .with_collisions(CollisionSource::Dynamic(orbit))
        .with_blowout(BlowoutSink::from_orbit(threshold, omega, 1.0)?);

    let integrator = CascadeIntegrator::new(grid, StrengthModel::basalt(), CascadeSettings::default())?;
    let mut psd = PsdState::three_slope(integrator.grid(), 3.5, 1e-2)?;

    println!("blow-out threshold bin: {threshold:?}");
    println!("{:>5} {:>12} {:>12} {:>12} {:>9} {:>10}", "day", "sigma", "blowout", "tau", "substeps", "t_coll");
    for day in 1..=OUTER_STEPS {
        let report = integrator.step(&mut psd, &forcing, SECONDS_PER_DAY)?;
        println!(
            "{:>5} {:>12.4e} {:>12.4e} {:>12.4e} {:>9} {:>10.3e}",
            day,
            report.mass_final,
            report.blowout_mass,
            psd.optical_depth(integrator.grid()),
            report.substeps,
            report.min_collision_time,
        );
    }
    Ok(())
}
