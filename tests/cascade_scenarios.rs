//! Integration tests for whole outer steps of the cascade.

mod common;

use approx::assert_relative_eq;
use ndarray::Array1;
use smolcascade::dynamics::{EquilibriumConfig, VelocityConfig};
use smolcascade::integrator::{CascadeSettings, CollisionSource, StepForcing};
use smolcascade::loss::{BlowoutSink, assemble_losses, uniform_sink};
use smolcascade::psd::PsdState;

#[test]
fn test_frozen_kernel_single_step_matches_implicit_update() {
    common::init_tracing();
    let integrator = common::integrator();
    let grid = integrator.grid();
    let mut psd = common::uniform_psd(grid);
    assert_relative_eq!(psd.total_mass(grid), 1e-3, max_relative = 1e-12);

    let matrix = common::frozen_matrix(40, 1e-12);
    let impact_velocity = 100.0;
    let forcing = StepForcing::default().with_collisions(CollisionSource::Frozen {
        matrix: matrix.clone(),
        impact_velocity,
    });
    let before = psd.numbers().clone();

    let report = integrator.step(&mut psd, &forcing, 1.0).unwrap();
    assert_eq!(report.substeps, 1);
    assert_eq!(report.retries, 0);

    let numbers = before.to_vec();
    let collisions = integrator
        .fragment_tensor()
        .collision_rates(&matrix, &numbers, &impact_velocity)
        .unwrap();
    let losses = assemble_losses(&collisions, &numbers, None, None).unwrap();
    let total_loss = losses.total();
    let mut expected = Array1::zeros(40);
    for k in 0..40 {
        expected[k] = (before[k] + collisions.gain[k]) / (1.0 + total_loss[k]);
        assert_relative_eq!(psd.numbers()[k], expected[k], max_relative = 1e-12);
    }

    // Explicit gain against implicit loss leaves a second-order budget error
    let masses = grid.masses();
    let mass_before = before.dot(masses);
    let closed_form = (expected.dot(masses) - mass_before).abs() / mass_before;
    assert_relative_eq!(report.max_residual, closed_form, max_relative = 1e-6);
    assert!(report.max_residual < 1e-6, "residual {}", report.max_residual);
}

#[test]
fn test_blowout_follows_exponential_decay() {
    common::init_tracing();
    let integrator = common::integrator();
    let grid = integrator.grid();
    // Equal mass per bin so the removed mass is resolvable against the total
    let mut psd = PsdState::from_numbers(grid, grid.masses().mapv(|m| 1e-5 / m).to_vec()).unwrap();
    let before = psd.numbers().clone();
    let forcing = StepForcing::default().with_blowout(BlowoutSink::new(Some(2), 1e3).unwrap());

    let report = integrator.step(&mut psd, &forcing, 1e4).unwrap();
    // Sub-steps capped at 0.1 t_blow
    assert_eq!(report.substeps, 100);

    let expected = -10.0;
    for k in 0..3 {
        let log_ratio = (psd.numbers()[k] / before[k]).ln();
        assert_relative_eq!(log_ratio, expected, max_relative = 0.1);
    }
    for k in 3..40 {
        assert_eq!(psd.numbers()[k], before[k]);
    }
    assert!(report.blowout_mass > 0.0);
    assert_relative_eq!(
        report.blowout_mass,
        report.mass_initial - report.mass_final,
        max_relative = 1e-9
    );
}

#[test]
fn test_blowout_removes_more_with_higher_threshold() {
    let integrator = common::integrator();
    let start = common::uniform_psd(integrator.grid());

    let mut previous = 0.0;
    for threshold in [0, 2, 5, 11, 39] {
        let mut psd = start.clone();
        let forcing = StepForcing::default().with_blowout(BlowoutSink::new(Some(threshold), 5e2).unwrap());
        let report = integrator.step(&mut psd, &forcing, 2e3).unwrap();
        assert!(report.blowout_mass >= previous);
        previous = report.blowout_mass;
    }
}

#[test]
fn test_zero_forcing_leaves_population_unchanged() {
    let integrator = common::integrator();
    let grid = integrator.grid();
    let mut psd = PsdState::three_slope(grid, 3.5, 2.0).unwrap();
    let before = psd.clone();
    let forcing = StepForcing::default()
        .with_sink(Array1::zeros(40))
        .with_source(Array1::zeros(40))
        .with_blowout(BlowoutSink::new(None, 1e3).unwrap());

    let report = integrator.step(&mut psd, &forcing, 3.15e7).unwrap();
    assert_eq!(psd, before);
    assert_eq!(report.mass_removed(), 0.0);
}

#[test]
fn test_collisions_with_blowout_report_sub_blowout_production() {
    common::init_tracing();
    let integrator = common::integrator();
    let mut psd = common::uniform_psd(integrator.grid());
    let forcing = StepForcing::default()
        .with_collisions(CollisionSource::Dynamic(common::mars_orbit(2.0, 0.05)))
        .with_blowout(BlowoutSink::new(Some(5), 1e3).unwrap());

    let report = integrator.step(&mut psd, &forcing, 1e4).unwrap();
    assert!(report.sub_blowout_production > 0.0);
    assert!(report.blowout_mass > 0.0);
    assert!(report.collisional_mass > 0.0);
    assert!(report.max_residual <= 5e-3);
    assert!(psd.numbers().iter().all(|&n| n.is_finite() && n >= 0.0));
}

#[test]
fn test_external_sink_and_source_balance() {
    let integrator = common::integrator();
    let grid = integrator.grid();
    let mut psd = common::uniform_psd(grid);
    let sink = uniform_sink(40, 1e5).unwrap();
    // Replace exactly what the sink removes from the initial state
    let source = psd.numbers() * &sink;
    let forcing = StepForcing::default().with_sink(sink).with_source(source);

    let report = integrator.step(&mut psd, &forcing, 1e4).unwrap();
    assert_relative_eq!(report.mass_final, report.mass_initial, max_relative = 1e-12);
    assert_relative_eq!(report.sink_mass, report.source_mass, max_relative = 1e-12);
}

#[test]
fn test_equilibrium_velocity_run_converges() {
    let settings = CascadeSettings {
        velocity: VelocityConfig {
            equilibrium: Some(EquilibriumConfig::default()),
            ..Default::default()
        },
        ..Default::default()
    };
    let integrator = common::integrator_with(common::grid40(), settings);
    let mut psd = PsdState::three_slope(integrator.grid(), 3.5, 1e-2).unwrap();
    let forcing =
        StepForcing::default().with_collisions(CollisionSource::Dynamic(common::mars_orbit(2.5, 0.01)));

    let report = integrator.step(&mut psd, &forcing, 1e3).unwrap();
    assert!(report.velocity_converged);
    assert!(report.min_collision_time.is_finite());
}

#[test]
fn test_settings_round_trip_through_defaults() {
    // Missing fields fall back to their defaults
    let settings: CascadeSettings = serde_json::from_str(r#"{"integrator": {"safety": 0.05}}"#).unwrap();
    assert_eq!(settings.integrator.safety, 0.05);
    assert_eq!(settings.integrator.max_retries, 24);
    assert_eq!(settings.fragments.alpha_cratering, 3.5);
}
