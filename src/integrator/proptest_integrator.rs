//! Property-based tests for the cascade integrator using proptest.
//!
//! These tests check the invariants of accepted steps across a range of
//! populations, rates and step lengths.

use proptest::prelude::*;

use crate::integrator::StepForcing;
use crate::loss::BlowoutSink;
use crate::psd::PsdState;
use crate::test_utils::{assertions, fixtures};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every colliding pair hands out exactly its own mass.
    #[test]
    fn prop_fragment_fractions_normalized(
        i in 0usize..40,
        j in 0usize..40,
        log_v in 0.0f64..6.0,
    ) {
        let integrator = fixtures::integrator(fixtures::grid40());
        let (y, _) = integrator.fragment_tensor().redistribution(i, j, 10f64.powf(log_v));
        assertions::assert_non_negative(&y);
        prop_assert!((y.sum() - 1.0).abs() <= 1e-9, "sum = {}", y.sum());
    }

    /// Zero forcing leaves any population untouched.
    #[test]
    fn prop_zero_forcing_is_identity(
        numbers in prop::collection::vec(0.0f64..1e3, 40),
        dt in 1e-3f64..1e9,
    ) {
        let integrator = fixtures::integrator(fixtures::grid40());
        let mut psd = PsdState::from_numbers(integrator.grid(), numbers).unwrap();
        let before = psd.clone();
        integrator.step(&mut psd, &StepForcing::default(), dt).unwrap();
        prop_assert_eq!(psd, before);
    }

    /// Raising the blow-out threshold never removes less mass.
    #[test]
    fn prop_blowout_monotone_in_threshold(
        low in 0usize..40,
        extra in 0usize..40,
        residence in 1e2f64..1e4,
    ) {
        let high = (low + extra).min(39);
        let integrator = fixtures::integrator(fixtures::grid40());
        let start = fixtures::three_slope_psd(integrator.grid());

        let removed = |threshold: usize| {
            let mut psd = start.clone();
            let sink = BlowoutSink::new(Some(threshold), residence).unwrap();
            let forcing = StepForcing::default().with_blowout(sink);
            integrator.step(&mut psd, &forcing, 1e3).unwrap().blowout_mass
        };
        prop_assert!(removed(high) >= removed(low));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Accepted steps keep populations non-negative, conserve mass and
    /// respect the stiffness bound.
    #[test]
    fn prop_collisions_positive_and_conservative(
        log_rate in -14.0f64..-12.0,
        log_v in 1.0f64..5.0,
        dt in 1.0f64..50.0,
    ) {
        let integrator = fixtures::integrator(fixtures::grid40());
        let mut psd = fixtures::uniform_psd(integrator.grid());
        let forcing = fixtures::frozen_collisions(40, 10f64.powf(log_rate), 10f64.powf(log_v));

        let report = integrator.step(&mut psd, &forcing, dt).unwrap();
        let config = integrator.settings().integrator;

        assertions::assert_non_negative(psd.numbers());
        prop_assert!(report.max_residual <= config.mass_tol);
        prop_assert!(report.max_stiffness <= config.safety * (1.0 + 1e-12));
        assertions::assert_mass_conserved(
            report.mass_initial,
            report.mass_final,
            config.mass_tol * report.substeps as f64,
        );
    }
}
