//! Mass bookkeeping for one IMEX sub-step.

use ndarray::Array1;

use crate::collision::CollisionRates;
use crate::loss::LossChannels;

/// Mass moved by each channel during one sub-step (kg/m²).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct SubstepMasses {
    pub mass_before: f64,
    pub mass_after: f64,
    /// Mass passing through collisions, gross of fragments that land back
    /// in a colliding bin.
    pub collisional: f64,
    pub blowout: f64,
    pub sink: f64,
    pub source: f64,
    /// Fragment mass produced at or below the blow-out threshold.
    pub sub_blowout: f64,
}

impl SubstepMasses {
    /// Evaluate the channel masses of a trial update.
    ///
    /// # Arguments
    /// * `masses` - Per-bin particle mass
    /// * `before` / `after` - Populations at the start and end of the sub-step
    /// * `channels` - Loss rates the update used
    /// * `collisions` - Collision rates the update used
    /// * `source` - External number injection rates
    /// * `threshold` - Highest blow-out bin, if any
    /// * `dt` - Sub-step length
    pub fn evaluate(
        masses: &Array1<f64>,
        before: &Array1<f64>,
        after: &Array1<f64>,
        channels: &LossChannels,
        collisions: &CollisionRates,
        source: &Array1<f64>,
        threshold: Option<usize>,
        dt: f64,
    ) -> Self {
        let mass_after_per_bin = after * masses;
        let sub_blowout = match threshold {
            Some(index) => collisions.fragment_mass.iter().take(index + 1).sum::<f64>() * dt,
            None => 0.0,
        };
        Self {
            mass_before: (before * masses).sum(),
            mass_after: mass_after_per_bin.sum(),
            collisional: collisions.processed_mass() * dt,
            blowout: mass_after_per_bin.dot(&channels.blowout) * dt,
            sink: mass_after_per_bin.dot(&channels.external) * dt,
            source: source.dot(masses) * dt,
            sub_blowout,
        }
    }

    /// Relative mass-budget error of the sub-step, see [`mass_budget_residual`].
    pub fn residual(&self) -> f64 {
        mass_budget_residual(
            self.mass_before,
            self.mass_after,
            self.source,
            self.blowout + self.sink,
        )
    }
}

/// Relative mismatch between the mass change and the external fluxes.
///
/// `|M_after - (M_before + added - removed)| / M_before`, falling back to
/// `M_after` as the reference when the cell started empty and to zero when
/// both are empty. Collisions redistribute mass internally, so any
/// collisional contribution left in the difference is integration error.
pub fn mass_budget_residual(mass_before: f64, mass_after: f64, added: f64, removed: f64) -> f64 {
    let expected = mass_before + added - removed;
    let reference = if mass_before > 0.0 {
        mass_before
    } else if mass_after > 0.0 {
        mass_after
    } else {
        return 0.0;
    };
    (mass_after - expected).abs() / reference
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_residual_balances_external_fluxes() {
        assert_eq!(mass_budget_residual(10.0, 9.0, 1.0, 2.0), 0.0);
        assert_relative_eq!(mass_budget_residual(10.0, 9.5, 0.0, 1.0), 0.05, max_relative = 1e-12);
    }

    #[test]
    fn test_residual_of_empty_cell() {
        assert_eq!(mass_budget_residual(0.0, 0.0, 0.0, 0.0), 0.0);
        // Source into an empty cell uses the final mass as reference
        assert_eq!(mass_budget_residual(0.0, 2.0, 2.0, 0.0), 0.0);
        assert_relative_eq!(mass_budget_residual(0.0, 2.0, 1.0, 0.0), 0.5, max_relative = 1e-12);
    }

    #[test]
    fn test_channel_masses() {
        let masses = array![1.0, 10.0];
        let before = array![4.0, 1.0];
        let after = array![2.0, 1.0];
        let channels = LossChannels {
            collisional: array![0.0, 0.1],
            blowout: array![0.5, 0.0],
            external: array![0.0, 0.0],
        };
        let collisions = CollisionRates {
            gain: array![3.0, 0.0],
            removal: array![0.0, 0.3],
            fragment_mass: array![3.0, 1.0],
        };
        let source = array![0.0, 0.2];
        let m = SubstepMasses::evaluate(&masses, &before, &after, &channels, &collisions, &source, Some(0), 1.0);

        assert_eq!(m.mass_before, 14.0);
        assert_eq!(m.mass_after, 12.0);
        assert_relative_eq!(m.collisional, 4.0, max_relative = 1e-12);
        assert_relative_eq!(m.blowout, 1.0, max_relative = 1e-12);
        assert_relative_eq!(m.source, 2.0, max_relative = 1e-12);
        assert_relative_eq!(m.sub_blowout, 3.0, max_relative = 1e-12);
        // 14 + 2 - 1 = 15 against 12
        assert_relative_eq!(m.residual(), 3.0 / 14.0, max_relative = 1e-12);
    }
}
