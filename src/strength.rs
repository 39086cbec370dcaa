//! Critical specific energy for catastrophic disruption, Q_D*.
//!
//! Each coefficient set describes the Benz & Asphaug (1999) two-branch law
//!
//! ```text
//! Q_D*(s) = Q_s · s^(-a_s) + B · ρ · s^(b_g)
//! ```
//!
//! with a material-strength branch dominating small bodies and a gravity
//! branch dominating large ones. Sets are tabulated at reference impact
//! velocities and Q_D* is linearly interpolated between them following
//! Leinhardt & Stewart (2012). Outside the tabulated range the nearest set is
//! used unchanged.

use serde::{Deserialize, Serialize};

use crate::error::{CascadeError, Result, ensure_positive};

/// One set of strength-law coefficients (SI units, radius in metres).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrengthCoefficients {
    /// Strength-regime normalization Q_s (J/kg).
    pub q_s: f64,
    /// Strength-regime size exponent a_s.
    pub a_s: f64,
    /// Gravity-regime normalization B.
    pub b: f64,
    /// Gravity-regime size exponent b_g.
    pub b_g: f64,
}

impl StrengthCoefficients {
    /// Evaluate Q_D* for a body of radius `s` (m) and density `rho` (kg/m³).
    #[inline]
    pub fn q_d_star(&self, s: f64, rho: f64) -> f64 {
        self.q_s * s.powf(-self.a_s) + self.b * rho * s.powf(self.b_g)
    }

    fn validate(&self) -> Result<()> {
        let finite = [self.q_s, self.a_s, self.b, self.b_g]
            .iter()
            .all(|c| c.is_finite());
        if !finite {
            return Err(CascadeError::InvalidStrength(format!(
                "non-finite coefficient in {self:?}"
            )));
        }
        if self.q_s <= 0.0 || self.b <= 0.0 {
            return Err(CascadeError::InvalidStrength(format!(
                "Q_s and B must be positive in {self:?}"
            )));
        }
        Ok(())
    }
}

/// Strength coefficients tabulated against impact velocity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrengthModel {
    /// `(reference velocity in m/s, coefficients)`, strictly increasing in velocity.
    table: Vec<(f64, StrengthCoefficients)>,
}

impl Default for StrengthModel {
    /// Basalt-like material at 3 and 5 km/s.
    fn default() -> Self {
        Self::basalt()
    }
}

impl StrengthModel {
    /// Build a model from `(velocity, coefficients)` entries.
    ///
    /// Entries must be non-empty, have finite positive velocities in strictly
    /// increasing order and valid coefficients.
    pub fn new(table: Vec<(f64, StrengthCoefficients)>) -> Result<Self> {
        if table.is_empty() {
            return Err(CascadeError::InvalidStrength("empty coefficient table".into()));
        }
        for (velocity, coeffs) in &table {
            if !(velocity.is_finite() && *velocity > 0.0) {
                return Err(CascadeError::InvalidStrength(format!(
                    "reference velocity {velocity} must be finite and positive"
                )));
            }
            coeffs.validate()?;
        }
        if table.windows(2).any(|w| w[1].0 <= w[0].0) {
            return Err(CascadeError::InvalidStrength(
                "reference velocities must be strictly increasing".into(),
            ));
        }
        Ok(Self { table })
    }

    /// Basalt-like coefficients at 3 and 5 km/s.
    pub fn basalt() -> Self {
        Self {
            table: vec![
                (
                    3.0e3,
                    StrengthCoefficients {
                        q_s: 3.5e7,
                        a_s: 0.38,
                        b: 0.3,
                        b_g: 1.36,
                    },
                ),
                (
                    5.0e3,
                    StrengthCoefficients {
                        q_s: 7.0e7,
                        a_s: 0.38,
                        b: 0.5,
                        b_g: 1.36,
                    },
                ),
            ],
        }
    }

    /// Tabulated `(velocity, coefficients)` entries.
    pub fn table(&self) -> &[(f64, StrengthCoefficients)] {
        &self.table
    }

    /// Critical specific energy Q_D* (J/kg).
    ///
    /// # Arguments
    /// * `s` - Target radius (m)
    /// * `rho` - Bulk density (kg/m³)
    /// * `velocity` - Impact velocity (m/s)
    pub fn critical_energy(&self, s: f64, rho: f64, velocity: f64) -> Result<f64> {
        ensure_positive("size", s)?;
        ensure_positive("density", rho)?;
        ensure_positive("impact velocity", velocity)?;
        Ok(self.critical_energy_unchecked(s, rho, velocity))
    }

    /// Q_D* without argument validation; callers guarantee positive finite inputs.
    pub(crate) fn critical_energy_unchecked(&self, s: f64, rho: f64, velocity: f64) -> f64 {
        let (v_lo, lo) = self.table[0];
        if velocity <= v_lo || self.table.len() == 1 {
            return lo.q_d_star(s, rho);
        }
        let (v_hi, hi) = self.table[self.table.len() - 1];
        if velocity >= v_hi {
            return hi.q_d_star(s, rho);
        }

        // First entry strictly above the velocity; guaranteed in 1..len
        let upper = self.table.partition_point(|(v, _)| *v <= velocity);
        let (v0, c0) = self.table[upper - 1];
        let (v1, c1) = self.table[upper];
        let weight = (velocity - v0) / (v1 - v0);
        c0.q_d_star(s, rho) * (1.0 - weight) + c1.q_d_star(s, rho) * weight
    }
}
