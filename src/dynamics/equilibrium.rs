//! Self-regulated velocity dispersion.
//!
//! Shear stirring heats the ring while inelastic collisions damp it. The
//! balance is solved for the equilibrium dispersion `c_eq` by a bounded,
//! damped fixed-point iteration:
//!
//! ```text
//! c_new = sqrt(f_wake · τ / (1 - ε(c)²))
//! c    <- (c + c_new) / 2
//! ```
//!
//! Non-convergence is not an error: the last iterate is returned with
//! `converged = false` and the caller records the flag.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CascadeError, Result};

/// Smallest dispersion the iteration starts from.
const MIN_DISPERSION: f64 = 1e-6;

/// Restitution is kept strictly below one so the damping rate never vanishes.
const MAX_RESTITUTION: f64 = 1.0 - 1e-6;

/// Coefficient of restitution ε as a function of impact speed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RestitutionModel {
    /// Speed-independent restitution.
    Constant { epsilon: f64 },
    /// Bridges-type law ε = min(1, (v / v_c)^(-exponent)).
    PowerLaw {
        /// Critical speed v_c (same units as the dispersion).
        critical_velocity: f64,
        /// Power-law exponent, 0.234 for frost-covered ice.
        exponent: f64,
    },
}

impl Default for RestitutionModel {
    fn default() -> Self {
        RestitutionModel::Constant { epsilon: 0.5 }
    }
}

impl RestitutionModel {
    /// Restitution coefficient at impact speed `c`, clamped to `[0, 1)`.
    pub fn coefficient(&self, c: f64) -> f64 {
        let raw = match *self {
            RestitutionModel::Constant { epsilon } => epsilon,
            RestitutionModel::PowerLaw {
                critical_velocity,
                exponent,
            } => {
                if c <= critical_velocity || critical_velocity <= 0.0 {
                    1.0
                } else {
                    (c / critical_velocity).powf(-exponent)
                }
            }
        };
        if raw.is_finite() {
            raw.clamp(0.0, MAX_RESTITUTION)
        } else {
            0.0
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            RestitutionModel::Constant { epsilon } if !(0.0..1.0).contains(&epsilon) => Err(
                CascadeError::InvalidConfig(format!("restitution {epsilon} outside [0, 1)")),
            ),
            RestitutionModel::PowerLaw {
                critical_velocity,
                exponent,
            } if !(critical_velocity.is_finite()
                && critical_velocity > 0.0
                && exponent.is_finite()
                && exponent > 0.0) =>
            {
                Err(CascadeError::InvalidConfig(format!(
                    "power-law restitution needs positive v_c and exponent (got {critical_velocity}, {exponent})"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Settings for the equilibrium dispersion solve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquilibriumConfig {
    /// Wake enhancement factor f_wake (≥ 1). Default: 1.0.
    pub f_wake: f64,
    /// Iteration cap. Default: 100.
    pub max_iter: u32,
    /// Relative convergence tolerance. Default: 1e-6.
    pub tol: f64,
    /// Restitution law. Default: constant ε = 0.5.
    pub restitution: RestitutionModel,
}

impl Default for EquilibriumConfig {
    fn default() -> Self {
        Self {
            f_wake: 1.0,
            max_iter: 100,
            tol: 1e-6,
            restitution: RestitutionModel::default(),
        }
    }
}

impl EquilibriumConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.f_wake.is_finite() && self.f_wake >= 1.0) {
            return Err(CascadeError::InvalidConfig(format!(
                "f_wake must be >= 1 (got {})",
                self.f_wake
            )));
        }
        if self.max_iter == 0 {
            return Err(CascadeError::InvalidConfig("max_iter must be positive".into()));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(CascadeError::InvalidConfig(format!(
                "tolerance must be positive (got {})",
                self.tol
            )));
        }
        self.restitution.validate()
    }
}

/// Outcome of the equilibrium solve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumSolution {
    /// Equilibrium dispersion (last iterate when not converged).
    pub dispersion: f64,
    /// Iterations performed.
    pub iterations: u32,
    /// Whether the tolerance was met within the cap.
    pub converged: bool,
}

/// Solve the heating/damping balance for the equilibrium dispersion.
///
/// # Arguments
/// * `optical_depth` - Normal optical depth τ of the cell (≥ 0)
/// * `initial_guess` - Starting dispersion, typically the current value
/// * `config` - Wake factor, iteration cap, tolerance and restitution law
pub fn solve_equilibrium_dispersion(
    optical_depth: f64,
    initial_guess: f64,
    config: &EquilibriumConfig,
) -> Result<EquilibriumSolution> {
    if !(optical_depth.is_finite() && optical_depth >= 0.0) {
        return Err(CascadeError::NonFinite {
            name: "optical depth",
            value: optical_depth,
        });
    }
    config.validate()?;

    let mut c = if initial_guess.is_finite() {
        initial_guess.max(MIN_DISPERSION)
    } else {
        MIN_DISPERSION
    };

    for iteration in 1..=config.max_iter {
        let epsilon = config.restitution.coefficient(c);
        // Stirring ∝ f_wake τ, damping ∝ (1 - ε²)
        let stirring = config.f_wake * optical_depth;
        let damping = (1.0 - epsilon * epsilon).max(1e-12);
        let c_new = (stirring / damping).sqrt();
        debug!(iteration, c, epsilon, c_new, "equilibrium dispersion iterate");

        if (c_new - c).abs() <= config.tol * c_new.max(1.0) {
            return Ok(EquilibriumSolution {
                dispersion: c_new,
                iterations: iteration,
                converged: true,
            });
        }
        c = 0.5 * (c + c_new);
    }

    warn!(
        max_iter = config.max_iter,
        dispersion = c,
        "equilibrium dispersion did not converge; using last iterate"
    );
    Ok(EquilibriumSolution {
        dispersion: c,
        iterations: config.max_iter,
        converged: false,
    })
}
