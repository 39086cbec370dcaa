//! Collision velocities and vertical structure of the particle layer.
//!
//! The relative speed between colliding grains follows the low-eccentricity,
//! low-inclination approximation `v_ij = v_K sqrt(1.25 e² + i²)`, and the
//! layer thickness is `H = h_factor · i · r`. When an equilibrium solve is
//! configured the dispersion is instead set self-consistently from the
//! optical depth (see [`equilibrium`]).

pub mod equilibrium;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{CascadeError, Result, ensure_finite, ensure_positive};

pub use equilibrium::{
    EquilibriumConfig, EquilibriumSolution, RestitutionModel, solve_equilibrium_dispersion,
};

/// Eccentricity floor when it is derived from a dispersion.
const MIN_ECCENTRICITY: f64 = 1e-8;

// =============================================================================
// Orbital state
// =============================================================================

/// Bulk orbital state of one annulus.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrbitalState {
    /// Orbital radius (m).
    pub radius: f64,
    /// Keplerian angular velocity Ω (rad/s).
    pub omega: f64,
    /// Mean relative eccentricity.
    pub eccentricity: f64,
    /// Mean relative inclination (rad).
    pub inclination: f64,
}

impl OrbitalState {
    /// Local Keplerian speed v_K = r Ω.
    pub fn keplerian_speed(&self) -> f64 {
        self.radius * self.omega
    }

    fn validate(&self) -> Result<()> {
        ensure_positive("orbital radius", self.radius)?;
        ensure_positive("angular velocity", self.omega)?;
        ensure_finite("eccentricity", self.eccentricity)?;
        ensure_finite("inclination", self.inclination)?;
        if self.eccentricity < 0.0 || self.inclination < 0.0 {
            return Err(CascadeError::InvalidConfig(format!(
                "dispersion must be non-negative (e={}, i={})",
                self.eccentricity, self.inclination
            )));
        }
        Ok(())
    }
}

/// Mutual relative velocity `v_K sqrt(1.25 e² + i²)`.
#[inline]
pub fn relative_velocity(eccentricity: f64, inclination: f64, keplerian_speed: f64) -> f64 {
    (1.25 * eccentricity * eccentricity + inclination * inclination).sqrt() * keplerian_speed
}

/// Periapsis speed `v_K / sqrt(1 - e)` for encounters near pericentre.
pub fn pericenter_velocity(eccentricity: f64, keplerian_speed: f64) -> Result<f64> {
    ensure_finite("eccentricity", eccentricity)?;
    if keplerian_speed < 0.0 {
        return Err(CascadeError::Negative {
            name: "keplerian speed",
            index: 0,
            value: keplerian_speed,
        });
    }
    if eccentricity >= 1.0 {
        return Err(CascadeError::InvalidConfig(format!(
            "pericenter speed needs e < 1 (got {eccentricity})"
        )));
    }
    Ok(keplerian_speed / (1.0 - eccentricity).sqrt().max(1e-8))
}

/// Relax the eccentricity towards `e_eq` over the damping timescale.
///
/// `e(t + dt) = e_eq + (e - e_eq) exp(-dt / t_damp)`
pub fn update_eccentricity(e: f64, e_eq: f64, t_damp: f64, dt: f64) -> Result<f64> {
    ensure_positive("damping timescale", t_damp)?;
    ensure_finite("dt", dt)?;
    Ok(e_eq + (e - e_eq) * (-dt / t_damp).exp())
}

// =============================================================================
// Configuration
// =============================================================================

/// How velocities and scale heights are derived from the orbital state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityConfig {
    /// Scale-height multiplier on `i · r`. Default: 1.0.
    pub h_factor: f64,
    /// Floor on the scale height (m). Default: 1e-6.
    pub min_scale_height: f64,
    /// Self-consistent dispersion solve; `None` uses the given e and i.
    pub equilibrium: Option<EquilibriumConfig>,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            h_factor: 1.0,
            min_scale_height: 1e-6,
            equilibrium: None,
        }
    }
}

impl VelocityConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.h_factor.is_finite() && self.h_factor > 0.0) {
            return Err(CascadeError::InvalidConfig(format!(
                "h_factor must be positive (got {})",
                self.h_factor
            )));
        }
        if !(self.min_scale_height.is_finite() && self.min_scale_height > 0.0) {
            return Err(CascadeError::InvalidConfig(format!(
                "min_scale_height must be positive (got {})",
                self.min_scale_height
            )));
        }
        if let Some(eq) = &self.equilibrium {
            eq.validate()?;
        }
        Ok(())
    }
}

// =============================================================================
// Velocity field
// =============================================================================

/// Source of pairwise impact speeds.
pub trait PairVelocity {
    /// Relative speed (m/s) of a bin-`i` grain hitting a bin-`j` grain.
    fn pair_velocity(&self, i: usize, j: usize) -> f64;
}

impl PairVelocity for f64 {
    fn pair_velocity(&self, _i: usize, _j: usize) -> f64 {
        *self
    }
}

impl PairVelocity for Array2<f64> {
    fn pair_velocity(&self, i: usize, j: usize) -> f64 {
        self[[i, j]]
    }
}

/// Collision velocity and layer thickness for one cell and one outer step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VelocityField {
    /// Eccentricity actually used.
    pub eccentricity: f64,
    /// Inclination actually used.
    pub inclination: f64,
    /// Relative velocity shared by all bin pairs (m/s).
    pub relative_velocity: f64,
    /// Vertical scale height shared by all bins (m).
    pub scale_height: f64,
    /// False when the equilibrium solve hit its iteration cap.
    pub converged: bool,
}

impl VelocityField {
    /// Evaluate the velocity field for the current dispersion state.
    ///
    /// # Arguments
    /// * `orbit` - Radius, angular velocity and dispersion of the cell
    /// * `config` - Scale-height settings and optional equilibrium solve
    /// * `optical_depth` - Current normal optical depth, used by the equilibrium solve
    pub fn evaluate(orbit: &OrbitalState, config: &VelocityConfig, optical_depth: f64) -> Result<Self> {
        orbit.validate()?;
        config.validate()?;
        let v_k = orbit.keplerian_speed();

        let (eccentricity, inclination, converged) = match &config.equilibrium {
            Some(eq) => {
                // Dispersion is a velocity; e and i follow as c/v_K and e/2
                let guess = orbit.eccentricity * v_k;
                let solution = solve_equilibrium_dispersion(optical_depth, guess, eq)?;
                if !solution.converged {
                    warn!(
                        radius = orbit.radius,
                        dispersion = solution.dispersion,
                        "velocity dispersion fixed point not converged"
                    );
                }
                let e = (solution.dispersion / v_k).max(MIN_ECCENTRICITY);
                (e, 0.5 * e, solution.converged)
            }
            None => (orbit.eccentricity, orbit.inclination, true),
        };

        let scale_height =
            (config.h_factor * inclination * orbit.radius).max(config.min_scale_height);

        Ok(Self {
            eccentricity,
            inclination,
            relative_velocity: relative_velocity(eccentricity, inclination, v_k),
            scale_height,
            converged,
        })
    }

    /// Per-bin scale heights for a grid of `n` bins.
    pub fn scale_heights(&self, n: usize) -> Vec<f64> {
        vec![self.scale_height; n]
    }
}

impl PairVelocity for VelocityField {
    fn pair_velocity(&self, _i: usize, _j: usize) -> f64 {
        self.relative_velocity
    }
}
