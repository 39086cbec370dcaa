//! IMEX time stepping of the collisional cascade.
//!
//! Each outer step is split into sub-steps. Per sub-step the collision
//! kernel, fragment gain and loss rates are rebuilt from the current
//! population (fragments returning to a colliding bin are netted against its
//! removal), then
//!
//! ```text
//! N_new = (N_old + dt (G + F)) / (1 + dt S)
//! ```
//!
//! treats the stiff loss implicitly and the gain explicitly. The sub-step
//! length is capped at a safety fraction of the shortest collisional (and
//! blow-out) timescale. A sub-step whose mass budget misses tolerance or that
//! produces a negative population is rejected and retried at half length.

mod budget;
#[cfg(test)]
mod proptest_integrator;

use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::collision::{
    CollisionMatrix, CollisionRates, FragmentConfig, FragmentTensor, build_collision_matrix,
};
use crate::dynamics::{OrbitalState, PairVelocity, VelocityConfig, VelocityField};
use crate::error::{CascadeError, Result, ensure_bin_vector, ensure_finite, ensure_positive};
use crate::grid::SizeGrid;
use crate::loss::{BlowoutSink, LossChannels, assemble_losses};
use crate::psd::PsdState;
use crate::strength::StrengthModel;

use budget::SubstepMasses;
pub use budget::mass_budget_residual;

// =============================================================================
// Configuration
// =============================================================================

/// Sub-step control.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorConfig {
    /// Fraction of the shortest loss timescale a sub-step may span. Default: 0.1.
    pub safety: f64,
    /// Accepted relative mass-budget residual per sub-step. Default: 5e-3.
    pub mass_tol: f64,
    /// Halvings allowed for one sub-step before giving up. Default: 24.
    pub max_retries: u32,
    /// Sub-steps allowed per outer step. Default: 1_000_000.
    pub max_substeps: u64,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            safety: 0.1,
            mass_tol: 5e-3,
            max_retries: 24,
            max_substeps: 1_000_000,
        }
    }
}

impl IntegratorConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.safety.is_finite() && self.safety > 0.0 && self.safety <= 1.0) {
            return Err(CascadeError::InvalidConfig(format!(
                "safety must lie in (0, 1] (got {})",
                self.safety
            )));
        }
        if !(self.mass_tol.is_finite() && self.mass_tol > 0.0) {
            return Err(CascadeError::InvalidConfig(format!(
                "mass_tol must be positive (got {})",
                self.mass_tol
            )));
        }
        if self.max_substeps == 0 {
            return Err(CascadeError::InvalidConfig("max_substeps must be positive".into()));
        }
        Ok(())
    }
}

/// All tunables of a cascade run, loadable with serde.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeSettings {
    pub integrator: IntegratorConfig,
    pub velocity: VelocityConfig,
    pub fragments: FragmentConfig,
}

impl CascadeSettings {
    pub fn validate(&self) -> Result<()> {
        self.integrator.validate()?;
        self.velocity.validate()?;
        self.fragments.validate()
    }
}

// =============================================================================
// Forcing and report
// =============================================================================

/// Where collision rates come from during an outer step.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum CollisionSource {
    /// No collisions.
    #[default]
    Disabled,
    /// Kernel rebuilt each sub-step from the population and this orbital state.
    Dynamic(OrbitalState),
    /// Caller-fixed rate matrix and a single impact speed for fragmentation.
    Frozen {
        matrix: CollisionMatrix,
        impact_velocity: f64,
    },
}

/// External inputs held constant over one outer step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepForcing {
    pub collisions: CollisionSource,
    pub blowout: Option<BlowoutSink>,
    /// External sink rates per bin (1/s).
    pub sink: Option<Array1<f64>>,
    /// External source rates per bin (number · m⁻² · s⁻¹).
    pub source: Option<Array1<f64>>,
}

impl StepForcing {
    pub fn with_collisions(mut self, collisions: CollisionSource) -> Self {
        self.collisions = collisions;
        self
    }

    pub fn with_blowout(mut self, blowout: BlowoutSink) -> Self {
        self.blowout = Some(blowout);
        self
    }

    pub fn with_sink(mut self, sink: Array1<f64>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_source(mut self, source: Array1<f64>) -> Self {
        self.source = Some(source);
        self
    }

    fn validate(&self, n: usize) -> Result<()> {
        match &self.collisions {
            CollisionSource::Frozen {
                matrix,
                impact_velocity,
            } => {
                if matrix.len() != n {
                    return Err(CascadeError::ShapeMismatch {
                        name: "frozen collision matrix",
                        expected: n,
                        got: matrix.len(),
                    });
                }
                ensure_finite("impact velocity", *impact_velocity)?;
            }
            CollisionSource::Disabled | CollisionSource::Dynamic(_) => {}
        }
        if let Some(blowout) = &self.blowout {
            blowout.rates(n)?;
        }
        if let Some(sink) = &self.sink {
            ensure_bin_vector("external sink", &sink.to_vec(), n)?;
        }
        if let Some(source) = &self.source {
            ensure_bin_vector("external source", &source.to_vec(), n)?;
        }
        Ok(())
    }

    fn active_blowout(&self) -> Option<&BlowoutSink> {
        self.blowout.as_ref().filter(|b| b.is_active())
    }
}

/// Diagnostics of one outer step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StepReport {
    /// Requested outer step (s).
    pub dt: f64,
    /// Time actually advanced (s); short of `dt` only in a failed step.
    pub elapsed: f64,
    pub substeps: u64,
    /// Rejected sub-step attempts.
    pub retries: u32,
    pub mass_initial: f64,
    pub mass_final: f64,
    /// Mass processed by collisions (gross, kg/m²).
    pub collisional_mass: f64,
    /// Mass removed by blow-out (kg/m²).
    pub blowout_mass: f64,
    /// Mass removed by external sinks (kg/m²).
    pub sink_mass: f64,
    /// Mass injected by the external source (kg/m²).
    pub source_mass: f64,
    /// Fragment mass produced at or below the blow-out threshold (kg/m²).
    pub sub_blowout_production: f64,
    /// Shortest collisional timescale seen (s); infinite without collisions.
    pub min_collision_time: f64,
    /// Largest ratio of accepted sub-step length to the collisional timescale.
    pub max_stiffness: f64,
    /// Largest accepted mass-budget residual.
    pub max_residual: f64,
    /// False when a velocity equilibrium solve hit its cap.
    pub velocity_converged: bool,
    /// Kernel pairs clamped to zero, summed over sub-steps.
    pub clamped_pairs: usize,
}

impl StepReport {
    fn new(dt: f64, mass: f64) -> Self {
        Self {
            dt,
            elapsed: 0.0,
            substeps: 0,
            retries: 0,
            mass_initial: mass,
            mass_final: mass,
            collisional_mass: 0.0,
            blowout_mass: 0.0,
            sink_mass: 0.0,
            source_mass: 0.0,
            sub_blowout_production: 0.0,
            min_collision_time: f64::INFINITY,
            max_stiffness: 0.0,
            max_residual: 0.0,
            velocity_converged: true,
            clamped_pairs: 0,
        }
    }

    /// Mass removed from the cell by blow-out and sinks.
    pub fn mass_removed(&self) -> f64 {
        self.blowout_mass + self.sink_mass
    }

    fn accept(&mut self, dt: f64, masses: &SubstepMasses, residual: f64, t_coll: f64) {
        self.elapsed += dt;
        self.substeps += 1;
        self.mass_final = masses.mass_after;
        self.collisional_mass += masses.collisional;
        self.blowout_mass += masses.blowout;
        self.sink_mass += masses.sink;
        self.source_mass += masses.source;
        self.sub_blowout_production += masses.sub_blowout;
        self.max_residual = self.max_residual.max(residual);
        if t_coll.is_finite() {
            self.max_stiffness = self.max_stiffness.max(dt / t_coll);
        }
    }
}

// =============================================================================
// Integrator
// =============================================================================

/// Rates frozen for the duration of one sub-step.
struct SubstepRates {
    channels: LossChannels,
    collisions: CollisionRates,
    total_loss: Array1<f64>,
    min_collision_time: f64,
}

/// Outcome of a proposed sub-step.
enum StepPhase {
    Accepted {
        numbers: Array1<f64>,
        masses: SubstepMasses,
        residual: f64,
    },
    Rejected(Rejection),
}

enum Rejection {
    NegativePopulation { index: usize, value: f64 },
    MassBudget { residual: f64 },
}

impl Rejection {
    fn residual(&self) -> f64 {
        match *self {
            Rejection::MassBudget { residual } => residual,
            Rejection::NegativePopulation { .. } => f64::NAN,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NegativePopulation { index, value } => {
                write!(f, "population {value:e} in bin {index}")
            }
            Rejection::MassBudget { residual } => write!(f, "mass residual {residual:.3e}"),
        }
    }
}

/// Steps the population of one cell. Holds only immutable run data, so one
/// integrator can be shared across threads.
#[derive(Clone, Debug)]
pub struct CascadeIntegrator {
    grid: SizeGrid,
    strength: StrengthModel,
    settings: CascadeSettings,
}

impl CascadeIntegrator {
    pub fn new(grid: SizeGrid, strength: StrengthModel, settings: CascadeSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            grid,
            strength,
            settings,
        })
    }

    pub fn grid(&self) -> &SizeGrid {
        &self.grid
    }

    pub fn strength(&self) -> &StrengthModel {
        &self.strength
    }

    pub fn settings(&self) -> &CascadeSettings {
        &self.settings
    }

    /// Fragment tensor over this integrator's grid and strength law.
    pub fn fragment_tensor(&self) -> FragmentTensor<'_> {
        FragmentTensor::new(&self.grid, &self.strength, &self.settings.fragments)
    }

    /// Advance `psd` by one outer step of length `dt`.
    ///
    /// On success the population has advanced by exactly `dt`. On
    /// [`CascadeError::RetryBudgetExhausted`] or [`CascadeError::SubstepLimit`]
    /// it is left at the last accepted sub-step and the error carries the
    /// diagnostics gathered so far.
    pub fn step(&self, psd: &mut PsdState, forcing: &StepForcing, dt: f64) -> Result<StepReport> {
        ensure_positive("dt", dt)?;
        let n = self.grid.len();
        if psd.len() != n {
            return Err(CascadeError::ShapeMismatch {
                name: "population",
                expected: n,
                got: psd.len(),
            });
        }
        forcing.validate(n)?;

        let config = &self.settings.integrator;
        let source = forcing.source.clone().unwrap_or_else(|| Array1::zeros(n));
        let blowout = forcing.active_blowout();
        let threshold = blowout.and_then(|b| b.threshold);
        let mut report = StepReport::new(dt, psd.total_mass(&self.grid));
        let mut remaining = dt;

        while remaining > 0.0 {
            if report.substeps >= config.max_substeps {
                warn!(limit = config.max_substeps, remaining, "sub-step limit reached");
                return Err(CascadeError::SubstepLimit {
                    limit: config.max_substeps,
                    remaining,
                    report: Box::new(report),
                });
            }

            let rates = self.substep_rates(psd, forcing, &mut report)?;
            report.min_collision_time = report.min_collision_time.min(rates.min_collision_time);

            let mut bound = rates.min_collision_time;
            if let Some(sink) = blowout {
                bound = bound.min(sink.residence_time);
            }
            let mut dt_eff = remaining.min(config.safety * bound);
            let mut attempts = 0;

            let (numbers, masses, residual) = loop {
                match self.evaluate(psd.numbers(), &rates, &source, threshold, dt_eff) {
                    StepPhase::Accepted {
                        numbers,
                        masses,
                        residual,
                    } => break (numbers, masses, residual),
                    StepPhase::Rejected(reason) => {
                        attempts += 1;
                        report.retries += 1;
                        warn!(%reason, dt = dt_eff, attempts, "sub-step rejected");
                        if attempts > config.max_retries {
                            return Err(CascadeError::RetryBudgetExhausted {
                                retries: attempts - 1,
                                dt: dt_eff,
                                residual: reason.residual(),
                                report: Box::new(report),
                            });
                        }
                        dt_eff *= 0.5;
                    }
                }
            };

            psd.numbers_mut().assign(&numbers);
            report.accept(dt_eff, &masses, residual, rates.min_collision_time);
            debug!(
                substep = report.substeps,
                dt = dt_eff,
                residual,
                t_coll = rates.min_collision_time,
                "sub-step accepted"
            );

            remaining = if dt_eff >= remaining { 0.0 } else { remaining - dt_eff };
        }

        report.elapsed = dt;
        info!(
            dt,
            substeps = report.substeps,
            retries = report.retries,
            mass = report.mass_final,
            max_residual = report.max_residual,
            "outer step complete"
        );
        Ok(report)
    }

    /// Collision matrix, fragment gain and loss channels for the current population.
    fn substep_rates(
        &self,
        psd: &PsdState,
        forcing: &StepForcing,
        report: &mut StepReport,
    ) -> Result<SubstepRates> {
        let n = self.grid.len();
        let numbers = psd.numbers().to_vec();

        let collisions = match &forcing.collisions {
            CollisionSource::Disabled => CollisionRates::zeros(n),
            CollisionSource::Dynamic(orbit) => {
                let field = VelocityField::evaluate(
                    orbit,
                    &self.settings.velocity,
                    psd.optical_depth(&self.grid),
                )?;
                report.velocity_converged &= field.converged;
                let radii = self.grid.radii().to_vec();
                let matrix = build_collision_matrix(&numbers, &radii, &field.scale_heights(n), &field)?;
                report.clamped_pairs += matrix.clamped_pairs();
                self.net_rates(&matrix, &numbers, &field)?
            }
            CollisionSource::Frozen {
                matrix,
                impact_velocity,
            } => self.net_rates(matrix, &numbers, impact_velocity)?,
        };

        let channels = assemble_losses(&collisions, &numbers, forcing.blowout.as_ref(), forcing.sink.as_ref())?;
        Ok(SubstepRates {
            total_loss: channels.total(),
            min_collision_time: channels.min_collision_time(),
            channels,
            collisions,
        })
    }

    fn net_rates(
        &self,
        matrix: &CollisionMatrix,
        numbers: &[f64],
        velocity: &impl PairVelocity,
    ) -> Result<CollisionRates> {
        if matrix.is_quiescent() {
            return Ok(CollisionRates::zeros(self.grid.len()));
        }
        self.fragment_tensor().collision_rates(matrix, numbers, velocity)
    }

    /// Implicit update at `dt` and its acceptance check.
    fn evaluate(
        &self,
        before: &Array1<f64>,
        rates: &SubstepRates,
        source: &Array1<f64>,
        threshold: Option<usize>,
        dt: f64,
    ) -> StepPhase {
        let numerator = before + &((&rates.collisions.gain + source) * dt);
        let denominator = rates.total_loss.mapv(|s| 1.0 + dt * s);
        let after = numerator / denominator;

        if let Some(index) = after.iter().position(|&v| !(v.is_finite() && v >= 0.0)) {
            return StepPhase::Rejected(Rejection::NegativePopulation {
                index,
                value: after[index],
            });
        }

        let masses = SubstepMasses::evaluate(
            self.grid.masses(),
            before,
            &after,
            &rates.channels,
            &rates.collisions,
            source,
            threshold,
            dt,
        );
        let residual = masses.residual();
        if residual.is_nan() || residual > self.settings.integrator.mass_tol {
            return StepPhase::Rejected(Rejection::MassBudget { residual });
        }
        StepPhase::Accepted {
            numbers: after,
            masses,
            residual,
        }
    }
}
