//! Fragment redistribution for a colliding pair, `Y[k; i, j]`.
//!
//! A collision between bins `i` and `j` is classified by its largest-remnant
//! fraction (Leinhardt & Stewart 2012):
//!
//! ```text
//! Q_R  = ½ μ v² / M_tot
//! f_LR = clamp(½ (2 - Q_R / Q_D*), 0, 1)
//! ```
//!
//! * `f_LR > 0.5` ([`CollisionRegime::Cratering`]): the target survives in its
//!   own bin, only the eroded mass `1 - f_LR` becomes a power-law fragment
//!   tail below the target radius.
//! * `f_LR ≤ 0.5` ([`CollisionRegime::Catastrophic`]): the whole mass becomes a
//!   power-law spectrum truncated at the largest remnant radius.
//!
//! Per-bin weights integrate `s³ · dN/ds ∝ s^(3-α)` over each bin's radius
//! interval and are normalized, so `Σ_k Y[k; i, j] = 1` for every pair.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::collision::kernel::CollisionMatrix;
use crate::dynamics::PairVelocity;
use crate::error::{CascadeError, Result, ensure_bin_vector};
use crate::grid::SizeGrid;
use crate::strength::StrengthModel;
use crate::types::sphere_radius;

/// Largest-remnant fraction separating cratering from catastrophic disruption.
pub const CATASTROPHIC_THRESHOLD: f64 = 0.5;

/// Floor on the impact speed handed to the strength model (m/s).
const MIN_IMPACT_VELOCITY: f64 = 1e-12;

// =============================================================================
// Configuration
// =============================================================================

/// Fragment spectrum exponents, `dN/ds ∝ s^(-α)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentConfig {
    /// Exponent of the eroded tail in cratering impacts. Default: 3.5.
    pub alpha_cratering: f64,
    /// Exponent of the debris of catastrophic impacts. Default: 3.85,
    /// i.e. a cumulative slope of 2.85.
    pub alpha_catastrophic: f64,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            alpha_cratering: 3.5,
            alpha_catastrophic: 3.85,
        }
    }
}

impl FragmentConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha_cratering.is_finite() && self.alpha_catastrophic.is_finite()) {
            return Err(CascadeError::InvalidConfig(format!(
                "fragment exponents must be finite ({}, {})",
                self.alpha_cratering, self.alpha_catastrophic
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Regime classification
// =============================================================================

/// Outcome class of one colliding pair.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum CollisionRegime {
    /// Target survives; only the eroded excess is fragmented.
    Cratering { largest_remnant_fraction: f64 },
    /// Target is destroyed; all mass is fragmented.
    Catastrophic { largest_remnant_fraction: f64 },
}

impl CollisionRegime {
    /// Classify by the largest-remnant fraction. Exactly 0.5 is catastrophic.
    pub fn classify(largest_remnant_fraction: f64) -> Self {
        if largest_remnant_fraction > CATASTROPHIC_THRESHOLD {
            CollisionRegime::Cratering {
                largest_remnant_fraction,
            }
        } else {
            CollisionRegime::Catastrophic {
                largest_remnant_fraction,
            }
        }
    }

    pub fn largest_remnant_fraction(&self) -> f64 {
        match *self {
            CollisionRegime::Cratering {
                largest_remnant_fraction,
            }
            | CollisionRegime::Catastrophic {
                largest_remnant_fraction,
            } => largest_remnant_fraction,
        }
    }

    pub fn is_catastrophic(&self) -> bool {
        matches!(self, CollisionRegime::Catastrophic { .. })
    }
}

/// Reduced specific impact energy `Q_R = ½ μ v² / M_tot` (J/kg).
///
/// Zero for non-positive masses or a non-finite speed.
pub fn specific_impact_energy(m1: f64, m2: f64, velocity: f64) -> f64 {
    let m_tot = m1 + m2;
    if !(m1 > 0.0 && m2 > 0.0 && velocity.is_finite()) {
        return 0.0;
    }
    let mu = m1 * m2 / m_tot;
    0.5 * mu * velocity * velocity / m_tot
}

/// Largest-remnant fraction `clamp(½ (2 - Q_R / Q_D*), 0, 1)`.
///
/// A non-positive or non-finite `q_star` means no usable strength and the
/// pair is treated as fully disrupted.
pub fn largest_remnant_fraction(q_r: f64, q_star: f64) -> f64 {
    if !(q_star.is_finite() && q_star > 0.0) {
        return 0.0;
    }
    let frac = 0.5 * (2.0 - q_r / q_star);
    if frac.is_nan() { 0.0 } else { frac.clamp(0.0, 1.0) }
}

// =============================================================================
// Fragment tensor
// =============================================================================

/// Collision number rates for one sub-step, net of fragments returning to a
/// colliding bin.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionRates {
    /// Fragments gained per bin (number · m⁻² · s⁻¹).
    pub gain: Array1<f64>,
    /// Grains removed per bin (number · m⁻² · s⁻¹).
    pub removal: Array1<f64>,
    /// Gross fragment mass produced into each bin (kg · m⁻² · s⁻¹).
    pub fragment_mass: Array1<f64>,
}

impl CollisionRates {
    /// No collisions in an `n`-bin grid.
    pub fn zeros(n: usize) -> Self {
        Self {
            gain: Array1::zeros(n),
            removal: Array1::zeros(n),
            fragment_mass: Array1::zeros(n),
        }
    }

    /// Mass rate passing through collisions (kg · m⁻² · s⁻¹).
    pub fn processed_mass(&self) -> f64 {
        self.fragment_mass.sum()
    }
}

/// On-demand evaluator of `Y[k; i, j]` over a fixed grid.
#[derive(Clone, Copy, Debug)]
pub struct FragmentTensor<'a> {
    grid: &'a SizeGrid,
    strength: &'a StrengthModel,
    config: &'a FragmentConfig,
}

impl<'a> FragmentTensor<'a> {
    pub fn new(grid: &'a SizeGrid, strength: &'a StrengthModel, config: &'a FragmentConfig) -> Self {
        Self {
            grid,
            strength,
            config,
        }
    }

    /// Classify the impact between bins `i` and `j` at speed `velocity`.
    pub fn classify(&self, i: usize, j: usize, velocity: f64) -> CollisionRegime {
        let masses = self.grid.masses();
        let target = i.max(j);
        let v = if velocity.is_finite() { velocity.max(0.0) } else { 0.0 };
        let q_r = specific_impact_energy(masses[i], masses[j], v);
        let q_star = self.strength.critical_energy_unchecked(
            self.grid.radii()[target],
            self.grid.density(),
            v.max(MIN_IMPACT_VELOCITY),
        );
        CollisionRegime::classify(largest_remnant_fraction(q_r, q_star))
    }

    /// Write the mass fractions `Y[·; i, j]` into `out` (length = bin count).
    ///
    /// `out` is overwritten. Returns the regime the pair was resolved to.
    pub fn redistribute_into(&self, i: usize, j: usize, velocity: f64, out: &mut [f64]) -> CollisionRegime {
        debug_assert_eq!(out.len(), self.grid.len());
        out.fill(0.0);

        let regime = self.classify(i, j, velocity);
        let f_lr = regime.largest_remnant_fraction();
        let target = i.max(j);

        match regime {
            CollisionRegime::Cratering { .. } => {
                out[target] += f_lr;
                let target_radius = self.grid.radii()[target];
                self.spread_power_law(out, 1.0 - f_lr, self.config.alpha_cratering, target_radius);
            }
            CollisionRegime::Catastrophic { .. } => {
                let masses = self.grid.masses();
                let m_lr = f_lr * (masses[i] + masses[j]);
                // A remnant below the first bin is clamped to that bin
                let cutoff = sphere_radius(m_lr, self.grid.density())
                    .max(self.grid.bins()[0].upper_edge)
                    .min(self.grid.max_radius());
                self.spread_power_law(out, 1.0, self.config.alpha_catastrophic, cutoff);
            }
        }
        regime
    }

    /// Owned variant of [`Self::redistribute_into`].
    pub fn redistribution(&self, i: usize, j: usize, velocity: f64) -> (Array1<f64>, CollisionRegime) {
        let mut out = vec![0.0; self.grid.len()];
        let regime = self.redistribute_into(i, j, velocity, &mut out);
        (Array1::from(out), regime)
    }

    /// Net number rates of every colliding pair in `matrix`.
    ///
    /// Each collision removes one grain from bin `i` and one from bin `j`
    /// (two for `i == j`) and hands `(m_i + m_j) Y[k; i, j]` to bin `k`. The
    /// fragments landing back in `i` or `j` are netted against that removal,
    /// so a cratering hit that leaves the target in its own bin only costs
    /// the eroded excess. Pairs with an empty bin are skipped.
    ///
    /// # Arguments
    /// * `matrix` - Collision rates (collisions · m⁻² · s⁻¹)
    /// * `numbers` - Population the rates apply to
    /// * `velocity` - Impact speed per pair
    pub fn collision_rates(
        &self,
        matrix: &CollisionMatrix,
        numbers: &[f64],
        velocity: &impl PairVelocity,
    ) -> Result<CollisionRates> {
        let n = self.grid.len();
        if matrix.len() != n {
            return Err(CascadeError::ShapeMismatch {
                name: "collision matrix",
                expected: n,
                got: matrix.len(),
            });
        }
        ensure_bin_vector("numbers", numbers, n)?;

        let masses = self.grid.masses();
        let mut rates = CollisionRates::zeros(n);
        let mut fractions = vec![0.0; n];

        for i in 0..n {
            for j in i..n {
                let rate = matrix.rate(i, j);
                if rate <= 0.0 || numbers[i] <= 0.0 || numbers[j] <= 0.0 {
                    continue;
                }
                self.redistribute_into(i, j, velocity.pair_velocity(i, j), &mut fractions);
                let mass_rate = rate * (masses[i] + masses[j]);
                for (k, &y) in fractions.iter().enumerate() {
                    if y <= 0.0 {
                        continue;
                    }
                    rates.fragment_mass[k] += mass_rate * y;
                    if k != i && k != j {
                        rates.gain[k] += mass_rate * y / masses[k];
                    }
                }

                let mut settle = |k: usize, lost: f64| {
                    let net = mass_rate * fractions[k] / masses[k] - lost;
                    if net >= 0.0 {
                        rates.gain[k] += net;
                    } else {
                        rates.removal[k] -= net;
                    }
                };
                if i == j {
                    settle(i, 2.0 * rate);
                } else {
                    settle(i, rate);
                    settle(j, rate);
                }
            }
        }
        Ok(rates)
    }

    /// Add `weight` spread as `dN/ds ∝ s^(-alpha)` over `[s_min, cutoff]`.
    fn spread_power_law(&self, out: &mut [f64], weight: f64, alpha: f64, cutoff: f64) {
        if weight <= 0.0 {
            return;
        }
        let p = 4.0 - alpha;
        // Radii scaled by the cutoff keep the powers well inside f64 range
        let bin_weight = |lower: f64, upper: f64| {
            let lo = lower / cutoff;
            let hi = upper.min(cutoff) / cutoff;
            let w = if p.abs() < 1e-12 {
                (hi / lo).ln()
            } else {
                (hi.powf(p) - lo.powf(p)) / p
            };
            if w.is_finite() && w > 0.0 { w } else { 0.0 }
        };

        let bins = self.grid.bins();
        let covered = move || bins.iter().take_while(move |b| b.lower_edge < cutoff);
        let total: f64 = covered().map(|b| bin_weight(b.lower_edge, b.upper_edge)).sum();
        if !(total.is_finite() && total > 0.0) {
            out[0] += weight;
            return;
        }
        let scale = weight / total;
        for bin in covered() {
            out[bin.index] += scale * bin_weight(bin.lower_edge, bin.upper_edge);
        }
    }
}
