//! First-order loss rates per bin.
//!
//! ```text
//! S[k] = S_coll[k] + S_blow[k] + S_ext[k]
//! ```
//!
//! The three channels are kept apart so the integrator can attribute removed
//! mass per channel. Collisional loss is the per-particle rate at which bin
//! `k` loses grains to collisions once the fragments that land back in `k`
//! are netted out (see [`CollisionRates`]), so a large target sandblasted by
//! dust only loses its eroded excess.

use ndarray::{Array1, s};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collision::CollisionRates;
use crate::error::{CascadeError, Result, ensure_bin_vector, ensure_finite, ensure_positive};
use crate::grid::SizeGrid;

/// Default sound speed of the ambient gas for Epstein drag (m/s).
pub const DEFAULT_SOUND_SPEED: f64 = 500.0;

// =============================================================================
// Blow-out
// =============================================================================

/// Radiation-pressure removal of every bin at or below a threshold index.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlowoutSink {
    /// Highest removed bin; `None` disables the channel.
    pub threshold: Option<usize>,
    /// Residence time t_blow of an unbound grain (s).
    pub residence_time: f64,
}

impl BlowoutSink {
    pub fn new(threshold: Option<usize>, residence_time: f64) -> Result<Self> {
        ensure_positive("blow-out residence time", residence_time)?;
        Ok(Self {
            threshold,
            residence_time,
        })
    }

    /// Threshold taken from a blow-out radius on `grid`.
    pub fn from_radius(grid: &SizeGrid, blowout_radius: f64, residence_time: f64) -> Result<Self> {
        Self::new(grid.threshold_index(blowout_radius), residence_time)
    }

    /// Residence time from the orbital frequency, `t_blow = chi / Ω`.
    pub fn from_orbit(threshold: Option<usize>, omega: f64, chi: f64) -> Result<Self> {
        ensure_positive("angular velocity", omega)?;
        ensure_positive("blow-out chi", chi)?;
        Self::new(threshold, chi / omega)
    }

    /// True when at least one bin is removed.
    pub fn is_active(&self) -> bool {
        self.threshold.is_some()
    }

    /// Removal rate 1/t_blow applied to affected bins.
    pub fn rate(&self) -> f64 {
        1.0 / self.residence_time
    }

    /// Per-bin blow-out rates for an `n`-bin grid.
    pub fn rates(&self, n: usize) -> Result<Array1<f64>> {
        ensure_positive("blow-out residence time", self.residence_time)?;
        let mut rates = Array1::zeros(n);
        if let Some(index) = self.threshold {
            if index >= n {
                return Err(CascadeError::IndexOutOfRange { index, len: n });
            }
            rates.slice_mut(s![..=index]).fill(self.rate());
        }
        Ok(rates)
    }
}

// =============================================================================
// Assembly
// =============================================================================

/// Per-particle collisional removal rate `S_k = R_k / N_k` from the net
/// grain removal rates `R_k`.
///
/// Empty bins get a zero rate.
pub fn collisional_loss_rates(removal: &Array1<f64>, numbers: &[f64]) -> Result<Array1<f64>> {
    let n = numbers.len();
    ensure_bin_vector("collisional removal", &removal.to_vec(), n)?;
    ensure_bin_vector("numbers", numbers, n)?;

    let loss = removal
        .iter()
        .zip(numbers)
        .map(|(&r, &n_k)| if n_k > 0.0 { r / n_k } else { 0.0 })
        .collect();
    Ok(loss)
}

/// Loss rates split by channel (1/s).
#[derive(Clone, Debug, PartialEq)]
pub struct LossChannels {
    pub collisional: Array1<f64>,
    pub blowout: Array1<f64>,
    pub external: Array1<f64>,
}

impl LossChannels {
    /// Combined rate `S = S_coll + S_blow + S_ext`.
    pub fn total(&self) -> Array1<f64> {
        &self.collisional + &self.blowout + &self.external
    }

    /// Rate of mass leaving the system, `S_blow + S_ext`.
    pub fn removal(&self) -> Array1<f64> {
        &self.blowout + &self.external
    }

    /// Shortest collisional timescale `min_k 1 / S_coll,k`; infinite when quiescent.
    pub fn min_collision_time(&self) -> f64 {
        let max_rate = self.collisional.iter().copied().fold(0.0, f64::max);
        if max_rate > 0.0 {
            1.0 / max_rate
        } else {
            f64::INFINITY
        }
    }
}

/// Merge collisional loss with blow-out and external sinks.
///
/// # Arguments
/// * `collisions` - Net collision rates of the current sub-step
/// * `numbers` - Populations the rates were built from
/// * `blowout` - Optional radiation-pressure channel
/// * `external` - Optional per-bin external sink rates (1/s, ≥ 0)
pub fn assemble_losses(
    collisions: &CollisionRates,
    numbers: &[f64],
    blowout: Option<&BlowoutSink>,
    external: Option<&Array1<f64>>,
) -> Result<LossChannels> {
    let n = numbers.len();
    let collisional = collisional_loss_rates(&collisions.removal, numbers)?;
    let blowout = match blowout {
        Some(sink) => sink.rates(n)?,
        None => Array1::zeros(n),
    };
    let external = match external {
        Some(rates) => {
            ensure_bin_vector("external sink", &rates.to_vec(), n)?;
            rates.clone()
        }
        None => Array1::zeros(n),
    };

    let channels = LossChannels {
        collisional,
        blowout,
        external,
    };
    debug!(
        n_bins = n,
        t_coll_min = channels.min_collision_time(),
        "assembled loss channels"
    );
    Ok(channels)
}

// =============================================================================
// External sink helpers
// =============================================================================

/// Same removal rate `1 / timescale` in every bin.
pub fn uniform_sink(n_bins: usize, timescale: f64) -> Result<Array1<f64>> {
    ensure_positive("sink timescale", timescale)?;
    Ok(Array1::from_elem(n_bins, 1.0 / timescale))
}

/// Epstein stopping time `ρ_p s / (ρ_g c_s)` (s).
pub fn gas_drag_timescale(s: f64, rho_p: f64, rho_g: f64, sound_speed: f64) -> Result<f64> {
    ensure_positive("grain radius", s)?;
    ensure_positive("grain density", rho_p)?;
    ensure_positive("gas density", rho_g)?;
    ensure_positive("sound speed", sound_speed)?;
    Ok(rho_p * s / (rho_g * sound_speed))
}

/// Per-bin gas-drag removal rates. Zero gas density disables the sink.
pub fn gas_drag_sink(grid: &SizeGrid, rho_g: f64, sound_speed: f64) -> Result<Array1<f64>> {
    ensure_finite("gas density", rho_g)?;
    if rho_g <= 0.0 {
        return Ok(Array1::zeros(grid.len()));
    }
    grid.bins()
        .iter()
        .map(|bin| gas_drag_timescale(bin.radius, grid.density(), rho_g, sound_speed).map(|t| 1.0 / t))
        .collect::<Result<Vec<_>>>()
        .map(Array1::from)
}

/// Sublimation as a drift out of each bin, `S_k = |ds/dt| / Δs_k`.
///
/// `erosion_rate` is the radius change per second (its sign is ignored).
pub fn sublimation_drift_sink(grid: &SizeGrid, erosion_rate: f64) -> Result<Array1<f64>> {
    ensure_finite("erosion rate", erosion_rate)?;
    let speed = erosion_rate.abs();
    Ok(grid.bins().iter().map(|bin| speed / bin.width()).collect())
}

/// Shortest of the enabled sink timescales, `None` when all are disabled.
pub fn shortest_timescale(timescales: &[Option<f64>]) -> Option<f64> {
    timescales
        .iter()
        .flatten()
        .copied()
        .filter(|t| t.is_finite() && *t > 0.0)
        .reduce(f64::min)
}
