//! Radiation pressure from the central body and the blow-out size.
//!
//! Grains with `β = F_rad / F_grav ≥ 0.5` are unbound on release and leave
//! within roughly one orbit; the blow-out radius `s_blow` is where β crosses
//! 0.5 and sets the threshold bin of the blow-out sink.
//!
//! The Planck-mean efficiency ⟨Q_pr⟩(s, T) is injected as a closure so table
//! lookups stay outside this crate.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CascadeError, Result, ensure_positive};
use crate::grid::SizeGrid;
use crate::types::{C_LIGHT, G, M_MARS, R_MARS, SIGMA_SB};

/// β value at which a released grain becomes unbound.
pub const BLOWOUT_BETA: f64 = 0.5;

/// Luminous, gravitating central body.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CentralBody {
    /// Mass (kg).
    pub mass: f64,
    /// Photospheric radius (m).
    pub radius: f64,
    /// Effective surface temperature (K).
    pub temperature: f64,
}

impl CentralBody {
    /// Mars radiating as a black body at `temperature`.
    pub fn mars(temperature: f64) -> Self {
        Self {
            mass: M_MARS,
            radius: R_MARS,
            temperature,
        }
    }

    /// Black-body luminosity `4π R² σ T⁴` (W).
    pub fn luminosity(&self) -> f64 {
        4.0 * PI * self.radius * self.radius * SIGMA_SB * self.temperature.powi(4)
    }

    fn validate(&self) -> Result<()> {
        ensure_positive("central mass", self.mass)?;
        ensure_positive("central radius", self.radius)?;
        ensure_positive("temperature", self.temperature)?;
        Ok(())
    }
}

/// Radiation-pressure-to-gravity ratio of a grain.
///
/// `β = 3 L ⟨Q_pr⟩ / (16 π c G M ρ s)`
///
/// # Arguments
/// * `body` - Radiating central body
/// * `s` - Grain radius (m)
/// * `rho` - Grain bulk density (kg/m³)
/// * `q_pr` - Planck-mean efficiency as a function of `(s, T)`
pub fn beta(body: &CentralBody, s: f64, rho: f64, q_pr: impl Fn(f64, f64) -> f64) -> Result<f64> {
    body.validate()?;
    ensure_positive("grain radius", s)?;
    ensure_positive("grain density", rho)?;
    let q = q_pr(s, body.temperature);
    if !(q.is_finite() && q >= 0.0) {
        return Err(CascadeError::NonFinite {
            name: "radiation pressure efficiency",
            value: q,
        });
    }
    let num = 3.0 * body.luminosity() * q;
    let den = 16.0 * PI * C_LIGHT * G * body.mass * rho * s;
    Ok(num / den)
}

/// Logarithmic sampling range for the blow-out search.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlowoutSearch {
    /// Smallest sampled radius (m). Default: 1e-9.
    pub s_min: f64,
    /// Largest sampled radius (m). Default: 1e-2.
    pub s_max: f64,
    /// Number of samples. Default: 256.
    pub samples: usize,
}

impl Default for BlowoutSearch {
    fn default() -> Self {
        Self {
            s_min: 1e-9,
            s_max: 1e-2,
            samples: 256,
        }
    }
}

/// Radius where β falls through 0.5.
///
/// β is sampled on a logarithmic grid; the crossing on the descending branch
/// after the maximum is located by linear interpolation between samples.
/// Fails with [`CascadeError::NoBlowout`] when β never exceeds 0.5.
pub fn blowout_radius(
    body: &CentralBody,
    rho: f64,
    q_pr: impl Fn(f64, f64) -> f64,
    search: &BlowoutSearch,
) -> Result<f64> {
    ensure_positive("search s_min", search.s_min)?;
    ensure_positive("search s_max", search.s_max)?;
    if search.s_max <= search.s_min || search.samples < 2 {
        return Err(CascadeError::InvalidConfig(format!(
            "blow-out search needs s_min < s_max and at least two samples (got {search:?})"
        )));
    }

    let log_min = search.s_min.ln();
    let step = (search.s_max.ln() - log_min) / (search.samples - 1) as f64;
    let radii: Vec<f64> = (0..search.samples)
        .map(|k| (log_min + step * k as f64).exp())
        .collect();
    let betas = radii
        .iter()
        .map(|&s| beta(body, s, rho, &q_pr))
        .collect::<Result<Vec<f64>>>()?;

    let (peak, max_beta) = betas
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (k, b)| if b > best.1 { (k, b) } else { best });
    if max_beta <= BLOWOUT_BETA {
        return Err(CascadeError::NoBlowout { max_beta });
    }

    let Some(offset) = betas[peak..].iter().position(|&b| b <= BLOWOUT_BETA) else {
        return Err(CascadeError::InvalidConfig(format!(
            "beta stays above {BLOWOUT_BETA} up to s_max = {:e}",
            search.s_max
        )));
    };
    let j = peak + offset;
    let (s1, s2) = (radii[j - 1], radii[j]);
    let (b1, b2) = (betas[j - 1], betas[j]);
    let s_blow = s1 + (BLOWOUT_BETA - b1) * (s2 - s1) / (b2 - b1);
    debug!(s_blow, max_beta, "blow-out radius located");
    Ok(s_blow)
}

/// Blow-out threshold bin on `grid`, `None` when no bin is small enough.
pub fn blowout_threshold(
    grid: &SizeGrid,
    body: &CentralBody,
    q_pr: impl Fn(f64, f64) -> f64,
    search: &BlowoutSearch,
) -> Result<Option<usize>> {
    let s_blow = blowout_radius(body, grid.density(), q_pr, search)?;
    Ok(grid.threshold_index(s_blow))
}
