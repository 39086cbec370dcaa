//! Logarithmic particle-radius grid.
//!
//! The grid is fixed for the lifetime of a run: bin count, edges and the
//! per-bin representative radius and mass never change after construction.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{CascadeError, Result, ensure_positive};
use crate::types::sphere_mass;

/// A single radius bin.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeBin {
    /// Position in the grid (0 = smallest).
    pub index: usize,
    /// Representative radius (geometric centre of the edges), metres.
    pub radius: f64,
    /// Lower radius edge, metres.
    pub lower_edge: f64,
    /// Upper radius edge, metres.
    pub upper_edge: f64,
    /// Mass of one particle of the representative radius, kg.
    pub mass: f64,
}

impl SizeBin {
    /// Width of the bin in radius.
    pub fn width(&self) -> f64 {
        self.upper_edge - self.lower_edge
    }
}

/// Fixed logarithmic partition of particle radius.
#[derive(Clone, Debug)]
pub struct SizeGrid {
    bins: Vec<SizeBin>,
    radii: Array1<f64>,
    masses: Array1<f64>,
    density: f64,
}

impl SizeGrid {
    /// Build `n_bins` logarithmically spaced bins spanning `[s_min, s_max]`.
    ///
    /// # Arguments
    /// * `s_min` - Lower edge of the first bin (m)
    /// * `s_max` - Upper edge of the last bin (m)
    /// * `n_bins` - Number of bins (at least one)
    /// * `density` - Bulk material density (kg/m³), constant for the run
    pub fn logarithmic(s_min: f64, s_max: f64, n_bins: usize, density: f64) -> Result<Self> {
        ensure_positive("s_min", s_min)?;
        ensure_positive("s_max", s_max)?;
        ensure_positive("density", density)?;
        if s_min >= s_max {
            return Err(CascadeError::InvalidGrid(format!(
                "s_min ({s_min:e}) must be smaller than s_max ({s_max:e})"
            )));
        }
        if n_bins == 0 {
            return Err(CascadeError::InvalidGrid("n_bins must be positive".into()));
        }

        let log_min = s_min.ln();
        let step = (s_max.ln() - log_min) / n_bins as f64;
        let edges: Vec<f64> = (0..=n_bins)
            .map(|k| {
                // Pin the outer edges exactly
                match k {
                    0 => s_min,
                    k if k == n_bins => s_max,
                    k => (log_min + step * k as f64).exp(),
                }
            })
            .collect();

        let bins = edges
            .windows(2)
            .enumerate()
            .map(|(index, pair)| {
                let radius = (pair[0] * pair[1]).sqrt();
                SizeBin {
                    index,
                    radius,
                    lower_edge: pair[0],
                    upper_edge: pair[1],
                    mass: sphere_mass(radius, density),
                }
            })
            .collect();

        Self::from_bins(bins, density)
    }

    /// Build a grid from explicit bins. Bins must be ordered and non-overlapping,
    /// and each mass must be that of a `density` sphere of the bin radius.
    pub fn from_bins(bins: Vec<SizeBin>, density: f64) -> Result<Self> {
        ensure_positive("density", density)?;
        if bins.is_empty() {
            return Err(CascadeError::InvalidGrid("grid has no bins".into()));
        }
        for (k, bin) in bins.iter().enumerate() {
            if bin.index != k {
                return Err(CascadeError::InvalidGrid(format!(
                    "bin {k} carries index {}",
                    bin.index
                )));
            }
            if !(bin.lower_edge > 0.0
                && bin.lower_edge <= bin.radius
                && bin.radius <= bin.upper_edge
                && bin.upper_edge.is_finite())
            {
                return Err(CascadeError::InvalidGrid(format!(
                    "bin {k} has inconsistent edges [{:e}, {:e}] around {:e}",
                    bin.lower_edge, bin.upper_edge, bin.radius
                )));
            }
            let expected = sphere_mass(bin.radius, density);
            if !((bin.mass - expected).abs() <= 1e-9 * expected) {
                return Err(CascadeError::InvalidGrid(format!(
                    "bin {k} mass {:e} does not match a sphere of radius {:e} ({expected:e})",
                    bin.mass, bin.radius
                )));
            }
        }
        for pair in bins.windows(2) {
            if pair[1].radius <= pair[0].radius || pair[1].lower_edge < pair[0].upper_edge {
                return Err(CascadeError::InvalidGrid(format!(
                    "bins {} and {} are not strictly increasing",
                    pair[0].index, pair[1].index
                )));
            }
        }

        let radii = bins.iter().map(|b| b.radius).collect();
        let masses = bins.iter().map(|b| b.mass).collect();
        Ok(Self {
            bins,
            radii,
            masses,
            density,
        })
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Always false for a constructed grid; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bins(&self) -> &[SizeBin] {
        &self.bins
    }

    pub fn bin(&self, k: usize) -> Option<&SizeBin> {
        self.bins.get(k)
    }

    /// Representative radii, smallest first.
    pub fn radii(&self) -> &Array1<f64> {
        &self.radii
    }

    /// Representative particle masses, smallest first.
    pub fn masses(&self) -> &Array1<f64> {
        &self.masses
    }

    /// Bulk density the masses were derived from.
    pub fn density(&self) -> f64 {
        self.density
    }

    /// Lower edge of the first bin.
    pub fn min_radius(&self) -> f64 {
        self.bins[0].lower_edge
    }

    /// Upper edge of the last bin.
    pub fn max_radius(&self) -> f64 {
        self.bins[self.bins.len() - 1].upper_edge
    }

    /// Index of the bin whose edges contain `radius`, if any.
    pub fn bin_containing(&self, radius: f64) -> Option<usize> {
        if !(radius >= self.min_radius() && radius <= self.max_radius()) {
            return None;
        }
        let k = self.bins.partition_point(|b| b.upper_edge < radius);
        Some(k.min(self.bins.len() - 1))
    }

    /// Highest bin whose representative radius is at or below `blowout_radius`.
    ///
    /// Returns `None` when every bin is larger than the blow-out size, i.e. no
    /// bin is removed by radiation pressure.
    pub fn threshold_index(&self, blowout_radius: f64) -> Option<usize> {
        if !blowout_radius.is_finite() {
            return None;
        }
        let count = self.bins.partition_point(|b| b.radius <= blowout_radius);
        count.checked_sub(1)
    }
}
