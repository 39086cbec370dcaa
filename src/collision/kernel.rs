//! Symmetric pairwise collision-rate matrix.
//!
//! ```text
//! C_ij = N_i N_j / (1 + δ_ij) · π (s_i + s_j)² · v_ij / (sqrt(2π) H_ij)
//! H_ij = sqrt(H_i² + H_j²)
//! ```
//!
//! `C_ij` counts collisions per unit area per second between bins `i` and `j`.
//! The diagonal is halved so same-bin pairs are not counted twice.

use std::f64::consts::PI;

use ndarray::Array2;
use tracing::warn;

use crate::dynamics::PairVelocity;
use crate::error::{CascadeError, Result, ensure_bin_vector};

/// Collision-rate matrix for one sub-step.
#[derive(Clone, Debug, PartialEq)]
pub struct CollisionMatrix {
    rates: Array2<f64>,
    clamped_pairs: usize,
}

impl CollisionMatrix {
    /// Wrap a caller-supplied rate matrix (collisions · m⁻² · s⁻¹).
    ///
    /// The matrix must be square, finite, non-negative and symmetric.
    pub fn from_rates(rates: Array2<f64>) -> Result<Self> {
        let (rows, cols) = rates.dim();
        if rows != cols {
            return Err(CascadeError::ShapeMismatch {
                name: "collision rate matrix columns",
                expected: rows,
                got: cols,
            });
        }
        for ((i, j), &value) in rates.indexed_iter() {
            if !value.is_finite() {
                return Err(CascadeError::NonFinite {
                    name: "collision rate",
                    value,
                });
            }
            if value < 0.0 {
                return Err(CascadeError::Negative {
                    name: "collision rate",
                    index: i * cols + j,
                    value,
                });
            }
            let mirror = rates[[j, i]];
            if (value - mirror).abs() > 1e-12 * value.abs().max(mirror.abs()) {
                return Err(CascadeError::InvalidConfig(format!(
                    "collision rate matrix is not symmetric at ({i}, {j})"
                )));
            }
        }
        Ok(Self {
            rates,
            clamped_pairs: 0,
        })
    }

    /// All-zero matrix for `n` bins.
    pub fn zeros(n: usize) -> Self {
        Self {
            rates: Array2::zeros((n, n)),
            clamped_pairs: 0,
        }
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.rates.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rates(&self) -> &Array2<f64> {
        &self.rates
    }

    /// Rate for the pair `(i, j)`.
    #[inline]
    pub fn rate(&self, i: usize, j: usize) -> f64 {
        self.rates[[i, j]]
    }

    /// Pairs whose rate was clamped to zero because of a bad velocity or scale height.
    pub fn clamped_pairs(&self) -> usize {
        self.clamped_pairs
    }

    /// True when no pair collides.
    pub fn is_quiescent(&self) -> bool {
        self.rates.iter().all(|&c| c == 0.0)
    }
}

/// Build the collision-rate matrix for the current population.
///
/// # Arguments
/// * `numbers` - Number surface density per bin (≥ 0)
/// * `radii` - Representative radius per bin (> 0)
/// * `scale_heights` - Vertical scale height per bin
/// * `velocity` - Pairwise relative speed source
///
/// Pairs with a non-finite or non-positive velocity or combined scale height
/// get a zero rate and are counted in [`CollisionMatrix::clamped_pairs`].
pub fn build_collision_matrix(
    numbers: &[f64],
    radii: &[f64],
    scale_heights: &[f64],
    velocity: &impl PairVelocity,
) -> Result<CollisionMatrix> {
    let n = numbers.len();
    ensure_bin_vector("numbers", numbers, n)?;
    ensure_bin_vector("radii", radii, n)?;
    if scale_heights.len() != n {
        return Err(CascadeError::ShapeMismatch {
            name: "scale heights",
            expected: n,
            got: scale_heights.len(),
        });
    }
    if let Some(index) = radii.iter().position(|&s| s <= 0.0) {
        return Err(CascadeError::NonPositive {
            name: "radius",
            value: radii[index],
        });
    }

    let norm = PI / (2.0 * PI).sqrt();
    let mut rates = Array2::zeros((n, n));
    let mut clamped_pairs = 0;

    for i in 0..n {
        for j in i..n {
            let n_pair = numbers[i] * numbers[j];
            if n_pair == 0.0 {
                continue;
            }
            let v = velocity.pair_velocity(i, j);
            let h_ij = (scale_heights[i] * scale_heights[i] + scale_heights[j] * scale_heights[j]).sqrt();
            if !(v.is_finite() && v > 0.0 && h_ij.is_finite() && h_ij > 0.0) {
                clamped_pairs += 1;
                continue;
            }
            let s_sum = radii[i] + radii[j];
            let mut c = n_pair * norm * s_sum * s_sum * v / h_ij;
            if i == j {
                c *= 0.5;
            }
            if !c.is_finite() {
                clamped_pairs += 1;
                continue;
            }
            rates[[i, j]] = c;
            rates[[j, i]] = c;
        }
    }

    if clamped_pairs > 0 {
        warn!(
            clamped_pairs,
            n_bins = n,
            "collision kernel clamped pairs with invalid velocity or scale height"
        );
    }

    Ok(CollisionMatrix {
        rates,
        clamped_pairs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_matrix_is_symmetric_with_halved_diagonal() {
        let numbers = [1.0, 2.0, 3.0];
        let radii = [1e-3, 1e-2, 1e-1];
        let heights = [10.0, 10.0, 10.0];
        let matrix = build_collision_matrix(&numbers, &radii, &heights, &5.0).unwrap();

        let norm = PI / (2.0 * PI).sqrt();
        let h = (200.0_f64).sqrt();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(matrix.rate(i, j), matrix.rate(j, i));
                let s = radii[i] + radii[j];
                let mut expected = numbers[i] * numbers[j] * norm * s * s * 5.0 / h;
                if i == j {
                    expected *= 0.5;
                }
                assert_relative_eq!(matrix.rate(i, j), expected, max_relative = 1e-12);
            }
        }
        assert_eq!(matrix.clamped_pairs(), 0);
    }

    #[test]
    fn test_invalid_velocity_is_clamped_not_propagated() {
        let mut velocity = Array2::from_elem((2, 2), 3.0);
        velocity[[0, 1]] = f64::NAN;
        velocity[[1, 1]] = -1.0;
        let matrix =
            build_collision_matrix(&[1.0, 1.0], &[1e-3, 1e-2], &[1.0, 1.0], &velocity).unwrap();
        assert_eq!(matrix.rate(0, 1), 0.0);
        assert_eq!(matrix.rate(1, 0), 0.0);
        assert_eq!(matrix.rate(1, 1), 0.0);
        assert!(matrix.rate(0, 0) > 0.0);
        assert_eq!(matrix.clamped_pairs(), 2);
        assert!(matrix.rates().iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_zero_scale_height_is_clamped() {
        let matrix = build_collision_matrix(&[1.0], &[1e-3], &[0.0], &1.0).unwrap();
        assert_eq!(matrix.rate(0, 0), 0.0);
        assert_eq!(matrix.clamped_pairs(), 1);
    }

    #[test]
    fn test_empty_bins_do_not_collide() {
        let matrix =
            build_collision_matrix(&[0.0, 1.0], &[1e-3, 1e-2], &[1.0, 1.0], &1.0).unwrap();
        assert_eq!(matrix.rate(0, 0), 0.0);
        assert_eq!(matrix.rate(0, 1), 0.0);
        assert!(matrix.rate(1, 1) > 0.0);
    }

    #[test]
    fn test_quiescent_when_no_pair_collides() {
        assert!(CollisionMatrix::zeros(3).is_quiescent());
        let cold = build_collision_matrix(&[1.0, 1.0], &[1e-3, 1e-2], &[1.0, 1.0], &0.0).unwrap();
        assert!(cold.is_quiescent());
        assert_eq!(cold.clamped_pairs(), 3);
        let warm = build_collision_matrix(&[1.0, 1.0], &[1e-3, 1e-2], &[1.0, 1.0], &1.0).unwrap();
        assert!(!warm.is_quiescent());
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(build_collision_matrix(&[-1.0], &[1e-3], &[1.0], &1.0).is_err());
        assert!(build_collision_matrix(&[1.0], &[0.0], &[1.0], &1.0).is_err());
        assert!(build_collision_matrix(&[1.0, 1.0], &[1e-3], &[1.0, 1.0], &1.0).is_err());
        assert!(build_collision_matrix(&[1.0], &[1e-3], &[1.0, 1.0], &1.0).is_err());
    }

    #[test]
    fn test_from_rates_validation() {
        let mut rates = Array2::from_elem((3, 3), 1e-12);
        assert!(CollisionMatrix::from_rates(rates.clone()).is_ok());
        rates[[0, 2]] = 2e-12;
        assert!(CollisionMatrix::from_rates(rates.clone()).is_err());
        rates[[2, 0]] = 2e-12;
        rates[[1, 1]] = -1.0;
        assert!(matches!(
            CollisionMatrix::from_rates(rates),
            Err(CascadeError::Negative { .. })
        ));
        assert!(CollisionMatrix::from_rates(Array2::zeros((2, 3))).is_err());
    }
}
