//! Error types for the cascade core.

use crate::integrator::StepReport;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CascadeError>;

#[derive(thiserror::Error, Debug)]
pub enum CascadeError {
    #[error("invalid size grid: {0}")]
    InvalidGrid(String),

    #[error("{name} has length {got}, expected {expected}")]
    ShapeMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{name} is not finite (got {value})")]
    NonFinite { name: &'static str, value: f64 },

    #[error("{name} must be positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} must be non-negative (got {value} at index {index})")]
    Negative {
        name: &'static str,
        index: usize,
        value: f64,
    },

    #[error("invalid strength coefficients: {0}")]
    InvalidStrength(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("index {index} out of range for {len} bins")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("blow-out never occurs: maximum beta {max_beta} stays below 0.5")]
    NoBlowout { max_beta: f64 },

    #[error("sub-step retry budget exhausted after {retries} halvings (dt={dt:.3e} s, residual={residual:.3e})")]
    RetryBudgetExhausted {
        retries: u32,
        dt: f64,
        residual: f64,
        report: Box<StepReport>,
    },

    #[error("sub-step limit of {limit} reached with {remaining:.3e} s of the outer step left")]
    SubstepLimit {
        limit: u64,
        remaining: f64,
        report: Box<StepReport>,
    },
}

impl CascadeError {
    /// Diagnostics accumulated before a fatal step failure, if any.
    pub fn partial_report(&self) -> Option<&StepReport> {
        match self {
            CascadeError::RetryBudgetExhausted { report, .. }
            | CascadeError::SubstepLimit { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// Reject non-finite scalars at the point of use.
pub(crate) fn ensure_finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CascadeError::NonFinite { name, value })
    }
}

/// Reject non-finite or non-positive scalars.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<f64> {
    ensure_finite(name, value)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(CascadeError::NonPositive { name, value })
    }
}

/// Validate a per-bin vector: expected length, finite and non-negative entries.
pub(crate) fn ensure_bin_vector(name: &'static str, values: &[f64], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(CascadeError::ShapeMismatch {
            name,
            expected,
            got: values.len(),
        });
    }
    for (index, &value) in values.iter().enumerate() {
        ensure_finite(name, value)?;
        if value < 0.0 {
            return Err(CascadeError::Negative { name, index, value });
        }
    }
    Ok(())
}
