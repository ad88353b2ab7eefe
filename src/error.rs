//! Error and warning types for the surveynet library
//!
//! This module provides the main error and result types used throughout the library.
//! All errors use the `thiserror` crate for automatic trait implementations.
//!
//! Fatal conditions (malformed input, unknown configuration names) are returned as
//! [`SurveyNetError`]. Numerical failure of the solve is not an error: it is reported
//! through the solver status. Conditions the adjustment recovers from locally are
//! collected as [`AdjustmentWarning`] values.

use crate::linalg::LinAlgError;
use std::fmt;
use thiserror::Error;

/// Main result type used throughout the surveynet library
pub type SurveyNetResult<T> = Result<T, SurveyNetError>;

/// Main error type for the surveynet library
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurveyNetError {
    /// Malformed dataset (dimensionality mismatch, unresolved ids, invalid sigmas)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Weighting method name or label that is not in the method table
    #[error("Unknown weighting method: {0}")]
    UnknownMethod(String),

    /// Tuning constant override naming a constant the method does not have
    #[error("Weighting method '{method}' has no tuning constant '{name}'")]
    UnknownTuningConstant { method: String, name: String },

    /// Named configuration profile that is not registered
    #[error("Unknown {kind} profile: {name}")]
    UnknownProfile { kind: &'static str, name: String },

    /// More unknowns than observation rows
    #[error(
        "Negative degrees of freedom: {rows} observation rows for {columns} unknowns"
    )]
    NegativeDegreesOfFreedom { rows: usize, columns: usize },

    /// Linear algebra related errors
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),
}

impl From<LinAlgError> for SurveyNetError {
    fn from(err: LinAlgError) -> Self {
        SurveyNetError::LinearAlgebra(err.to_string())
    }
}

/// Non-fatal conditions raised during an adjustment run.
#[derive(Debug, Clone, PartialEq)]
pub enum AdjustmentWarning {
    /// Negative variances produced by cancellation were clamped to zero.
    InvalidVariance {
        /// Number of affected values
        count: usize,
        /// Iteration in which they occurred
        iteration: usize,
    },
    /// The network has no redundancy; the a priori variance factor is used.
    ZeroRedundancy {
        /// Iteration in which the variance factor was requested
        iteration: usize,
    },
}

impl fmt::Display for AdjustmentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdjustmentWarning::InvalidVariance { count, iteration } => write!(
                f,
                "{count} negative variances occurred in {iteration}. iteration and were clamped to zero"
            ),
            AdjustmentWarning::ZeroRedundancy { iteration } => write!(
                f,
                "zero degrees of freedom in {iteration}. iteration, a priori variance factor 1 used"
            ),
        }
    }
}
