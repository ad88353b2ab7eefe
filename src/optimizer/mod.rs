//! Iterative least-squares solve of the adjustment.
//!
//! - [`Iteration`]: one Gauss-Newton step with its covariance matrices
//! - [`Solver`]: the iterate, reweight, check-convergence loop

use std::fmt;

pub mod iteration;
pub mod solver;

pub use iteration::Iteration;
pub use solver::Solver;

/// Status string reported for a successful run.
pub const CALCULATIONS_SUCCEED: &str = "Calculations succeed";
/// Status string reported when the normal equations could not be solved.
pub const CALCULATIONS_ABORTED: &str = "Calculations aborted due to SVD did not converge";

/// State of the solver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverStatus {
    /// No iteration has run yet
    #[default]
    NotStarted,
    /// At least one iteration has run, no stop criterion met yet
    Iterating,
    /// Every coordinate increment is within the threshold
    Converged,
    /// The iteration cap was hit before the threshold was met
    MaxIterationsReached,
    /// The normal equations could not be solved
    SingularFailure,
}

impl SolverStatus {
    /// A run that produced a usable solution.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            SolverStatus::Iterating | SolverStatus::Converged | SolverStatus::MaxIterationsReached
        )
    }

    pub fn is_finished(self) -> bool {
        matches!(
            self,
            SolverStatus::Converged
                | SolverStatus::MaxIterationsReached
                | SolverStatus::SingularFailure
        )
    }

    /// Human-readable calculation status.
    pub fn calculation_status(self) -> &'static str {
        match self {
            SolverStatus::SingularFailure => CALCULATIONS_ABORTED,
            SolverStatus::NotStarted => "Calculations not started",
            _ => CALCULATIONS_SUCCEED,
        }
    }
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverStatus::NotStarted => write!(f, "Not started"),
            SolverStatus::Iterating => write!(f, "Iterating"),
            SolverStatus::Converged => write!(f, "Converged"),
            SolverStatus::MaxIterationsReached => write!(f, "Maximum iterations reached"),
            SolverStatus::SingularFailure => write!(f, "Singular failure"),
        }
    }
}

/// Divide values by the square root of their variances.
///
/// Non-positive variances give `-∞`, which the weighting functions map to a
/// zero coefficient.
pub fn normalize(values: &[f64], variances: &[f64]) -> Vec<f64> {
    values
        .iter()
        .zip(variances)
        .map(|(value, variance)| {
            if *variance > 0.0 {
                value / variance.sqrt()
            } else {
                f64::NEG_INFINITY
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        assert_eq!(
            SolverStatus::Converged.calculation_status(),
            "Calculations succeed"
        );
        assert_eq!(
            SolverStatus::MaxIterationsReached.calculation_status(),
            "Calculations succeed"
        );
        assert_eq!(
            SolverStatus::SingularFailure.calculation_status(),
            "Calculations aborted due to SVD did not converge"
        );
    }

    #[test]
    fn test_status_success() {
        assert!(SolverStatus::Converged.is_success());
        assert!(SolverStatus::MaxIterationsReached.is_success());
        assert!(!SolverStatus::SingularFailure.is_success());
        assert!(!SolverStatus::NotStarted.is_success());
        assert!(!SolverStatus::Iterating.is_finished());
    }

    #[test]
    fn test_normalize() {
        let normalized = normalize(&[2.0, 1.0, 3.0], &[4.0, 0.0, -1.0]);
        assert_eq!(normalized[0], 1.0);
        assert_eq!(normalized[1], f64::NEG_INFINITY);
        assert_eq!(normalized[2], f64::NEG_INFINITY);
    }
}
