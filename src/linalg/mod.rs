//! Dense linear algebra for the normal equations.
//!
//! The adjustment needs the full generalized inverse of the normal matrix `G`,
//! not only a solution vector, because the covariance matrices are built from
//! it. Two decompositions are provided:
//! - Cholesky for regular, well conditioned systems
//! - SVD pseudoinverse for rank deficient (datum deficient) systems

use nalgebra::{DMatrix, DVector};
use std::fmt;
use thiserror::Error;

pub mod cholesky;
pub mod pseudoinverse;

pub use cholesky::cholesky_inverse;
pub use pseudoinverse::pseudo_inverse;

/// Result type of the linear algebra layer
pub type LinAlgResult<T> = Result<T, LinAlgError>;

/// Failures of the dense decompositions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinAlgError {
    /// Matrix is not symmetric positive definite, or too ill conditioned
    #[error("Cholesky factorization failed: {0}")]
    NotPositiveDefinite(String),

    /// The SVD iteration did not converge
    #[error("SVD did not converge")]
    SvdNotConverged,

    /// A decomposition produced NaN or infinite values
    #[error("Non-finite values in {0}")]
    NonFinite(&'static str),

    /// Operand shapes do not agree
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },
}

/// Decomposition used to invert the normal matrix in one iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InversionMethod {
    Cholesky,
    Pseudoinverse,
}

impl fmt::Display for InversionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InversionMethod::Cholesky => write!(f, "Cholesky"),
            InversionMethod::Pseudoinverse => write!(f, "pseudoinverse"),
        }
    }
}

/// Generalized inverse of a normal matrix and the path that produced it
#[derive(Debug, Clone)]
pub struct GeneralizedInverse {
    pub matrix: DMatrix<f64>,
    pub method: InversionMethod,
}

impl GeneralizedInverse {
    /// Apply the inverse to a right-hand side.
    pub fn solve(&self, rhs: &DVector<f64>) -> LinAlgResult<DVector<f64>> {
        if rhs.len() != self.matrix.ncols() {
            return Err(LinAlgError::DimensionMismatch {
                expected: format!("{} rows", self.matrix.ncols()),
                actual: format!("{} rows", rhs.len()),
            });
        }
        let solution = &self.matrix * rhs;
        if solution.iter().all(|v| v.is_finite()) {
            Ok(solution)
        } else {
            Err(LinAlgError::NonFinite("normal equation solution"))
        }
    }
}

/// Common interface for normal-equation solvers
///
/// Implementations return the (generalized) inverse of a symmetric
/// positive semi-definite matrix `G = XᵀWX`.
pub trait LinearSolver {
    /// Invert `normal`, falling back to a pseudoinverse when it is singular.
    fn generalized_inverse(&self, normal: &DMatrix<f64>) -> LinAlgResult<GeneralizedInverse>;

    /// Pseudoinverse only; the solve path of datum deficient free networks.
    fn pseudoinverse(&self, normal: &DMatrix<f64>) -> LinAlgResult<GeneralizedInverse>;
}

/// Configuration of [`DenseSolver`]
#[derive(Debug, Clone, PartialEq)]
pub struct DenseSolverConfig {
    /// Smallest accepted `(min/max diag(L))²` before Cholesky is considered singular
    pub condition_tolerance: f64,
    /// Singular values below `rank_tolerance · σ_max` are treated as zero
    pub rank_tolerance: f64,
    /// Iteration cap of the SVD (0 means unlimited)
    pub max_svd_iterations: usize,
}

impl Default for DenseSolverConfig {
    fn default() -> Self {
        Self {
            condition_tolerance: 1e-12,
            rank_tolerance: 1e-10,
            max_svd_iterations: 0,
        }
    }
}

impl DenseSolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_condition_tolerance(mut self, tolerance: f64) -> Self {
        self.condition_tolerance = tolerance;
        self
    }

    pub fn with_rank_tolerance(mut self, tolerance: f64) -> Self {
        self.rank_tolerance = tolerance;
        self
    }

    pub fn with_max_svd_iterations(mut self, max_iterations: usize) -> Self {
        self.max_svd_iterations = max_iterations;
        self
    }
}

/// Dense direct solver: Cholesky first, SVD pseudoinverse as fallback
#[derive(Debug, Clone, Default)]
pub struct DenseSolver {
    config: DenseSolverConfig,
}

impl DenseSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: DenseSolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DenseSolverConfig {
        &self.config
    }
}

impl LinearSolver for DenseSolver {
    fn generalized_inverse(&self, normal: &DMatrix<f64>) -> LinAlgResult<GeneralizedInverse> {
        match cholesky_inverse(normal, self.config.condition_tolerance) {
            Ok(matrix) => Ok(GeneralizedInverse {
                matrix,
                method: InversionMethod::Cholesky,
            }),
            Err(err) => {
                tracing::debug!("Falling back to pseudoinverse: {}", err);
                self.pseudoinverse(normal)
            }
        }
    }

    fn pseudoinverse(&self, normal: &DMatrix<f64>) -> LinAlgResult<GeneralizedInverse> {
        let matrix = pseudo_inverse(
            normal,
            self.config.rank_tolerance,
            self.config.max_svd_iterations,
        )?;
        Ok(GeneralizedInverse {
            matrix,
            method: InversionMethod::Pseudoinverse,
        })
    }
}

fn check_square(matrix: &DMatrix<f64>) -> LinAlgResult<()> {
    if matrix.is_square() {
        Ok(())
    } else {
        Err(LinAlgError::DimensionMismatch {
            expected: "square matrix".to_string(),
            actual: format!("{}x{}", matrix.nrows(), matrix.ncols()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_regular_matrix_uses_cholesky() {
        let g = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let inverse = DenseSolver::new().generalized_inverse(&g).unwrap();
        assert_eq!(inverse.method, InversionMethod::Cholesky);
        let identity = &g * &inverse.matrix;
        assert_relative_eq!(identity, DMatrix::identity(2, 2), epsilon = 1e-12);
    }

    #[test]
    fn test_singular_matrix_falls_back() {
        let g = DMatrix::from_row_slice(2, 2, &[1.0, -1.0, -1.0, 1.0]);
        let inverse = DenseSolver::new().generalized_inverse(&g).unwrap();
        assert_eq!(inverse.method, InversionMethod::Pseudoinverse);
        // Moore-Penrose: G G⁺ G = G
        let reconstructed = &g * &inverse.matrix * &g;
        assert_relative_eq!(reconstructed, g, epsilon = 1e-12);
    }

    #[test]
    fn test_solve_dimension_mismatch() {
        let inverse = GeneralizedInverse {
            matrix: DMatrix::identity(2, 2),
            method: InversionMethod::Cholesky,
        };
        assert!(matches!(
            inverse.solve(&DVector::zeros(3)),
            Err(LinAlgError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(LinAlgError::SvdNotConverged.to_string(), "SVD did not converge");
    }
}
