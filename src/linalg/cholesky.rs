//! Inverse of a symmetric positive definite matrix via Cholesky factorization.

use nalgebra::DMatrix;

use super::{LinAlgError, LinAlgResult, check_square};

/// Invert a symmetric positive definite matrix.
///
/// The factorization is rejected when the squared ratio of the smallest to the
/// largest diagonal entry of `L` drops below `condition_tolerance`, which is a
/// cheap estimate of the reciprocal condition number of the input.
///
/// # Arguments
/// * `matrix` - Symmetric matrix, only the lower triangle is read
/// * `condition_tolerance` - Smallest accepted reciprocal condition estimate
///
/// # Returns
/// The inverse, or `NotPositiveDefinite` when the matrix is singular or too ill
/// conditioned to trust.
pub fn cholesky_inverse(
    matrix: &DMatrix<f64>,
    condition_tolerance: f64,
) -> LinAlgResult<DMatrix<f64>> {
    check_square(matrix)?;
    if matrix.nrows() == 0 {
        return Ok(DMatrix::zeros(0, 0));
    }

    let cholesky = matrix.clone().cholesky().ok_or_else(|| {
        LinAlgError::NotPositiveDefinite("matrix is not positive definite".to_string())
    })?;

    let diagonal = cholesky.l_dirty().diagonal();
    let largest = diagonal.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let smallest = diagonal.iter().fold(f64::INFINITY, |acc, v| acc.min(v.abs()));
    if largest == 0.0 || !largest.is_finite() {
        return Err(LinAlgError::NotPositiveDefinite(
            "degenerate factor diagonal".to_string(),
        ));
    }
    let reciprocal_condition = (smallest / largest).powi(2);
    if reciprocal_condition < condition_tolerance {
        return Err(LinAlgError::NotPositiveDefinite(format!(
            "reciprocal condition estimate {reciprocal_condition:.3e} below {condition_tolerance:.1e}"
        )));
    }

    let inverse = cholesky.inverse();
    if inverse.iter().all(|v| v.is_finite()) {
        Ok(inverse)
    } else {
        Err(LinAlgError::NonFinite("Cholesky inverse"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_diagonal_inverse() {
        let matrix = DMatrix::from_diagonal(&nalgebra::DVector::from_vec(vec![2.0, 4.0, 8.0]));
        let inverse = cholesky_inverse(&matrix, 1e-12).unwrap();
        assert_relative_eq!(inverse[(0, 0)], 0.5);
        assert_relative_eq!(inverse[(1, 1)], 0.25);
        assert_relative_eq!(inverse[(2, 2)], 0.125);
    }

    #[test]
    fn test_indefinite_rejected() {
        let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(matches!(
            cholesky_inverse(&matrix, 1e-12),
            Err(LinAlgError::NotPositiveDefinite(_))
        ));
    }

    #[test]
    fn test_ill_conditioned_rejected() {
        let matrix = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1e-16]);
        assert!(cholesky_inverse(&matrix, 1e-12).is_err());
    }

    #[test]
    fn test_non_square_rejected() {
        let matrix = DMatrix::zeros(2, 3);
        assert!(matches!(
            cholesky_inverse(&matrix, 1e-12),
            Err(LinAlgError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_matrix() {
        let inverse = cholesky_inverse(&DMatrix::zeros(0, 0), 1e-12).unwrap();
        assert_eq!(inverse.nrows(), 0);
    }
}
