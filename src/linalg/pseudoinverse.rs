//! Moore-Penrose pseudoinverse via singular value decomposition.

use nalgebra::{DMatrix, SVD};

use super::{LinAlgError, LinAlgResult};

/// Compute the pseudoinverse of `matrix`.
///
/// Singular values below `rank_tolerance · σ_max` are treated as zero, which
/// removes the datum defect of a free network.
///
/// # Arguments
/// * `matrix` - Input matrix (any shape)
/// * `rank_tolerance` - Relative cut-off for singular values
/// * `max_iterations` - SVD iteration cap, 0 for unlimited
///
/// # Returns
/// The pseudoinverse, `SvdNotConverged` when the decomposition fails, or
/// `NonFinite` for non-finite input or output.
pub fn pseudo_inverse(
    matrix: &DMatrix<f64>,
    rank_tolerance: f64,
    max_iterations: usize,
) -> LinAlgResult<DMatrix<f64>> {
    if matrix.is_empty() {
        return Ok(DMatrix::zeros(matrix.ncols(), matrix.nrows()));
    }
    if !matrix.iter().all(|v| v.is_finite()) {
        return Err(LinAlgError::NonFinite("normal matrix"));
    }

    let svd = SVD::try_new(matrix.clone(), true, true, f64::EPSILON, max_iterations)
        .ok_or(LinAlgError::SvdNotConverged)?;

    let largest = svd.singular_values.max();
    let cutoff = (rank_tolerance * largest).max(0.0);
    let inverse = svd
        .pseudo_inverse(cutoff)
        .map_err(|_| LinAlgError::SvdNotConverged)?;

    if inverse.iter().all(|v| v.is_finite()) {
        Ok(inverse)
    } else {
        Err(LinAlgError::NonFinite("pseudoinverse"))
    }
}
