//! A single least-squares iteration.
//!
//! Given the current stacked system `X`, `Y` and weights `w`, one iteration forms
//!
//! ```text
//! G  = Xᵀ W X                 normal matrix
//! g  = Xᵀ W Y                 cross product
//! Δ  = G⁻ g                   increments (G⁻: inverse or pseudoinverse)
//! r  = Y − X Δ                residuals
//! σ0² = rᵀ W r / (n − u)      residual variance
//! ```
//!
//! and the covariance matrices of the unknowns, the adjusted observations and
//! the residuals. An iteration is immutable once computed; the solver replaces
//! it wholesale with the next one.

use nalgebra::{DMatrix, DVector};

use super::normalize;
use crate::core::MatrixBuilder;
use crate::error::AdjustmentWarning;
use crate::linalg::{GeneralizedInverse, InversionMethod, LinAlgError, LinAlgResult, LinearSolver};

/// Matrices and statistics of one completed iteration.
#[derive(Debug, Clone)]
pub struct Iteration {
    number: usize,
    n_observations: usize,
    x: DMatrix<f64>,
    y: DVector<f64>,
    weights: DVector<f64>,
    weight_coefficients: DVector<f64>,
    normal: DMatrix<f64>,
    normal_inverse: GeneralizedInverse,
    cross_product: DVector<f64>,
    increments: DVector<f64>,
    residuals: DVector<f64>,
    degrees_of_freedom: usize,
    residual_variance: f64,
    covariance_x: DMatrix<f64>,
    covariance_y: DMatrix<f64>,
    covariance_r: DMatrix<f64>,
    warnings: Vec<AdjustmentWarning>,
}

impl Iteration {
    /// Solve the current system of `builder`.
    ///
    /// # Arguments
    /// * `builder` - Matrix builder holding X, Y and the weights
    /// * `solver` - Normal equation solver
    /// * `number` - Number this iteration will carry (1-based)
    ///
    /// # Errors
    /// Any [`LinAlgError`] from the inversion, or `NonFinite` when the
    /// increments or the residual variance are not finite.
    pub fn run(
        builder: &MatrixBuilder,
        solver: &impl LinearSolver,
        number: usize,
    ) -> LinAlgResult<Self> {
        let x = builder.x().clone();
        let y = builder.y().clone();
        let weights = builder.weights();

        // Xᵀ W: scale column j of Xᵀ by w_j
        let mut xtw = x.transpose();
        for (j, mut column) in xtw.column_iter_mut().enumerate() {
            column *= weights[j];
        }
        let normal = &xtw * &x;
        let cross_product = &xtw * &y;

        let normal_inverse = if builder.requires_pseudoinverse() {
            solver.pseudoinverse(&normal)?
        } else {
            solver.generalized_inverse(&normal)?
        };
        let increments = normal_inverse.solve(&cross_product)?;
        let residuals = &y - &x * &increments;

        let mut warnings = Vec::new();
        let degrees_of_freedom = builder.degrees_of_freedom();
        let weighted_square_sum: f64 = residuals
            .iter()
            .zip(weights.iter())
            .map(|(r, w)| r * r * w)
            .sum();
        let residual_variance = if degrees_of_freedom > 0 {
            weighted_square_sum / degrees_of_freedom as f64
        } else {
            warnings.push(AdjustmentWarning::ZeroRedundancy { iteration: number });
            1.0
        };
        if !residual_variance.is_finite() {
            return Err(LinAlgError::NonFinite("residual variance"));
        }

        let cofactor_y = &x * &normal_inverse.matrix * x.transpose();
        let mut covariance_x = &normal_inverse.matrix * residual_variance;
        let mut covariance_y = &cofactor_y * residual_variance;
        let rows = weights.len();
        let mut covariance_r = DMatrix::from_fn(rows, rows, |i, j| {
            if weights[i] == 0.0 || weights[j] == 0.0 {
                return 0.0;
            }
            let prior = if i == j { 1.0 / weights[i] } else { 0.0 };
            residual_variance * (prior - cofactor_y[(i, j)])
        });

        let clamped = clamp_negative_diagonal(&mut covariance_x)
            + clamp_negative_diagonal(&mut covariance_y)
            + clamp_negative_diagonal(&mut covariance_r);
        if clamped > 0 {
            warnings.push(AdjustmentWarning::InvalidVariance {
                count: clamped,
                iteration: number,
            });
        }

        Ok(Self {
            number,
            n_observations: builder.n_observations(),
            x,
            y,
            weights,
            weight_coefficients: builder.weight_coefficients().clone(),
            normal,
            normal_inverse,
            cross_product,
            increments,
            residuals,
            degrees_of_freedom,
            residual_variance,
            covariance_x,
            covariance_y,
            covariance_r,
            warnings,
        })
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub fn x(&self) -> &DMatrix<f64> {
        &self.x
    }

    pub fn y(&self) -> &DVector<f64> {
        &self.y
    }

    /// Diagonal of the stacked weight matrix used by this iteration
    pub fn weights(&self) -> &DVector<f64> {
        &self.weights
    }

    /// Robust coefficients of the measurement rows used by this iteration
    pub fn weight_coefficients(&self) -> &DVector<f64> {
        &self.weight_coefficients
    }

    /// Normal matrix G
    pub fn normal(&self) -> &DMatrix<f64> {
        &self.normal
    }

    /// Generalized inverse of G
    pub fn normal_inverse(&self) -> &DMatrix<f64> {
        &self.normal_inverse.matrix
    }

    pub fn inversion_method(&self) -> InversionMethod {
        self.normal_inverse.method
    }

    pub fn cross_product(&self) -> &DVector<f64> {
        &self.cross_product
    }

    pub fn increments(&self) -> &DVector<f64> {
        &self.increments
    }

    /// Increments of the coordinate unknowns (the leading columns).
    pub fn coordinate_increments(&self, n_coordinates: usize) -> DVector<f64> {
        self.increments.rows(0, n_coordinates).into_owned()
    }

    /// Residuals of every row, pseudo-observations included
    pub fn residuals(&self) -> &DVector<f64> {
        &self.residuals
    }

    /// Residuals of the measurement rows
    pub fn observation_residuals(&self) -> DVector<f64> {
        self.residuals.rows(0, self.n_observations).into_owned()
    }

    pub fn n_observations(&self) -> usize {
        self.n_observations
    }

    pub fn degrees_of_freedom(&self) -> usize {
        self.degrees_of_freedom
    }

    /// A posteriori variance factor σ0²
    pub fn residual_variance(&self) -> f64 {
        self.residual_variance
    }

    pub fn covariance_x(&self) -> &DMatrix<f64> {
        &self.covariance_x
    }

    pub fn covariance_y(&self) -> &DMatrix<f64> {
        &self.covariance_y
    }

    pub fn covariance_r(&self) -> &DMatrix<f64> {
        &self.covariance_r
    }

    /// Warnings raised while computing this iteration
    pub fn warnings(&self) -> &[AdjustmentWarning] {
        &self.warnings
    }

    /// Residuals of the measurement rows divided by their standard deviation.
    pub fn normalized_residuals(&self) -> Vec<f64> {
        let variances: Vec<f64> = (0..self.n_observations)
            .map(|i| self.covariance_r[(i, i)])
            .collect();
        normalize(
            &self.residuals.as_slice()[..self.n_observations],
            &variances,
        )
    }

    /// Coordinate corrections divided by the standard deviation of their unknown.
    pub fn normalized_corrections(&self, corrections: &DVector<f64>) -> Vec<f64> {
        let variances: Vec<f64> = (0..corrections.len())
            .map(|i| self.covariance_x[(i, i)])
            .collect();
        normalize(corrections.as_slice(), &variances)
    }

    /// Coordinate increments of this iteration divided by the standard
    /// deviation of their unknown.
    pub fn normalized_increments(&self, n_coordinates: usize) -> Vec<f64> {
        let variances: Vec<f64> = (0..n_coordinates)
            .map(|i| self.covariance_x[(i, i)])
            .collect();
        normalize(&self.increments.as_slice()[..n_coordinates], &variances)
    }
}

fn clamp_negative_diagonal(matrix: &mut DMatrix<f64>) -> usize {
    let mut count = 0;
    for i in 0..matrix.nrows().min(matrix.ncols()) {
        if matrix[(i, i)] < 0.0 {
            matrix[(i, i)] = 0.0;
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigmaProfile;
    use crate::core::{MethodConfig, WeightingMethod};
    use crate::data::{Axis, ControlPoint, DatasetBuilder, ObservationKind};
    use crate::linalg::DenseSolver;
    use approx::assert_relative_eq;

    /// Levelling line A(fixed) -> P -> B(fixed) with a misclosure.
    fn levelling_builder() -> MatrixBuilder {
        let dataset = DatasetBuilder::new()
            .control(ControlPoint::new("A").with_coordinate(Axis::Z, 0.0).fixed())
            .control(ControlPoint::new("B").with_coordinate(Axis::Z, 2.0).fixed())
            .control(ControlPoint::new("P").with_coordinate(Axis::Z, 0.0))
            .station("SA", "A")
            .station("SP", "P")
            .observe("SA", "P", ObservationKind::Vd, 1.01, Some(0.01))
            .observe("SP", "B", ObservationKind::Vd, 1.01, Some(0.01))
            .build()
            .unwrap();
        MatrixBuilder::new(
            dataset,
            MethodConfig::new(WeightingMethod::Weighted),
            None,
            &SigmaProfile::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_levelling_solution() {
        let builder = levelling_builder();
        let iteration = Iteration::run(&builder, &DenseSolver::new(), 1).unwrap();
        // P = mean of 1.01 and 2 - 1.01
        assert_relative_eq!(iteration.increments()[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(iteration.residuals()[0], 0.01, epsilon = 1e-12);
        assert_relative_eq!(iteration.residuals()[1], 0.01, epsilon = 1e-12);
        assert_eq!(iteration.inversion_method(), InversionMethod::Cholesky);
        assert_eq!(iteration.degrees_of_freedom(), 1);
        // σ0² = 2 · 0.01² / 0.01² / 1
        assert_relative_eq!(iteration.residual_variance(), 2.0, epsilon = 1e-9);
        assert!(iteration.warnings().is_empty());
    }

    #[test]
    fn test_covariance_relations() {
        let builder = levelling_builder();
        let iteration = Iteration::run(&builder, &DenseSolver::new(), 1).unwrap();
        let s0 = iteration.residual_variance();
        // G = 2 / 0.01², so var(P) = σ0² · 0.01² / 2
        assert_relative_eq!(
            iteration.covariance_x()[(0, 0)],
            s0 * 0.0001 / 2.0,
            epsilon = 1e-15
        );
        // Σ_r + Σ_Y = σ0² W⁻¹ on the diagonal
        for i in 0..2 {
            assert_relative_eq!(
                iteration.covariance_r()[(i, i)] + iteration.covariance_y()[(i, i)],
                s0 * 0.0001,
                epsilon = 1e-15
            );
        }
        let normalized = iteration.normalized_residuals();
        assert_relative_eq!(normalized[0], normalized[1], epsilon = 1e-12);
        assert!(normalized[0] > 0.0);
    }

    #[test]
    fn test_clamp_negative_diagonal() {
        let mut matrix = DMatrix::from_row_slice(3, 3, &[
            -1e-18, 0.5, 0.0, //
            0.5, 2.0, 0.0, //
            0.0, 0.0, -3e-17,
        ]);
        assert_eq!(clamp_negative_diagonal(&mut matrix), 2);
        assert_eq!(matrix[(0, 0)], 0.0);
        assert_eq!(matrix[(2, 2)], 0.0);
        assert_eq!(matrix[(1, 1)], 2.0);
        assert_eq!(matrix[(0, 1)], 0.5);
    }

    #[test]
    fn test_coordinate_increments_slice() {
        let builder = levelling_builder();
        let iteration = Iteration::run(&builder, &DenseSolver::new(), 1).unwrap();
        assert_eq!(iteration.coordinate_increments(1).len(), 1);
        assert_eq!(iteration.observation_residuals().len(), 2);
    }
}
