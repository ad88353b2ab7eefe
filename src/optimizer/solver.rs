//! Iterate, reweight and check convergence.

use nalgebra::DVector;
use tracing::{debug, info, warn};

use super::iteration::Iteration;
use super::SolverStatus;
use crate::config::SolverProfile;
use crate::core::MatrixBuilder;
use crate::error::{AdjustmentWarning, SurveyNetResult};
use crate::linalg::DenseSolver;

/// Drives the iteratively reweighted least-squares loop.
///
/// The solver owns the matrix builder (and with it the current approximate
/// coordinates) and the latest completed [`Iteration`]. Approximations are
/// only updated after an iteration succeeded, so a failed solve leaves the
/// last valid state in place.
#[derive(Debug, Clone)]
pub struct Solver {
    builder: MatrixBuilder,
    profile: SolverProfile,
    linear_solver: DenseSolver,
    iteration: Option<Iteration>,
    current_iter: usize,
    status: SolverStatus,
    create_list_of_variances: bool,
    residual_variances: Vec<f64>,
    coordinate_correction_variances: Vec<f64>,
    warnings: Vec<AdjustmentWarning>,
}

impl Solver {
    pub fn new(builder: MatrixBuilder, profile: SolverProfile) -> Self {
        Self {
            builder,
            profile,
            linear_solver: DenseSolver::new(),
            iteration: None,
            current_iter: 0,
            status: SolverStatus::NotStarted,
            create_list_of_variances: false,
            residual_variances: Vec::new(),
            coordinate_correction_variances: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Keep a per-iteration history of the variances
    pub fn with_variance_history(mut self, enabled: bool) -> Self {
        self.create_list_of_variances = enabled;
        self
    }

    pub fn with_linear_solver(mut self, linear_solver: DenseSolver) -> Self {
        self.linear_solver = linear_solver;
        self
    }

    /// Run one iteration.
    ///
    /// After the first iteration the matrices are rebuilt at the updated
    /// approximations and robust weights are refreshed from the previous
    /// iteration's normalized values.
    ///
    /// # Returns
    /// `Ok(true)` when the iteration succeeded, `Ok(false)` when the normal
    /// equations could not be solved (status becomes `SingularFailure`).
    ///
    /// # Errors
    /// Input errors from rebuilding the matrices, such as points that collapsed
    /// onto each other.
    pub fn iterate(&mut self) -> SurveyNetResult<bool> {
        if let Some(previous) = &self.iteration {
            self.builder.update_xy_matrices()?;
            if self.builder.obs_method().is_robust() {
                self.builder
                    .update_w_matrix(&previous.normalized_residuals())?;
            }
            let n_coordinates = self.builder.indexer().coordinate_count();
            self.builder
                .update_sw_matrix(&previous.normalized_increments(n_coordinates))?;
        }

        let number = self.current_iter + 1;
        let iteration = match Iteration::run(&self.builder, &self.linear_solver, number) {
            Ok(iteration) => iteration,
            Err(err) => {
                warn!("Iteration {} failed: {}", number, err);
                self.status = SolverStatus::SingularFailure;
                return Ok(false);
            }
        };

        self.builder.apply_increments(iteration.increments())?;
        self.current_iter = number;
        for warning in iteration.warnings() {
            warn!("{}", warning);
        }
        self.warnings.extend(iteration.warnings().iter().cloned());
        self.iteration = Some(iteration);
        self.status = SolverStatus::Iterating;

        if self.create_list_of_variances {
            self.residual_variances.push(self.residual_variance());
            self.coordinate_correction_variances
                .push(self.coordinate_correction_variance());
        }
        self.refresh_tuning_constants();

        debug!(
            "Iteration {}: max |Δ| = {:.3e}, σ0² = {:.6}, inversion = {}",
            number,
            self.max_coordinate_increment(),
            self.residual_variance(),
            self.iteration
                .as_ref()
                .map(|it| it.inversion_method().to_string())
                .unwrap_or_default()
        );
        Ok(true)
    }

    /// Iterate until the coordinate increments are within the threshold or
    /// the iteration cap of the profile is reached.
    ///
    /// The threshold check takes priority when both criteria hold at once.
    pub fn solve(&mut self) -> SurveyNetResult<SolverStatus> {
        loop {
            if !self.iterate()? {
                info!(
                    "Adjustment aborted after {} iterations: {}",
                    self.current_iter,
                    self.status.calculation_status()
                );
                return Ok(self.status);
            }
            if self.max_coordinate_increment() <= self.profile.threshold {
                self.status = SolverStatus::Converged;
                break;
            }
            if self.current_iter >= self.profile.max_iterations {
                self.status = SolverStatus::MaxIterationsReached;
                break;
            }
        }
        info!(
            "Adjustment finished after {} iterations: {}",
            self.current_iter, self.status
        );
        Ok(self.status)
    }

    /// Update `t` / `cra` constants from the latest normalized values.
    fn refresh_tuning_constants(&mut self) {
        let Some(iteration) = &self.iteration else {
            return;
        };
        let dof = iteration.degrees_of_freedom();
        let residuals = iteration.normalized_residuals();
        if self
            .builder
            .obs_method_mut()
            .refresh_constants(&residuals, dof)
        {
            debug!("Refreshed constants: {}", self.builder.obs_method());
        }
        let increments = iteration.normalized_increments(self.builder.indexer().coordinate_count());
        if let Some(free_method) = self.builder.free_method_mut() {
            free_method.refresh_constants(&increments, dof);
        }
    }

    fn max_coordinate_increment(&self) -> f64 {
        self.coordinate_increments()
            .iter()
            .fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// A posteriori variance factor of the latest iteration; NaN before the first one.
    pub fn residual_variance(&self) -> f64 {
        self.iteration
            .as_ref()
            .map_or(f64::NAN, Iteration::residual_variance)
    }

    /// Variance of the coordinate corrections.
    ///
    /// With movable tie points this is `Σ corr² · pw / n_movable`, where the
    /// point weights `pw` are used only when a point weight matrix exists.
    /// Without movable tie points it is 1.
    pub fn coordinate_correction_variance(&self) -> f64 {
        let n_movable = self.builder.movable_tie_points();
        if n_movable == 0 {
            return 1.0;
        }
        let corrections = self.builder.coordinate_corrections();
        let sum: f64 = match self.builder.point_weights() {
            Some(weights) => corrections
                .iter()
                .zip(weights.iter())
                .map(|(c, w)| c * c * w)
                .sum(),
            None => corrections.iter().map(|c| c * c).sum(),
        };
        sum / n_movable as f64
    }

    /// Residual variance per iteration, or the current value when the history is disabled.
    pub fn residual_variances(&self) -> Vec<f64> {
        if self.create_list_of_variances {
            self.residual_variances.clone()
        } else {
            vec![self.residual_variance()]
        }
    }

    /// Coordinate correction variance per iteration, or the current value when the history is disabled.
    pub fn coordinate_correction_variances(&self) -> Vec<f64> {
        if self.create_list_of_variances {
            self.coordinate_correction_variances.clone()
        } else {
            vec![self.coordinate_correction_variance()]
        }
    }

    /// Coordinate increments of the latest iteration (empty before the first one).
    pub fn coordinate_increments(&self) -> DVector<f64> {
        let n = self.builder.indexer().coordinate_count();
        self.iteration
            .as_ref()
            .map_or_else(|| DVector::zeros(0), |it| it.coordinate_increments(n))
    }

    /// Current point weights per coordinate column, if a point weight matrix exists.
    pub fn coordinate_weights(&self) -> Option<DVector<f64>> {
        self.builder.point_weights()
    }

    pub fn iteration(&self) -> Option<&Iteration> {
        self.iteration.as_ref()
    }

    pub fn builder(&self) -> &MatrixBuilder {
        &self.builder
    }

    pub fn profile(&self) -> &SolverProfile {
        &self.profile
    }

    pub fn current_iter(&self) -> usize {
        self.current_iter
    }

    pub fn status(&self) -> SolverStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn warnings(&self) -> &[AdjustmentWarning] {
        &self.warnings
    }

    pub fn movable_tie_points(&self) -> usize {
        self.builder.movable_tie_points()
    }

    pub fn fixed_tie_points(&self) -> usize {
        self.builder.fixed_tie_points()
    }

    pub fn coordinate_correction_count(&self) -> usize {
        self.builder.indexer().coordinate_count()
    }

    pub fn inner_constraints(&self) -> Vec<String> {
        self.builder.inner_constraints()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SigmaProfile;
    use crate::core::{MethodConfig, WeightingMethod};
    use crate::data::{ControlPoint, DatasetBuilder, ObservationKind};
    use approx::assert_relative_eq;

    fn resection(method: WeightingMethod) -> Solver {
        let truth = (40.0_f64, 30.0_f64);
        let fixed = [("A", 0.0, 0.0), ("B", 100.0, 0.0), ("C", 50.0, 100.0)];
        let mut builder = DatasetBuilder::new();
        for (id, x, y) in fixed {
            builder = builder
                .control(ControlPoint::planar(id, x, y).fixed())
                .station(format!("S{id}"), id);
        }
        builder = builder.control(ControlPoint::planar("P", 40.5, 29.6));
        for (id, x, y) in fixed {
            let distance = (truth.0 - x).hypot(truth.1 - y);
            builder = builder.observe(format!("S{id}"), "P", ObservationKind::Hd, distance, Some(0.01));
        }
        let matrices = MatrixBuilder::new(
            builder.build().unwrap(),
            MethodConfig::new(method),
            None,
            &SigmaProfile::default(),
        )
        .unwrap();
        Solver::new(matrices, SolverProfile::default())
    }

    #[test]
    fn test_solver_starts_not_started() {
        let solver = resection(WeightingMethod::Weighted);
        assert_eq!(solver.status(), SolverStatus::NotStarted);
        assert_eq!(solver.current_iter(), 0);
        assert!(solver.residual_variance().is_nan());
        assert!(solver.coordinate_increments().is_empty());
    }

    #[test]
    fn test_iterate_advances_counter() {
        let mut solver = resection(WeightingMethod::Weighted);
        assert!(solver.iterate().unwrap());
        assert_eq!(solver.current_iter(), 1);
        assert_eq!(solver.status(), SolverStatus::Iterating);
        assert!(solver.iteration().is_some());
    }

    #[test]
    fn test_solve_converges_to_truth() {
        let mut solver = resection(WeightingMethod::Weighted);
        let status = solver.solve().unwrap();
        assert_eq!(status, SolverStatus::Converged);
        assert!(solver.current_iter() <= 5);
        let p = solver.builder().coordinates()[3];
        assert_relative_eq!(p[0].unwrap(), 40.0, epsilon = 1e-6);
        assert_relative_eq!(p[1].unwrap(), 30.0, epsilon = 1e-6);
        assert!(solver.coordinate_correction_variance() > 0.0);
    }

    #[test]
    fn test_max_iterations_reached() {
        let mut solver = resection(WeightingMethod::Weighted);
        solver.profile = SolverProfile::default()
            .with_max_iterations(1)
            .with_threshold(1e-12);
        assert_eq!(solver.solve().unwrap(), SolverStatus::MaxIterationsReached);
        assert_eq!(solver.current_iter(), 1);
        assert!(solver.is_success());
    }

    #[test]
    fn test_variance_history() {
        let mut solver = resection(WeightingMethod::Weighted).with_variance_history(true);
        solver.solve().unwrap();
        assert_eq!(solver.residual_variances().len(), solver.current_iter());
        assert_eq!(
            solver.coordinate_correction_variances().len(),
            solver.current_iter()
        );

        let mut single = resection(WeightingMethod::Weighted);
        single.solve().unwrap();
        assert_eq!(single.residual_variances().len(), 1);
    }

    #[test]
    fn test_ordinary_weights_invariant() {
        let mut solver = resection(WeightingMethod::Ordinary);
        solver.iterate().unwrap();
        let first = solver.iteration().unwrap().weights().clone();
        solver.iterate().unwrap();
        assert_eq!(solver.iteration().unwrap().weights(), &first);
    }

    #[test]
    fn test_coordinate_correction_variance_unweighted() {
        let mut solver = resection(WeightingMethod::Weighted);
        solver.solve().unwrap();
        let corrections = solver.builder().coordinate_corrections();
        let expected = corrections.iter().map(|c| c * c).sum::<f64>() / 2.0;
        assert_relative_eq!(solver.coordinate_correction_variance(), expected);
    }
}
