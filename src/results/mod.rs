//! Derived statistics of an adjustment run.
//!
//! [`Results`] is a read-only view over a [`Solver`]. Every statistic is
//! derived together into one [`ResultsBundle`] on first access and cached
//! under the key `(iteration counter, solver status)`. When the key changes
//! the whole bundle is rebuilt, so a snapshot never mixes values from
//! different iterations.

use serde::Serialize;
use std::f64::consts::PI;

use crate::basic::normalize_angle;
use crate::data::Axis;
use crate::error::AdjustmentWarning;
use crate::optimizer::{Solver, SolverStatus};

/// Summary scalars of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub success: bool,
    pub calculation_status: String,
    pub iterations: usize,
    pub max_iterations: usize,
    pub converged: bool,
    pub degrees_of_freedom: usize,
    pub n_unknowns: usize,
    pub n_observations: usize,
    pub n_pseudo_observations: usize,
    pub movable_tie_points: usize,
    pub fixed_tie_points: usize,
    pub coordinate_corrections: usize,
    /// A posteriori variance factor σ0²
    pub residual_variance: f64,
    /// σ0
    pub residual_sigma: f64,
    pub coordinate_correction_variance: f64,
    pub coordinate_correction_sigma: f64,
    pub inner_constraints: Vec<String>,
    pub inversion_method: Option<String>,
    pub weighting_method: String,
}

/// Adjusted coordinates and statistics of one control point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustedPoint {
    pub id: String,
    pub approximate: [Option<f64>; 3],
    pub adjusted: [Option<f64>; 3],
    pub corrections: [Option<f64>; 3],
    /// Standard deviation per axis; 0 for fixed components
    pub sigmas: [Option<f64>; 3],
    pub normalized_corrections: [Option<f64>; 3],
}

/// Standard error ellipse of a point with estimated x and y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ErrorEllipse {
    pub semi_major: f64,
    pub semi_minor: f64,
    /// Orientation of the major axis from the X axis, in `[0, π)`
    pub phi: f64,
}

impl ErrorEllipse {
    /// Ellipse from the 2×2 covariance `[[var_x, cov_xy], [cov_xy, var_y]]`.
    pub fn from_covariance(var_x: f64, var_y: f64, cov_xy: f64) -> Self {
        let term1 = (var_x + var_y) / 2.0;
        let term2 = (((var_x - var_y) / 2.0).powi(2) + cov_xy.powi(2)).sqrt();
        let phi = ((2.0 * cov_xy).atan2(var_x - var_y) / 2.0).rem_euclid(PI);
        Self {
            semi_major: (term1 + term2).max(0.0).sqrt(),
            semi_minor: (term1 - term2).max(0.0).sqrt(),
            phi: if phi >= PI { 0.0 } else { phi },
        }
    }
}

/// Point error ellipse keyed by point id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointEllipse {
    pub id: String,
    pub ellipse: ErrorEllipse,
}

/// One adjusted measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustedObservation {
    pub label: String,
    pub observed: f64,
    pub adjusted: f64,
    pub residual: f64,
    /// Standard deviation of the adjusted value
    pub sigma: f64,
    /// Standard deviation of the residual
    pub residual_sigma: f64,
    pub normalized_residual: f64,
    /// Weight used in the latest iteration
    pub weight: f64,
    /// Robust coefficient applied to the a priori weight
    pub weight_coefficient: f64,
}

/// Adjusted orientation unknown of a station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdjustedOrientation {
    pub station: String,
    pub approximate: f64,
    pub adjusted: f64,
    pub sigma: f64,
}

/// Every derived statistic of one solver state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsBundle {
    pub summary: Summary,
    pub points: Vec<AdjustedPoint>,
    pub ellipses: Vec<PointEllipse>,
    pub observations: Vec<AdjustedObservation>,
    pub orientations: Vec<AdjustedOrientation>,
    pub residual_variances: Vec<f64>,
    pub coordinate_correction_variances: Vec<f64>,
    pub unknown_labels: Vec<String>,
    #[serde(skip)]
    pub warnings: Vec<AdjustmentWarning>,
}

impl ResultsBundle {
    /// Derive every statistic from the current solver state.
    pub fn compute(solver: &Solver) -> Self {
        let builder = solver.builder();
        let dataset = builder.dataset();
        let indexer = builder.indexer();
        let iteration = solver.iteration();
        let status = solver.status();

        let residual_variance = solver.residual_variance();
        let coordinate_correction_variance = solver.coordinate_correction_variance();
        let corrections = builder.coordinate_corrections();
        let normalized_corrections = iteration
            .map(|it| it.normalized_corrections(&corrections))
            .unwrap_or_default();

        let summary = Summary {
            success: status.is_success(),
            calculation_status: status.calculation_status().to_string(),
            iterations: solver.current_iter(),
            max_iterations: solver.profile().max_iterations,
            converged: status == SolverStatus::Converged,
            degrees_of_freedom: builder.degrees_of_freedom(),
            n_unknowns: builder.n_unknowns(),
            n_observations: builder.n_observations(),
            n_pseudo_observations: builder.n_rows() - builder.n_observations(),
            movable_tie_points: solver.movable_tie_points(),
            fixed_tie_points: solver.fixed_tie_points(),
            coordinate_corrections: solver.coordinate_correction_count(),
            residual_variance,
            residual_sigma: residual_variance.sqrt(),
            coordinate_correction_variance,
            coordinate_correction_sigma: coordinate_correction_variance.sqrt(),
            inner_constraints: solver.inner_constraints(),
            inversion_method: iteration.map(|it| it.inversion_method().to_string()),
            weighting_method: builder.obs_method().to_string(),
        };

        let points: Vec<AdjustedPoint> = dataset
            .controls()
            .iter()
            .enumerate()
            .map(|(idx, point)| {
                let mut adjusted = AdjustedPoint {
                    id: point.id.clone(),
                    approximate: builder.initial_coordinates()[idx],
                    adjusted: builder.coordinates()[idx],
                    corrections: [None; 3],
                    sigmas: [None; 3],
                    normalized_corrections: [None; 3],
                };
                for axis in Axis::ALL {
                    let a = axis.index();
                    if point.is_fixed(axis) {
                        adjusted.corrections[a] = Some(0.0);
                        adjusted.sigmas[a] = Some(0.0);
                    }
                    if let Some(column) = indexer.coordinate_index(idx, axis) {
                        adjusted.corrections[a] = Some(corrections[column]);
                        adjusted.sigmas[a] =
                            iteration.map(|it| it.covariance_x()[(column, column)].sqrt());
                        adjusted.normalized_corrections[a] =
                            normalized_corrections.get(column).copied();
                    }
                }
                adjusted
            })
            .collect();

        let ellipses: Vec<PointEllipse> = match iteration {
            Some(it) => dataset
                .controls()
                .iter()
                .enumerate()
                .filter_map(|(idx, point)| {
                    let x = indexer.coordinate_index(idx, Axis::X)?;
                    let y = indexer.coordinate_index(idx, Axis::Y)?;
                    let cov = it.covariance_x();
                    Some(PointEllipse {
                        id: point.id.clone(),
                        ellipse: ErrorEllipse::from_covariance(
                            cov[(x, x)],
                            cov[(y, y)],
                            cov[(x, y)],
                        ),
                    })
                })
                .collect(),
            None => Vec::new(),
        };

        let observations: Vec<AdjustedObservation> = match iteration {
            Some(it) => {
                let normalized = it.normalized_residuals();
                let coefficients = it.weight_coefficients();
                dataset
                    .measurements()
                    .iter()
                    .enumerate()
                    .map(|(i, measurement)| {
                        let residual = it.residuals()[i];
                        let mut adjusted = measurement.value - residual;
                        if measurement.kind.is_direction() {
                            adjusted = normalize_angle(adjusted);
                        }
                        AdjustedObservation {
                            label: measurement.label(),
                            observed: measurement.value,
                            adjusted,
                            residual,
                            sigma: it.covariance_y()[(i, i)].sqrt(),
                            residual_sigma: it.covariance_r()[(i, i)].sqrt(),
                            normalized_residual: normalized[i],
                            weight: it.weights()[i],
                            weight_coefficient: coefficients[i],
                        }
                    })
                    .collect()
            }
            None => Vec::new(),
        };

        let orientations: Vec<AdjustedOrientation> = dataset
            .stations()
            .iter()
            .enumerate()
            .filter_map(|(idx, station)| {
                let column = indexer.orientation_index(idx)?;
                Some(AdjustedOrientation {
                    station: station.key.clone(),
                    approximate: builder.initial_orientations()[idx]?,
                    adjusted: builder.orientations()[idx]?,
                    sigma: iteration
                        .map_or(f64::NAN, |it| it.covariance_x()[(column, column)].sqrt()),
                })
            })
            .collect();

        Self {
            summary,
            points,
            ellipses,
            observations,
            orientations,
            residual_variances: solver.residual_variances(),
            coordinate_correction_variances: solver.coordinate_correction_variances(),
            unknown_labels: indexer.labels(dataset),
            warnings: solver.warnings().to_vec(),
        }
    }

    pub fn point(&self, id: &str) -> Option<&AdjustedPoint> {
        self.points.iter().find(|p| p.id == id)
    }

    pub fn ellipse(&self, id: &str) -> Option<&ErrorEllipse> {
        self.ellipses
            .iter()
            .find(|e| e.id == id)
            .map(|e| &e.ellipse)
    }
}

/// Lazily cached results of a solver.
#[derive(Debug, Clone, Default)]
pub struct Results {
    cached: Option<(CacheKey, ResultsBundle)>,
}

type CacheKey = (usize, SolverStatus);

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current bundle, recomputed in full when the solver advanced since the last call.
    pub fn bundle(&mut self, solver: &Solver) -> &ResultsBundle {
        let key = (solver.current_iter(), solver.status());
        if !self.is_fresh(solver) {
            tracing::debug!("Deriving results for iteration {}", key.0);
            self.cached = None;
        }
        let (_, bundle) = self
            .cached
            .get_or_insert_with(|| (key, ResultsBundle::compute(solver)));
        bundle
    }

    /// Whether a bundle for `solver`'s current state is cached.
    pub fn is_fresh(&self, solver: &Solver) -> bool {
        self.cached
            .as_ref()
            .is_some_and(|(key, _)| *key == (solver.current_iter(), solver.status()))
    }
}
