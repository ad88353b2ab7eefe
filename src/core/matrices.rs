//! Design matrix, observation vector and weights of the adjustment.
//!
//! The stacked system has one row per measurement followed, in a weighted free
//! adjustment, by one pseudo-observation row per tie point component:
//!
//! ```text
//! ┌       ┐         ┌       ┐   ┌   ┐
//! │ X_obs │         │ Y_obs │   │ W │
//! │ X_tie │ · inc ≈ │ Y_tie │ , │sW │  (diagonal)
//! └       ┘         └       ┘   └   ┘
//! ```
//!
//! `X_tie` has a single 1 per row at the tie component's column and
//! `Y_tie = initial − current`, which pulls tie points towards their initial
//! coordinates with weight `sW`.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::indexer::UnknownIndexer;
use super::methods::{MethodConfig, WeightingMethod};
use super::observation::linearize;
use crate::basic::normalize_angle;
use crate::config::SigmaProfile;
use crate::data::{Axis, Dataset};
use crate::error::{SurveyNetError, SurveyNetResult};

/// Which estimated coordinate components act as tie points of a free adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TiePointSelection {
    /// Components with an a priori sigma; all estimated components when none has one
    #[default]
    Sigma,
    /// Every estimated component
    All,
    /// Estimated components of the listed points
    Points(Vec<String>),
}

/// Free adjustment settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FreeAdjustment {
    pub method: MethodConfig,
    pub tie_points: TiePointSelection,
}

impl FreeAdjustment {
    pub fn new(method: MethodConfig) -> Self {
        Self {
            method,
            tie_points: TiePointSelection::default(),
        }
    }

    pub fn with_tie_points(mut self, tie_points: TiePointSelection) -> Self {
        self.tie_points = tie_points;
        self
    }

    /// Ordinary free adjustment has no tie rows and always uses the pseudoinverse.
    pub fn is_ordinary(&self) -> bool {
        self.method.method() == WeightingMethod::Ordinary
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TieComponent {
    point: usize,
    axis: Axis,
    column: usize,
    sigma: f64,
}

/// Builds and updates X, Y, W and sW from a dataset and the current approximations.
#[derive(Debug, Clone)]
pub struct MatrixBuilder {
    dataset: Dataset,
    indexer: UnknownIndexer,
    obs_method: MethodConfig,
    free: Option<FreeAdjustment>,
    ties: Vec<TieComponent>,
    initial_coordinates: Vec<[Option<f64>; 3]>,
    coordinates: Vec<[Option<f64>; 3]>,
    initial_orientations: Vec<Option<f64>>,
    orientations: Vec<Option<f64>>,
    x: DMatrix<f64>,
    y: DVector<f64>,
    base_weights: DVector<f64>,
    weight_coefficients: DVector<f64>,
    tie_base_weights: DVector<f64>,
    tie_coefficients: DVector<f64>,
}

impl MatrixBuilder {
    /// Index the unknowns, derive the a priori weights and build the initial X and Y.
    ///
    /// # Errors
    /// `NegativeDegreesOfFreedom` when the system has fewer rows than
    /// unknowns, `InvalidInput` for unknown tie point ids or degenerate geometry.
    pub fn new(
        dataset: Dataset,
        obs_method: MethodConfig,
        free: Option<FreeAdjustment>,
        sigma_profile: &SigmaProfile,
    ) -> SurveyNetResult<Self> {
        let indexer = UnknownIndexer::new(&dataset);
        let ties = match &free {
            Some(free) if !free.is_ordinary() => {
                select_ties(&dataset, &indexer, &free.tie_points, sigma_profile)?
            }
            _ => Vec::new(),
        };

        let rows = dataset.measurements().len() + ties.len();
        if rows < indexer.len() {
            return Err(SurveyNetError::NegativeDegreesOfFreedom {
                rows,
                columns: indexer.len(),
            });
        }

        let base_weights = DVector::from_iterator(
            dataset.measurements().len(),
            dataset.measurements().iter().map(|m| {
                if obs_method.method().uses_sigmas() {
                    let sigma = m.sigma.unwrap_or(if m.kind.is_angular() {
                        sigma_profile.angular
                    } else {
                        sigma_profile.linear
                    });
                    1.0 / (sigma * sigma)
                } else {
                    1.0
                }
            }),
        );
        let tie_base_weights =
            DVector::from_iterator(ties.len(), ties.iter().map(|t| 1.0 / (t.sigma * t.sigma)));

        let coordinates: Vec<[Option<f64>; 3]> =
            dataset.controls().iter().map(|p| p.coordinates).collect();
        let orientations: Vec<Option<f64>> =
            dataset.stations().iter().map(|s| s.orientation).collect();

        let mut builder = Self {
            x: DMatrix::zeros(rows, indexer.len()),
            y: DVector::zeros(rows),
            weight_coefficients: DVector::from_element(base_weights.len(), 1.0),
            tie_coefficients: DVector::from_element(ties.len(), 1.0),
            base_weights,
            tie_base_weights,
            initial_coordinates: coordinates.clone(),
            coordinates,
            initial_orientations: orientations.clone(),
            orientations,
            dataset,
            indexer,
            obs_method,
            free,
            ties,
        };
        builder.update_xy_matrices()?;
        tracing::debug!(
            "Matrix builder: {} rows ({} tie), {} unknowns",
            builder.n_rows(),
            builder.ties.len(),
            builder.n_unknowns()
        );
        Ok(builder)
    }

    /// Recompute X and Y at the current approximations.
    pub fn update_xy_matrices(&mut self) -> SurveyNetResult<()> {
        let mut x = DMatrix::zeros(self.n_rows(), self.n_unknowns());
        let mut y = DVector::zeros(self.n_rows());

        for (row, measurement) in self.dataset.measurements().iter().enumerate() {
            let station_idx = self
                .dataset
                .station_index(&measurement.station_key)
                .ok_or_else(|| unresolved(&measurement.station_key))?;
            let from_idx = self
                .dataset
                .point_index(&self.dataset.stations()[station_idx].point_id)
                .ok_or_else(|| unresolved(&self.dataset.stations()[station_idx].point_id))?;
            let to_idx = self
                .dataset
                .point_index(&measurement.target_id)
                .ok_or_else(|| unresolved(&measurement.target_id))?;

            let linearization = linearize(
                measurement.kind,
                self.coordinates[from_idx],
                self.coordinates[to_idx],
                self.orientations[station_idx],
            )
            .map_err(|err| {
                SurveyNetError::InvalidInput(format!("{}: {err}", measurement.label()))
            })?;

            y[row] = linearization.misclosure(measurement.kind, measurement.value);
            for axis in Axis::ALL {
                if let Some(column) = self.indexer.coordinate_index(from_idx, axis) {
                    x[(row, column)] += linearization.from_partials[axis.index()];
                }
                if let Some(column) = self.indexer.coordinate_index(to_idx, axis) {
                    x[(row, column)] += linearization.to_partials[axis.index()];
                }
            }
            if let Some(column) = self.indexer.orientation_index(station_idx) {
                x[(row, column)] += linearization.orientation_partial;
            }
        }

        let offset = self.n_observations();
        for (k, tie) in self.ties.iter().enumerate() {
            let axis = tie.axis.index();
            let initial = self.initial_coordinates[tie.point][axis].unwrap_or(0.0);
            let current = self.coordinates[tie.point][axis].unwrap_or(0.0);
            x[(offset + k, tie.column)] = 1.0;
            y[offset + k] = initial - current;
        }

        self.x = x;
        self.y = y;
        Ok(())
    }

    /// Reweight observations from their normalized residuals.
    ///
    /// A no-op for methods without reweighting.
    pub fn update_w_matrix(&mut self, normalized_residuals: &[f64]) -> SurveyNetResult<()> {
        if !self.obs_method.is_robust() {
            return Ok(());
        }
        if normalized_residuals.len() != self.n_observations() {
            return Err(SurveyNetError::InvalidInput(format!(
                "expected {} normalized residuals, got {}",
                self.n_observations(),
                normalized_residuals.len()
            )));
        }
        for (coefficient, v) in self
            .weight_coefficients
            .iter_mut()
            .zip(normalized_residuals)
        {
            *coefficient = self.obs_method.weight(*v);
        }
        Ok(())
    }

    /// Reweight tie points from the normalized coordinate increments of the
    /// previous iteration (one per coordinate column).
    ///
    /// A no-op without tie rows or for a non-robust free adjustment method.
    pub fn update_sw_matrix(&mut self, normalized_increments: &[f64]) -> SurveyNetResult<()> {
        let Some(free) = self.free.as_ref().filter(|free| free.method.is_robust()) else {
            return Ok(());
        };
        if normalized_increments.len() != self.indexer.coordinate_count() {
            return Err(SurveyNetError::InvalidInput(format!(
                "expected {} normalized coordinate increments, got {}",
                self.indexer.coordinate_count(),
                normalized_increments.len()
            )));
        }
        for (coefficient, tie) in self.tie_coefficients.iter_mut().zip(&self.ties) {
            *coefficient = free.method.weight(normalized_increments[tie.column]);
        }
        Ok(())
    }

    /// Robust coefficients of the tie rows with their coordinate column.
    pub fn tie_coefficients(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.ties
            .iter()
            .zip(self.tie_coefficients.iter())
            .map(|(tie, coefficient)| (tie.column, *coefficient))
    }

    /// Add increments to the approximate coordinates and orientations.
    pub fn apply_increments(&mut self, increments: &DVector<f64>) -> SurveyNetResult<()> {
        if increments.len() != self.n_unknowns() {
            return Err(SurveyNetError::InvalidInput(format!(
                "expected {} increments, got {}",
                self.n_unknowns(),
                increments.len()
            )));
        }
        for unknown in self.indexer.coordinate_unknowns() {
            let value = &mut self.coordinates[unknown.point][unknown.axis.index()];
            *value = value.map(|v| v + increments[unknown.column]);
        }
        for (station, orientation) in self.orientations.iter_mut().enumerate() {
            if let Some(column) = self.indexer.orientation_index(station) {
                *orientation = orientation.map(|o| normalize_angle(o + increments[column]));
            }
        }
        Ok(())
    }

    /// Current minus initial value of every coordinate unknown, in column order.
    pub fn coordinate_corrections(&self) -> DVector<f64> {
        let mut corrections = DVector::zeros(self.indexer.coordinate_count());
        for unknown in self.indexer.coordinate_unknowns() {
            let axis = unknown.axis.index();
            corrections[unknown.column] = self.coordinates[unknown.point][axis].unwrap_or(0.0)
                - self.initial_coordinates[unknown.point][axis].unwrap_or(0.0);
        }
        corrections
    }

    /// Diagonal of the stacked weight matrix `[W; sW]`.
    pub fn weights(&self) -> DVector<f64> {
        let observations = self.observation_weights();
        let ties = self.tie_weights();
        DVector::from_iterator(
            self.n_rows(),
            observations.iter().chain(ties.iter()).copied(),
        )
    }

    /// Diagonal of W.
    pub fn observation_weights(&self) -> DVector<f64> {
        self.base_weights.component_mul(&self.weight_coefficients)
    }

    fn tie_weights(&self) -> DVector<f64> {
        self.tie_base_weights.component_mul(&self.tie_coefficients)
    }

    /// Point weights per coordinate column (zero for non-tie columns); `None` without sW.
    pub fn point_weights(&self) -> Option<DVector<f64>> {
        if self.ties.is_empty() {
            return None;
        }
        let mut weights = DVector::zeros(self.indexer.coordinate_count());
        for (tie, weight) in self.ties.iter().zip(self.tie_weights().iter()) {
            weights[tie.column] = *weight;
        }
        Some(weights)
    }

    /// Robust coefficients currently applied to the observation weights.
    pub fn weight_coefficients(&self) -> &DVector<f64> {
        &self.weight_coefficients
    }

    /// Number of movable tie point components.
    ///
    /// Without point weights every coordinate unknown counts; otherwise the
    /// components with a positive point weight.
    pub fn movable_tie_points(&self) -> usize {
        match self.point_weights() {
            None => self.indexer.coordinate_count(),
            Some(weights) => weights.iter().filter(|w| **w > 0.0).count(),
        }
    }

    /// Finite coordinate components that are not movable tie points.
    pub fn fixed_tie_points(&self) -> usize {
        let finite = self
            .coordinates
            .iter()
            .flat_map(|c| c.iter())
            .filter(|c| c.is_some_and(f64::is_finite))
            .count();
        finite.saturating_sub(self.movable_tie_points())
    }

    /// Constraints that fix the datum of a free adjustment.
    pub fn inner_constraints(&self) -> Vec<String> {
        match &self.free {
            Some(free) if free.is_ordinary() => vec!["pseudoinverse".to_string()],
            Some(_) => self
                .ties
                .iter()
                .map(|tie| {
                    format!(
                        "tie point {} ({})",
                        self.dataset.controls()[tie.point].id,
                        tie.axis
                    )
                })
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn requires_pseudoinverse(&self) -> bool {
        self.free.as_ref().is_some_and(FreeAdjustment::is_ordinary)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn indexer(&self) -> &UnknownIndexer {
        &self.indexer
    }

    pub fn x(&self) -> &DMatrix<f64> {
        &self.x
    }

    pub fn y(&self) -> &DVector<f64> {
        &self.y
    }

    pub fn obs_method(&self) -> &MethodConfig {
        &self.obs_method
    }

    pub fn obs_method_mut(&mut self) -> &mut MethodConfig {
        &mut self.obs_method
    }

    pub fn free_adjustment(&self) -> Option<&FreeAdjustment> {
        self.free.as_ref()
    }

    pub fn free_method_mut(&mut self) -> Option<&mut MethodConfig> {
        self.free.as_mut().map(|free| &mut free.method)
    }

    pub fn coordinates(&self) -> &[[Option<f64>; 3]] {
        &self.coordinates
    }

    pub fn initial_coordinates(&self) -> &[[Option<f64>; 3]] {
        &self.initial_coordinates
    }

    pub fn orientations(&self) -> &[Option<f64>] {
        &self.orientations
    }

    pub fn initial_orientations(&self) -> &[Option<f64>] {
        &self.initial_orientations
    }

    pub fn n_observations(&self) -> usize {
        self.base_weights.len()
    }

    pub fn n_rows(&self) -> usize {
        self.n_observations() + self.ties.len()
    }

    pub fn n_unknowns(&self) -> usize {
        self.indexer.len()
    }

    /// `rows(X) − columns(X)`, non-negative by construction.
    pub fn degrees_of_freedom(&self) -> usize {
        self.n_rows() - self.n_unknowns()
    }
}

fn unresolved(id: &str) -> SurveyNetError {
    SurveyNetError::InvalidInput(format!("unresolved reference '{id}'"))
}

fn select_ties(
    dataset: &Dataset,
    indexer: &UnknownIndexer,
    selection: &TiePointSelection,
    sigma_profile: &SigmaProfile,
) -> SurveyNetResult<Vec<TieComponent>> {
    let component = |point: usize, axis: Axis, column: usize| {
        let sigma = dataset.controls()[point]
            .sigma(axis)
            .filter(|s| *s > 0.0)
            .unwrap_or(sigma_profile.coordinate);
        TieComponent {
            point,
            axis,
            column,
            sigma,
        }
    };

    let ties: Vec<TieComponent> = match selection {
        TiePointSelection::All => indexer
            .coordinate_unknowns()
            .map(|u| component(u.point, u.axis, u.column))
            .collect(),
        TiePointSelection::Sigma => {
            let with_sigma: Vec<TieComponent> = indexer
                .coordinate_unknowns()
                .filter(|u| {
                    dataset.controls()[u.point]
                        .sigma(u.axis)
                        .is_some_and(|s| s > 0.0)
                })
                .map(|u| component(u.point, u.axis, u.column))
                .collect();
            if with_sigma.is_empty() {
                indexer
                    .coordinate_unknowns()
                    .map(|u| component(u.point, u.axis, u.column))
                    .collect()
            } else {
                with_sigma
            }
        }
        TiePointSelection::Points(ids) => {
            let mut points = Vec::with_capacity(ids.len());
            for id in ids {
                points.push(dataset.point_index(id).ok_or_else(|| {
                    SurveyNetError::InvalidInput(format!("unknown tie point '{id}'"))
                })?);
            }
            indexer
                .coordinate_unknowns()
                .filter(|u| points.contains(&u.point))
                .map(|u| component(u.point, u.axis, u.column))
                .collect()
        }
    };
    Ok(ties)
}
