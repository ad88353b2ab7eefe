//! Entry point of an adjustment run.
//!
//! ```
//! use surveynet::{Adjustment, AdjustmentOptions};
//! use surveynet::data::{ControlPoint, DatasetBuilder, ObservationKind};
//!
//! let dataset = DatasetBuilder::new()
//!     .control(ControlPoint::new("A").with_coordinate(surveynet::data::Axis::Z, 100.0).fixed())
//!     .control(ControlPoint::new("P").with_coordinate(surveynet::data::Axis::Z, 101.0))
//!     .station("SA", "A")
//!     .observe("SA", "P", ObservationKind::Vd, 1.25, Some(0.002))
//!     .observe("SA", "P", ObservationKind::Vd, 1.27, Some(0.002))
//!     .build()
//!     .unwrap();
//!
//! let mut adjustment = Adjustment::new(dataset, AdjustmentOptions::new("weighted")).unwrap();
//! let status = adjustment.adjust().unwrap();
//! assert!(status.is_success());
//! let results = adjustment.results();
//! assert_eq!(results.summary.calculation_status, "Calculations succeed");
//! ```

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ConfigRegistry;
use crate::core::{FreeAdjustment, MatrixBuilder, MethodConfig, TiePointSelection};
use crate::data::Dataset;
use crate::error::SurveyNetResult;
use crate::linalg::DenseSolver;
use crate::optimizer::{Solver, SolverStatus};
use crate::results::{Results, ResultsBundle};

/// Configuration of one adjustment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentOptions {
    /// Observation weighting method, by name or label
    pub obs_method: String,
    /// Tuning constant overrides of the observation method
    pub obs_constants: Vec<(String, f64)>,
    /// Free adjustment weighting method; `None` for a constrained adjustment
    pub free_adjustment: Option<String>,
    /// Tuning constant overrides of the free adjustment method
    pub free_constants: Vec<(String, f64)>,
    pub tie_points: TiePointSelection,
    /// Sigma profile name; `None` selects the default profile
    pub sigma_profile: Option<String>,
    /// Solver profile name; `None` selects the default profile
    pub solver_profile: Option<String>,
    /// Record residual and coordinate correction variances per iteration
    pub create_list_of_variances: bool,
}

impl Default for AdjustmentOptions {
    fn default() -> Self {
        Self::new("weighted")
    }
}

impl AdjustmentOptions {
    pub fn new(obs_method: impl Into<String>) -> Self {
        Self {
            obs_method: obs_method.into(),
            obs_constants: Vec::new(),
            free_adjustment: None,
            free_constants: Vec::new(),
            tie_points: TiePointSelection::default(),
            sigma_profile: None,
            solver_profile: None,
            create_list_of_variances: false,
        }
    }

    pub fn with_obs_constant(mut self, name: impl Into<String>, value: f64) -> Self {
        self.obs_constants.push((name.into(), value));
        self
    }

    pub fn with_free_adjustment(mut self, method: impl Into<String>) -> Self {
        self.free_adjustment = Some(method.into());
        self
    }

    pub fn with_free_constant(mut self, name: impl Into<String>, value: f64) -> Self {
        self.free_constants.push((name.into(), value));
        self
    }

    pub fn with_tie_points(mut self, tie_points: TiePointSelection) -> Self {
        self.tie_points = tie_points;
        self
    }

    pub fn with_sigma_profile(mut self, name: impl Into<String>) -> Self {
        self.sigma_profile = Some(name.into());
        self
    }

    pub fn with_solver_profile(mut self, name: impl Into<String>) -> Self {
        self.solver_profile = Some(name.into());
        self
    }

    pub fn with_list_of_variances(mut self, enabled: bool) -> Self {
        self.create_list_of_variances = enabled;
        self
    }
}

/// A configured adjustment: solver plus cached results.
#[derive(Debug, Clone)]
pub struct Adjustment {
    solver: Solver,
    results: Results,
}

impl Adjustment {
    /// Prepare an adjustment with the built-in configuration profiles.
    pub fn new(dataset: Dataset, options: AdjustmentOptions) -> SurveyNetResult<Self> {
        Self::with_registry(dataset, options, &ConfigRegistry::default())
    }

    /// Prepare an adjustment resolving profiles from `registry`.
    ///
    /// Nothing is iterated until [`Adjustment::adjust`] is called.
    ///
    /// # Errors
    /// Unknown methods, tuning constants or profiles, and datasets with
    /// negative degrees of freedom.
    pub fn with_registry(
        dataset: Dataset,
        options: AdjustmentOptions,
        registry: &ConfigRegistry,
    ) -> SurveyNetResult<Self> {
        let obs_method = MethodConfig::from_name(&options.obs_method, &options.obs_constants)?;
        let free = options
            .free_adjustment
            .as_deref()
            .map(|name| {
                MethodConfig::from_name(name, &options.free_constants).map(|method| {
                    FreeAdjustment::new(method).with_tie_points(options.tie_points.clone())
                })
            })
            .transpose()?;
        let sigma_profile = registry.sigma_profile(options.sigma_profile.as_deref())?;
        let solver_profile = registry.solver_profile(options.solver_profile.as_deref())?;

        let builder = MatrixBuilder::new(dataset, obs_method, free, sigma_profile)?;
        info!(
            "Adjustment prepared: method {}, {} observations, {} unknowns, profile '{}'",
            builder.obs_method(),
            builder.n_observations(),
            builder.n_unknowns(),
            solver_profile.name
        );
        let solver = Solver::new(builder, solver_profile.clone())
            .with_variance_history(options.create_list_of_variances);
        Ok(Self {
            solver,
            results: Results::new(),
        })
    }

    /// Replace the normal equation solver.
    pub fn with_linear_solver(self, linear_solver: DenseSolver) -> Self {
        Self {
            solver: self.solver.with_linear_solver(linear_solver),
            results: self.results,
        }
    }

    /// Run the solve loop.
    pub fn adjust(&mut self) -> SurveyNetResult<SolverStatus> {
        self.solver.solve()
    }

    /// Derived statistics of the current solver state.
    pub fn results(&mut self) -> &ResultsBundle {
        self.results.bundle(&self.solver)
    }

    pub fn solver(&self) -> &Solver {
        &self.solver
    }

    /// Mutable access for step-wise iteration with [`Solver::iterate`].
    pub fn solver_mut(&mut self) -> &mut Solver {
        &mut self.solver
    }

    pub fn is_success(&self) -> bool {
        self.solver.is_success()
    }
}
