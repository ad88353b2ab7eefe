//! Named configuration profiles for the solver and for default sigmas.
//!
//! Profiles are plain `serde` types so a host application can load them from
//! whatever settings store it owns and register them in a [`ConfigRegistry`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{SurveyNetError, SurveyNetResult};

/// Name of the profile used when none is requested.
pub const DEFAULT_PROFILE: &str = "default";

/// Convergence policy of the iterative solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverProfile {
    /// Profile name used for lookup
    pub name: String,
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Upper bound on every coordinate increment magnitude for convergence
    pub threshold: f64,
}

impl Default for SolverProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            max_iterations: 10,
            threshold: 1e-4,
        }
    }
}

impl SolverProfile {
    /// Create a new profile with default values and the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    fn validate(&self) -> SurveyNetResult<()> {
        if self.max_iterations == 0 {
            return Err(SurveyNetError::InvalidInput(format!(
                "solver profile '{}' needs at least one iteration",
                self.name
            )));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(SurveyNetError::InvalidInput(format!(
                "solver profile '{}' needs a positive finite threshold",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for SolverProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SolverProfile {{ name: {}, max_iterations: {}, threshold: {:e} }}",
            self.name, self.max_iterations, self.threshold
        )
    }
}

/// A priori standard deviations used where the dataset carries none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SigmaProfile {
    /// Profile name used for lookup
    pub name: String,
    /// Distances, height and coordinate differences (length units)
    pub linear: f64,
    /// Azimuths, directions and zenith angles (radians)
    pub angular: f64,
    /// Control point coordinates in free adjustment (length units)
    pub coordinate: f64,
}

impl Default for SigmaProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_PROFILE.to_string(),
            linear: 0.01,
            angular: 1.0e-4,
            coordinate: 0.01,
        }
    }
}

impl SigmaProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_linear(mut self, sigma: f64) -> Self {
        self.linear = sigma;
        self
    }

    pub fn with_angular(mut self, sigma: f64) -> Self {
        self.angular = sigma;
        self
    }

    pub fn with_coordinate(mut self, sigma: f64) -> Self {
        self.coordinate = sigma;
        self
    }

    fn validate(&self) -> SurveyNetResult<()> {
        for (label, value) in [
            ("linear", self.linear),
            ("angular", self.angular),
            ("coordinate", self.coordinate),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SurveyNetError::InvalidInput(format!(
                    "sigma profile '{}' has non-positive {label} sigma",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Registry of named solver and sigma profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRegistry {
    solver_profiles: BTreeMap<String, SolverProfile>,
    sigma_profiles: BTreeMap<String, SigmaProfile>,
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        let solver_profiles = [
            SolverProfile::default(),
            SolverProfile::new("precise")
                .with_max_iterations(50)
                .with_threshold(1e-6),
            SolverProfile::new("coarse")
                .with_max_iterations(5)
                .with_threshold(1e-3),
        ];
        let sigma_profiles = [
            SigmaProfile::default(),
            SigmaProfile::new("total_station")
                .with_linear(0.002)
                .with_angular(1.5e-5)
                .with_coordinate(0.005),
            SigmaProfile::new("gnss")
                .with_linear(0.01)
                .with_angular(5.0e-5)
                .with_coordinate(0.02),
        ];
        Self {
            solver_profiles: solver_profiles
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
            sigma_profiles: sigma_profiles
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect(),
        }
    }
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a solver profile
    pub fn with_solver_profile(mut self, profile: SolverProfile) -> SurveyNetResult<Self> {
        profile.validate()?;
        self.solver_profiles.insert(profile.name.clone(), profile);
        Ok(self)
    }

    /// Register (or replace) a sigma profile
    pub fn with_sigma_profile(mut self, profile: SigmaProfile) -> SurveyNetResult<Self> {
        profile.validate()?;
        self.sigma_profiles.insert(profile.name.clone(), profile);
        Ok(self)
    }

    /// Look up a solver profile; `None` selects the default profile.
    pub fn solver_profile(&self, name: Option<&str>) -> SurveyNetResult<&SolverProfile> {
        let name = name.unwrap_or(DEFAULT_PROFILE);
        self.solver_profiles
            .get(name)
            .ok_or_else(|| SurveyNetError::UnknownProfile {
                kind: "solver",
                name: name.to_string(),
            })
    }

    /// Look up a sigma profile; `None` selects the default profile.
    pub fn sigma_profile(&self, name: Option<&str>) -> SurveyNetResult<&SigmaProfile> {
        let name = name.unwrap_or(DEFAULT_PROFILE);
        self.sigma_profiles
            .get(name)
            .ok_or_else(|| SurveyNetError::UnknownProfile {
                kind: "sigma",
                name: name.to_string(),
            })
    }

    pub fn solver_profile_names(&self) -> impl Iterator<Item = &str> {
        self.solver_profiles.keys().map(String::as_str)
    }
}
