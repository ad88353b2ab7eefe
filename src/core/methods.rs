//! Weighting method table and per-run method configuration.
//!
//! Method names resolve through a table built once on first use. Each entry
//! carries the user-facing label, the named tuning constants with their
//! defaults and the weight function.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use super::weighting::{self, WeightFn};
use crate::error::{SurveyNetError, SurveyNetResult};

/// Supported observation and free-adjustment weighting methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingMethod {
    /// Unit weights, no reweighting
    Ordinary,
    /// Inverse-variance weights, no reweighting
    Weighted,
    Huber,
    Slope,
    Hampel,
    Danish,
    Epanechnikov,
    Tukey,
    Jacobi,
    Exponential,
    Cra,
    ErrorFunc,
    Cauchy,
    T,
    Bell,
    Chain,
    Andrews,
    Wave,
    HalfWave,
    Wigner,
    EllipseCurve,
    Trim,
}

/// One row of the method table.
#[derive(Debug)]
pub struct MethodSpec {
    pub method: WeightingMethod,
    /// Name used in configuration, e.g. `"error_func"`
    pub name: &'static str,
    /// Label shown to users, e.g. `"Error Function"`
    pub label: &'static str,
    /// Tuning constants `(name, default)` in argument order
    pub constants: &'static [(&'static str, f64)],
    /// `None` for methods without reweighting
    pub weight: Option<WeightFn>,
}

macro_rules! spec {
    ($method:ident, $name:literal, $label:literal) => {
        MethodSpec {
            method: WeightingMethod::$method,
            name: $name,
            label: $label,
            constants: &[],
            weight: None,
        }
    };
    ($method:ident, $name:literal, $label:literal, $func:path, [$(($c:literal, $v:expr)),+]) => {
        MethodSpec {
            method: WeightingMethod::$method,
            name: $name,
            label: $label,
            constants: &[$(($c, $v)),+],
            weight: Some($func),
        }
    };
}

static METHOD_TABLE: LazyLock<Vec<MethodSpec>> = LazyLock::new(|| {
    vec![
        spec!(Ordinary, "ordinary", "Ordinary"),
        spec!(Weighted, "weighted", "Weighted"),
        spec!(Huber, "huber", "Huber", weighting::huber, [("c", 1.345)]),
        spec!(Slope, "slope", "Slope", weighting::slope, [("c", 2.0), ("a", 2.0)]),
        spec!(
            Hampel,
            "hampel",
            "Hampel",
            weighting::hampel,
            [("a", 1.7), ("b", 3.4), ("c", 8.5)]
        ),
        spec!(Danish, "danish", "Danish", weighting::danish, [("c", 2.5)]),
        spec!(
            Epanechnikov,
            "epanechnikov",
            "Epanechnikov",
            weighting::epanechnikov,
            [("c", 3.674), ("k", 2.0)]
        ),
        spec!(Tukey, "tukey", "Tukey", weighting::tukey, [("c", 4.685), ("k", 2.0)]),
        spec!(Jacobi, "jacobi", "Jacobi", weighting::jacobi, [("c", 4.687), ("k", 1.0)]),
        spec!(
            Exponential,
            "exponential",
            "Exponential",
            weighting::exponential,
            [("c", 2.0), ("k", 2.0)]
        ),
        spec!(
            Cra,
            "cra",
            "Choice Rule of Alternative",
            weighting::cra,
            [("c", 2.0), ("k", 2.0)]
        ),
        spec!(
            ErrorFunc,
            "error_func",
            "Error Function",
            weighting::error_func,
            [("c", 1.414), ("k", 2.0)]
        ),
        spec!(Cauchy, "cauchy", "Cauchy", weighting::cauchy, [("c", 2.385), ("k", 2.0)]),
        spec!(T, "t", "T distribution", weighting::t, [("c", 1.0), ("k", 2.0)]),
        spec!(Bell, "bell", "Bell Curve", weighting::bell, [("c", 1.0), ("k", 1.0)]),
        spec!(Chain, "chain", "Chain Curve", weighting::chain, [("c", 1.0)]),
        spec!(Andrews, "andrews", "Andrews", weighting::andrews, [("c", 4.207)]),
        spec!(Wave, "wave", "Wave", weighting::wave, [("c", 2.5)]),
        spec!(HalfWave, "half_wave", "Half-wave", weighting::half_wave, [("c", 2.5)]),
        spec!(Wigner, "wigner", "Wigner", weighting::wigner, [("c", 3.137)]),
        spec!(
            EllipseCurve,
            "ellipse_curve",
            "Ellipse Curve",
            weighting::ellipse_curve,
            [("c", 2.5)]
        ),
        spec!(Trim, "trim", "Trim", weighting::trim, [("c", 2.5)]),
    ]
});

impl WeightingMethod {
    /// The full method table in declaration order.
    pub fn table() -> &'static [MethodSpec] {
        METHOD_TABLE.as_slice()
    }

    pub fn spec(self) -> &'static MethodSpec {
        // Table rows follow the enum declaration order
        &METHOD_TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    /// Resolve a configuration name (`"huber"`) or a label (`"Huber"`).
    pub fn from_name(name: &str) -> SurveyNetResult<Self> {
        Self::table()
            .iter()
            .find(|spec| spec.name == name || spec.label == name)
            .map(|spec| spec.method)
            .ok_or_else(|| SurveyNetError::UnknownMethod(name.to_string()))
    }

    /// Methods that reweight from residuals every iteration.
    pub fn is_robust(self) -> bool {
        self.spec().weight.is_some()
    }

    /// Methods that start from inverse-variance weights.
    pub fn uses_sigmas(self) -> bool {
        self != WeightingMethod::Ordinary
    }

    /// Methods whose tuning constants follow the residual scale.
    pub fn refreshes_constants(self) -> bool {
        matches!(self, WeightingMethod::T | WeightingMethod::Cra)
    }

    pub fn default_constants(self) -> Vec<f64> {
        self.spec().constants.iter().map(|(_, v)| *v).collect()
    }
}

impl fmt::Display for WeightingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A weighting method with the tuning constants of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodConfig {
    method: WeightingMethod,
    /// Constants as configured; the refresh base for `t` and `cra`
    base_constants: Vec<f64>,
    /// Constants used by the next weight update
    constants: Vec<f64>,
}

impl MethodConfig {
    pub fn new(method: WeightingMethod) -> Self {
        let constants = method.default_constants();
        Self {
            method,
            base_constants: constants.clone(),
            constants,
        }
    }

    /// Resolve `name` and apply tuning constant overrides.
    ///
    /// # Errors
    /// `UnknownMethod` for an unknown name, `UnknownTuningConstant` for an
    /// override the method does not define.
    pub fn from_name(name: &str, overrides: &[(String, f64)]) -> SurveyNetResult<Self> {
        let mut config = Self::new(WeightingMethod::from_name(name)?);
        for (constant, value) in overrides {
            config = config.with_constant(constant, *value)?;
        }
        Ok(config)
    }

    /// Override a single tuning constant.
    pub fn with_constant(mut self, name: &str, value: f64) -> SurveyNetResult<Self> {
        let idx = self
            .method
            .spec()
            .constants
            .iter()
            .position(|(constant, _)| *constant == name)
            .ok_or_else(|| SurveyNetError::UnknownTuningConstant {
                method: self.method.name().to_string(),
                name: name.to_string(),
            })?;
        if !value.is_finite() || value <= 0.0 {
            return Err(SurveyNetError::InvalidInput(format!(
                "tuning constant '{name}' of '{}' must be positive, got {value}",
                self.method.name()
            )));
        }
        self.base_constants[idx] = value;
        self.constants[idx] = value;
        Ok(self)
    }

    pub fn method(&self) -> WeightingMethod {
        self.method
    }

    pub fn constants(&self) -> &[f64] {
        &self.constants
    }

    /// Named view of the current constants.
    pub fn named_constants(&self) -> Vec<(&'static str, f64)> {
        self.method
            .spec()
            .constants
            .iter()
            .zip(&self.constants)
            .map(|((name, _), value)| (*name, *value))
            .collect()
    }

    pub fn is_robust(&self) -> bool {
        self.method.is_robust()
    }

    /// Weight coefficient for a normalized value; 1 for non-robust methods.
    pub fn weight(&self, v: f64) -> f64 {
        match self.method.spec().weight {
            Some(func) => weighting::coefficient(func, v, &self.constants),
            None => 1.0,
        }
    }

    /// Adapt `t` and `cra` constants to the spread of the current normalized values.
    ///
    /// The scale constant becomes `c₀ · 1.4826 · MAD(v)`; for `t` the shape
    /// constant becomes the degrees of freedom (at least 1). Other methods,
    /// or a degenerate spread, leave the constants untouched.
    ///
    /// # Returns
    /// `true` when the constants changed.
    pub fn refresh_constants(&mut self, normalized: &[f64], degrees_of_freedom: usize) -> bool {
        if !self.method.refreshes_constants() {
            return false;
        }
        let Some(scale) = weighting::robust_scale(normalized) else {
            return false;
        };
        let previous = self.constants.clone();
        self.constants[0] = self.base_constants[0] * scale;
        if self.method == WeightingMethod::T {
            self.constants[1] = degrees_of_freedom.max(1) as f64;
        }
        previous != self.constants
    }
}

impl fmt::Display for MethodConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.method.name())?;
        if !self.constants.is_empty() {
            let constants: Vec<String> = self
                .named_constants()
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect();
            write!(f, " ({})", constants.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_order_matches_enum() {
        for (idx, spec) in WeightingMethod::table().iter().enumerate() {
            assert_eq!(spec.method as usize, idx);
            assert_eq!(spec.method.spec().name, spec.name);
        }
        assert_eq!(WeightingMethod::table().len(), 22);
    }

    #[test]
    fn test_lookup_by_name_and_label() {
        assert_eq!(
            WeightingMethod::from_name("cra").unwrap(),
            WeightingMethod::Cra
        );
        assert_eq!(
            WeightingMethod::from_name("Choice Rule of Alternative").unwrap(),
            WeightingMethod::Cra
        );
        assert_eq!(
            WeightingMethod::from_name("nope"),
            Err(SurveyNetError::UnknownMethod("nope".to_string()))
        );
    }

    #[test]
    fn test_default_constants() {
        assert_eq!(WeightingMethod::Huber.default_constants(), vec![1.345]);
        assert_eq!(WeightingMethod::Tukey.default_constants(), vec![4.685, 2.0]);
        assert_eq!(
            WeightingMethod::Hampel.default_constants(),
            vec![1.7, 3.4, 8.5]
        );
        assert!(WeightingMethod::Ordinary.default_constants().is_empty());
        assert!(WeightingMethod::Weighted.default_constants().is_empty());
    }

    #[test]
    fn test_constant_override() {
        let config = MethodConfig::from_name("tukey", &[("k".to_string(), 3.0)]).unwrap();
        assert_eq!(config.constants(), &[4.685, 3.0]);

        let err = MethodConfig::from_name("huber", &[("k".to_string(), 3.0)]).unwrap_err();
        assert!(matches!(err, SurveyNetError::UnknownTuningConstant { .. }));
    }

    #[test]
    fn test_non_robust_weight_is_one() {
        let config = MethodConfig::new(WeightingMethod::Weighted);
        assert!(!config.is_robust());
        assert_eq!(config.weight(100.0), 1.0);
    }

    #[test]
    fn test_monotone_beyond_first_constant() {
        for spec in WeightingMethod::table()
            .iter()
            .filter(|spec| spec.weight.is_some())
        {
            let config = MethodConfig::new(spec.method);
            let start = config.constants()[0];
            let mut previous = config.weight(start);
            for step in 1..400 {
                let v = start + 0.05 * step as f64;
                let current = config.weight(v);
                assert!(
                    current <= previous + 1e-12,
                    "{} increased at {v}: {previous} -> {current}",
                    spec.name
                );
                previous = current;
            }
            assert_eq!(config.weight(f64::INFINITY), 0.0);
            assert_eq!(config.weight(f64::NEG_INFINITY), 0.0);
        }
    }

    #[test]
    fn test_refresh_t_constants() {
        let mut config = MethodConfig::new(WeightingMethod::T);
        let normalized = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert!(config.refresh_constants(&normalized, 7));
        assert_relative_eq!(config.constants()[0], 1.4826);
        assert_eq!(config.constants()[1], 7.0);

        // Refresh starts from the configured base, not the refreshed value
        assert!(!config.refresh_constants(&normalized, 7));
        assert_relative_eq!(config.constants()[0], 1.4826);
    }

    #[test]
    fn test_refresh_ignored_for_fixed_methods() {
        let mut config = MethodConfig::new(WeightingMethod::Huber);
        assert!(!config.refresh_constants(&[1.0, 5.0, 9.0], 3));
        assert_eq!(config.constants(), &[1.345]);
    }

    #[test]
    fn test_display() {
        let config = MethodConfig::new(WeightingMethod::Tukey);
        assert_eq!(config.to_string(), "tukey (c=4.685, k=2)");
    }
}
