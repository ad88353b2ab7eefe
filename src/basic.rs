//! Basic surveying functions: angle unit conversion and azimuths.
//!
//! All angles inside the engine are radians. Azimuths follow the surveying
//! convention: measured clockwise from the X (north) axis towards the Y (east) axis.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

use crate::error::{SurveyNetError, SurveyNetResult};

/// Full circle in radians.
pub const TWO_PI: f64 = 2.0 * PI;

/// Supported angle units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    #[default]
    Rad,
    Deg,
    /// Gradians (gon), 400 per full circle
    Grad,
}

impl AngleUnit {
    /// Conversion constant rho: value in this unit per radian.
    pub fn rho(self) -> f64 {
        match self {
            AngleUnit::Rad => 1.0,
            AngleUnit::Deg => 180.0 / PI,
            AngleUnit::Grad => 200.0 / PI,
        }
    }

    /// Parse a unit name; "gon" is accepted as an alias of "grad".
    pub fn from_name(name: &str) -> SurveyNetResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rad" => Ok(AngleUnit::Rad),
            "deg" => Ok(AngleUnit::Deg),
            "grad" | "gon" => Ok(AngleUnit::Grad),
            other => Err(SurveyNetError::InvalidInput(format!(
                "unsupported angle unit '{other}'"
            ))),
        }
    }
}

impl fmt::Display for AngleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AngleUnit::Rad => write!(f, "rad"),
            AngleUnit::Deg => write!(f, "deg"),
            AngleUnit::Grad => write!(f, "grad"),
        }
    }
}

/// Convert an angle from `unit` to radians.
pub fn to_rad(angle: f64, unit: AngleUnit) -> f64 {
    angle / unit.rho()
}

/// Convert an angle in radians to `unit`.
pub fn from_rad(angle: f64, unit: AngleUnit) -> f64 {
    angle * unit.rho()
}

/// Azimuth in radians from the first point to the second, in `[0, 2π)`.
///
/// Returns NaN when the points coincide.
pub fn azimuth(x_first: f64, y_first: f64, x_second: f64, y_second: f64) -> f64 {
    let dx = x_second - x_first;
    let dy = y_second - y_first;
    if dx == 0.0 && dy == 0.0 {
        return f64::NAN;
    }
    normalize_angle(dy.atan2(dx))
}

/// Map an angle into `[0, 2π)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TWO_PI);
    // rem_euclid may round up to exactly 2π for tiny negative inputs
    if wrapped >= TWO_PI { 0.0 } else { wrapped }
}

/// Map an angle difference into `(-π, π]`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = normalize_angle(angle);
    if wrapped > PI { wrapped - TWO_PI } else { wrapped }
}
