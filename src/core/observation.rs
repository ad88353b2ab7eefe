//! Observation equations and their partial derivatives.
//!
//! Each observation kind is a function of the station and target coordinates
//! (and, for directions, of the station orientation). Linearizing it at the
//! current approximations gives one row of the design matrix.

use crate::basic::{normalize_angle, wrap_angle};
use crate::data::ObservationKind;
use crate::error::{SurveyNetError, SurveyNetResult};

/// Value and gradient of one observation equation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Linearization {
    /// Observation computed from the approximations
    pub computed: f64,
    /// Partial derivatives with respect to station x, y, z
    pub from_partials: [f64; 3],
    /// Partial derivatives with respect to target x, y, z
    pub to_partials: [f64; 3],
    /// Partial derivative with respect to the station orientation
    pub orientation_partial: f64,
}

impl Linearization {
    /// Antisymmetric gradient: target partials are `g`, station partials `-g`.
    fn difference(computed: f64, gradient: [f64; 3]) -> Self {
        Self {
            computed,
            from_partials: gradient.map(|g| -g),
            to_partials: gradient,
            orientation_partial: 0.0,
        }
    }

    /// Observed minus computed, wrapped for angular kinds.
    pub fn misclosure(&self, kind: ObservationKind, observed: f64) -> f64 {
        let difference = observed - self.computed;
        if kind.is_angular() {
            wrap_angle(difference)
        } else {
            difference
        }
    }
}

/// Linearize an observation at the current approximations.
///
/// Missing coordinate components are read as 0; the dataset guarantees the
/// kind only touches axes the network carries.
///
/// # Arguments
/// * `kind` - Observation kind
/// * `from` - Station point coordinates
/// * `to` - Target point coordinates
/// * `orientation` - Station orientation, required for directions
///
/// # Errors
/// `InvalidInput` when the geometry is degenerate (coincident points) or a
/// direction lacks an orientation.
pub fn linearize(
    kind: ObservationKind,
    from: [Option<f64>; 3],
    to: [Option<f64>; 3],
    orientation: Option<f64>,
) -> SurveyNetResult<Linearization> {
    let dx = to[0].unwrap_or(0.0) - from[0].unwrap_or(0.0);
    let dy = to[1].unwrap_or(0.0) - from[1].unwrap_or(0.0);
    let dz = to[2].unwrap_or(0.0) - from[2].unwrap_or(0.0);
    let horizontal = dx.hypot(dy);
    let slope = horizontal.hypot(dz);

    let degenerate = || {
        SurveyNetError::InvalidInput(format!(
            "{kind} observation between coincident points"
        ))
    };

    let linearization = match kind {
        ObservationKind::Dx => Linearization::difference(dx, [1.0, 0.0, 0.0]),
        ObservationKind::Dy => Linearization::difference(dy, [0.0, 1.0, 0.0]),
        ObservationKind::Dz | ObservationKind::Vd => {
            Linearization::difference(dz, [0.0, 0.0, 1.0])
        }
        ObservationKind::Hd => {
            if horizontal == 0.0 {
                return Err(degenerate());
            }
            Linearization::difference(horizontal, [dx / horizontal, dy / horizontal, 0.0])
        }
        ObservationKind::Sd => {
            if slope == 0.0 {
                return Err(degenerate());
            }
            Linearization::difference(slope, [dx / slope, dy / slope, dz / slope])
        }
        ObservationKind::A | ObservationKind::Hz => {
            if horizontal == 0.0 {
                return Err(degenerate());
            }
            let h2 = horizontal * horizontal;
            let azimuth = normalize_angle(dy.atan2(dx));
            let mut linearization = Linearization::difference(azimuth, [-dy / h2, dx / h2, 0.0]);
            if kind == ObservationKind::Hz {
                let orientation = orientation.ok_or_else(|| {
                    SurveyNetError::InvalidInput(
                        "direction observed from a station without orientation".to_string(),
                    )
                })?;
                linearization.computed = normalize_angle(azimuth - orientation);
                linearization.orientation_partial = -1.0;
            }
            linearization
        }
        ObservationKind::Vz => {
            if horizontal == 0.0 || slope == 0.0 {
                return Err(degenerate());
            }
            let s2 = slope * slope;
            let zenith = horizontal.atan2(dz);
            let lateral = dz / (horizontal * s2);
            Linearization::difference(zenith, [dx * lateral, dy * lateral, -horizontal / s2])
        }
    };
    Ok(linearization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    fn point(x: f64, y: f64, z: f64) -> [Option<f64>; 3] {
        [Some(x), Some(y), Some(z)]
    }

    /// Compare analytic partials against central differences on the target point.
    fn check_target_partials(kind: ObservationKind, from: [Option<f64>; 3], to: [Option<f64>; 3]) {
        let base = linearize(kind, from, to, Some(0.3)).unwrap();
        let h = 1e-6;
        for axis in 0..3 {
            let mut plus = to;
            let mut minus = to;
            plus[axis] = plus[axis].map(|v| v + h);
            minus[axis] = minus[axis].map(|v| v - h);
            let f_plus = linearize(kind, from, plus, Some(0.3)).unwrap().computed;
            let f_minus = linearize(kind, from, minus, Some(0.3)).unwrap().computed;
            let numeric = wrap_angle(f_plus - f_minus) / (2.0 * h);
            assert_relative_eq!(base.to_partials[axis], numeric, epsilon = 1e-6);
            assert_relative_eq!(base.from_partials[axis], -numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_distance_partials() {
        let from = point(0.0, 0.0, 0.0);
        let to = point(30.0, 40.0, 12.0);
        let hd = linearize(ObservationKind::Hd, from, to, None).unwrap();
        assert_relative_eq!(hd.computed, 50.0);
        check_target_partials(ObservationKind::Hd, from, to);
        check_target_partials(ObservationKind::Sd, from, to);
    }

    #[test]
    fn test_angle_partials() {
        let from = point(1.0, 2.0, 3.0);
        let to = point(-20.0, 15.0, 8.0);
        check_target_partials(ObservationKind::A, from, to);
        check_target_partials(ObservationKind::Hz, from, to);
        check_target_partials(ObservationKind::Vz, from, to);
    }

    #[test]
    fn test_direction_orientation() {
        let from = point(0.0, 0.0, 0.0);
        let to = point(0.0, 10.0, 0.0);
        let hz = linearize(ObservationKind::Hz, from, to, Some(PI / 4.0)).unwrap();
        assert_relative_eq!(hz.computed, PI / 4.0, epsilon = 1e-12);
        assert_eq!(hz.orientation_partial, -1.0);
    }

    #[test]
    fn test_zenith_angle_horizontal_sight() {
        let vz = linearize(
            ObservationKind::Vz,
            point(0.0, 0.0, 0.0),
            point(10.0, 0.0, 0.0),
            None,
        )
        .unwrap();
        assert_relative_eq!(vz.computed, PI / 2.0);
    }

    #[test]
    fn test_misclosure_wraps_angles() {
        let azimuth = linearize(
            ObservationKind::A,
            point(0.0, 0.0, 0.0),
            point(10.0, -0.001, 0.0),
            None,
        )
        .unwrap();
        // computed is just below 2π, observed 0.0
        let misclosure = azimuth.misclosure(ObservationKind::A, 0.0);
        assert!(misclosure > 0.0 && misclosure < 1e-3);
    }

    #[test]
    fn test_coincident_points_rejected() {
        let p = point(5.0, 5.0, 5.0);
        assert!(linearize(ObservationKind::Hd, p, p, None).is_err());
        assert!(linearize(ObservationKind::Dx, p, p, None).is_ok());
    }
}
