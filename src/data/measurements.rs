//! Stations and measurements.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::controls::{Axis, Dimension};
use crate::error::{SurveyNetError, SurveyNetResult};

/// Kind of a scalar observation taken from a station to a target point.
///
/// Angles are in radians. Azimuths and directions are measured clockwise
/// from the X axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    /// Horizontal distance
    Hd,
    /// Slope distance
    Sd,
    /// Height difference
    Vd,
    Dx,
    Dy,
    Dz,
    /// Azimuth
    A,
    /// Horizontal direction, relative to the station orientation
    Hz,
    /// Zenith angle
    Vz,
}

impl ObservationKind {
    pub const ALL: [ObservationKind; 9] = [
        ObservationKind::Hd,
        ObservationKind::Sd,
        ObservationKind::Vd,
        ObservationKind::Dx,
        ObservationKind::Dy,
        ObservationKind::Dz,
        ObservationKind::A,
        ObservationKind::Hz,
        ObservationKind::Vz,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ObservationKind::Hd => "hd",
            ObservationKind::Sd => "sd",
            ObservationKind::Vd => "vd",
            ObservationKind::Dx => "dx",
            ObservationKind::Dy => "dy",
            ObservationKind::Dz => "dz",
            ObservationKind::A => "a",
            ObservationKind::Hz => "hz",
            ObservationKind::Vz => "vz",
        }
    }

    pub fn from_name(name: &str) -> SurveyNetResult<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| {
                SurveyNetError::InvalidInput(format!("unknown observation kind '{name}'"))
            })
    }

    /// Angular observations take the angular default sigma and wrap their misclosure.
    pub fn is_angular(self) -> bool {
        matches!(
            self,
            ObservationKind::A | ObservationKind::Hz | ObservationKind::Vz
        )
    }

    /// Azimuths and directions live on the full circle.
    pub fn is_direction(self) -> bool {
        matches!(self, ObservationKind::A | ObservationKind::Hz)
    }

    /// Distances and angles are undefined between coincident points.
    pub fn needs_separation(self) -> bool {
        matches!(
            self,
            ObservationKind::Hd
                | ObservationKind::Sd
                | ObservationKind::A
                | ObservationKind::Hz
                | ObservationKind::Vz
        )
    }

    /// Axes that must exist on both ends of the observation.
    pub fn required_axes(self) -> &'static [Axis] {
        match self {
            ObservationKind::Hd | ObservationKind::A | ObservationKind::Hz => &[Axis::X, Axis::Y],
            ObservationKind::Sd | ObservationKind::Vz => &[Axis::X, Axis::Y, Axis::Z],
            ObservationKind::Vd | ObservationKind::Dz => &[Axis::Z],
            ObservationKind::Dx => &[Axis::X],
            ObservationKind::Dy => &[Axis::Y],
        }
    }

    pub fn is_supported_by(self, dimension: Dimension) -> bool {
        self.required_axes()
            .iter()
            .all(|axis| dimension.has_axis(*axis))
    }
}

impl fmt::Display for ObservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An instrument setup on a control point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub key: String,
    pub point_id: String,
    /// Approximate orientation of the horizontal circle; `Some` adds an orientation unknown.
    pub orientation: Option<f64>,
}

impl Station {
    pub fn new(key: impl Into<String>, point_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            point_id: point_id.into(),
            orientation: None,
        }
    }

    pub fn with_orientation(mut self, orientation: f64) -> Self {
        self.orientation = Some(orientation);
        self
    }
}

/// A single scalar observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub station_key: String,
    pub target_id: String,
    pub kind: ObservationKind,
    pub value: f64,
    /// A priori standard deviation; the sigma profile supplies a default when absent.
    pub sigma: Option<f64>,
}

impl Measurement {
    pub fn new(
        station_key: impl Into<String>,
        target_id: impl Into<String>,
        kind: ObservationKind,
        value: f64,
    ) -> Self {
        Self {
            station_key: station_key.into(),
            target_id: target_id.into(),
            kind,
            value,
            sigma: None,
        }
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = Some(sigma);
        self
    }

    /// Row label used in reports, e.g. `S1 -> P2 (hd)`.
    pub fn label(&self) -> String {
        format!("{} -> {} ({})", self.station_key, self.target_id, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ObservationKind::ALL {
            assert_eq!(ObservationKind::from_name(kind.name()).unwrap(), kind);
        }
        assert!(ObservationKind::from_name("xyz").is_err());
    }

    #[test]
    fn test_kind_dimension_support() {
        assert!(ObservationKind::Hd.is_supported_by(Dimension::Planar));
        assert!(!ObservationKind::Sd.is_supported_by(Dimension::Planar));
        assert!(ObservationKind::Vd.is_supported_by(Dimension::Height));
        assert!(!ObservationKind::A.is_supported_by(Dimension::Height));
    }

    #[test]
    fn test_measurement_label() {
        let measurement = Measurement::new("S1", "P2", ObservationKind::Hd, 10.0).with_sigma(0.01);
        assert_eq!(measurement.label(), "S1 -> P2 (hd)");
        assert_eq!(measurement.sigma, Some(0.01));
    }
}
