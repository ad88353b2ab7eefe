//! Control points and their coordinate axes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate axis of a control point.
///
/// X points north, Y points east, Z points up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in column order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of the axis inside coordinate arrays.
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Set of axes shared by every control point of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    /// Horizontal network (x, y)
    Planar,
    /// Spatial network (x, y, z)
    Spatial,
    /// Levelling network (z)
    Height,
}

impl Dimension {
    /// Classify a presence mask over [x, y, z]; `None` for unsupported sets.
    pub fn from_mask(mask: [bool; 3]) -> Option<Self> {
        match mask {
            [true, true, false] => Some(Dimension::Planar),
            [true, true, true] => Some(Dimension::Spatial),
            [false, false, true] => Some(Dimension::Height),
            _ => None,
        }
    }

    pub fn has_axis(self, axis: Axis) -> bool {
        match self {
            Dimension::Planar => axis != Axis::Z,
            Dimension::Spatial => true,
            Dimension::Height => axis == Axis::Z,
        }
    }

    pub fn axes(self) -> impl Iterator<Item = Axis> {
        Axis::ALL.into_iter().filter(move |axis| self.has_axis(*axis))
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Planar => write!(f, "2D (x, y)"),
            Dimension::Spatial => write!(f, "3D (x, y, z)"),
            Dimension::Height => write!(f, "1D (z)"),
        }
    }
}

/// A control point with approximate coordinates and optional a priori sigmas.
///
/// A present coordinate whose sigma is exactly zero is held fixed. Every other
/// present coordinate is an unknown of the adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub id: String,
    pub coordinates: [Option<f64>; 3],
    pub sigmas: [Option<f64>; 3],
}

impl ControlPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            coordinates: [None; 3],
            sigmas: [None; 3],
        }
    }

    /// Planar point with approximate x and y
    pub fn planar(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self::new(id).with_coordinate(Axis::X, x).with_coordinate(Axis::Y, y)
    }

    /// Spatial point with approximate x, y and z
    pub fn spatial(id: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self::planar(id, x, y).with_coordinate(Axis::Z, z)
    }

    pub fn with_coordinate(mut self, axis: Axis, value: f64) -> Self {
        self.coordinates[axis.index()] = Some(value);
        self
    }

    pub fn with_sigma(mut self, axis: Axis, sigma: f64) -> Self {
        self.sigmas[axis.index()] = Some(sigma);
        self
    }

    /// Hold every present coordinate fixed.
    pub fn fixed(mut self) -> Self {
        for axis in Axis::ALL {
            if self.coordinates[axis.index()].is_some() {
                self.sigmas[axis.index()] = Some(0.0);
            }
        }
        self
    }

    pub fn coordinate(&self, axis: Axis) -> Option<f64> {
        self.coordinates[axis.index()]
    }

    pub fn sigma(&self, axis: Axis) -> Option<f64> {
        self.sigmas[axis.index()]
    }

    pub fn is_fixed(&self, axis: Axis) -> bool {
        self.coordinate(axis).is_some() && self.sigma(axis) == Some(0.0)
    }

    /// Present and not fixed.
    pub fn is_estimated(&self, axis: Axis) -> bool {
        matches!(self.coordinate(axis), Some(value) if value.is_finite()) && !self.is_fixed(axis)
    }

    pub fn presence_mask(&self) -> [bool; 3] {
        self.coordinates.map(|c| c.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_point_components() {
        let point = ControlPoint::planar("A", 100.0, 200.0).fixed();
        assert!(point.is_fixed(Axis::X));
        assert!(point.is_fixed(Axis::Y));
        assert!(!point.is_fixed(Axis::Z));
        assert!(!point.is_estimated(Axis::X));
    }

    #[test]
    fn test_estimated_components() {
        let point = ControlPoint::spatial("B", 1.0, 2.0, 3.0).with_sigma(Axis::Z, 0.0);
        assert!(point.is_estimated(Axis::X));
        assert!(point.is_estimated(Axis::Y));
        assert!(!point.is_estimated(Axis::Z));
    }

    #[test]
    fn test_dimension_from_mask() {
        assert_eq!(
            Dimension::from_mask([true, true, false]),
            Some(Dimension::Planar)
        );
        assert_eq!(
            Dimension::from_mask([false, false, true]),
            Some(Dimension::Height)
        );
        assert_eq!(Dimension::from_mask([true, false, true]), None);
        assert_eq!(Dimension::Planar.axes().count(), 2);
    }
}
