//! Validated, read-only input of an adjustment run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::controls::{Axis, ControlPoint, Dimension};
use super::measurements::{Measurement, ObservationKind, Station};
use crate::error::{SurveyNetError, SurveyNetResult};

/// Control points, stations and measurements of one network.
///
/// Construction validates the whole dataset, so the engine never sees
/// unresolved references or mixed dimensionality.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    controls: Vec<ControlPoint>,
    stations: Vec<Station>,
    measurements: Vec<Measurement>,
    dimension: Dimension,
    #[serde(skip)]
    point_lookup: HashMap<String, usize>,
    #[serde(skip)]
    station_lookup: HashMap<String, usize>,
}

/// Unvalidated wire form of a [`Dataset`]; the derived dimension is ignored on input.
#[derive(Deserialize)]
struct RawDataset {
    controls: Vec<ControlPoint>,
    stations: Vec<Station>,
    measurements: Vec<Measurement>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = SurveyNetError;

    fn try_from(raw: RawDataset) -> SurveyNetResult<Self> {
        Self::new(raw.controls, raw.stations, raw.measurements)
    }
}

impl Dataset {
    /// Validate and assemble a dataset.
    ///
    /// # Errors
    /// `InvalidInput` for duplicate ids or keys, mixed 2D/3D control points,
    /// unresolved references, invalid sigmas, observation kinds the axis set
    /// cannot carry, directions from unoriented stations, and observations
    /// between coincident points.
    pub fn new(
        controls: Vec<ControlPoint>,
        stations: Vec<Station>,
        measurements: Vec<Measurement>,
    ) -> SurveyNetResult<Self> {
        if controls.is_empty() {
            return Err(SurveyNetError::InvalidInput(
                "dataset has no control points".to_string(),
            ));
        }

        let mut point_lookup = HashMap::with_capacity(controls.len());
        for (idx, point) in controls.iter().enumerate() {
            if point_lookup.insert(point.id.clone(), idx).is_some() {
                return Err(SurveyNetError::InvalidInput(format!(
                    "duplicate control point id '{}'",
                    point.id
                )));
            }
        }

        let dimension = Self::common_dimension(&controls)?;
        for point in &controls {
            Self::validate_point(point)?;
        }

        let mut station_lookup = HashMap::with_capacity(stations.len());
        for (idx, station) in stations.iter().enumerate() {
            if station_lookup.insert(station.key.clone(), idx).is_some() {
                return Err(SurveyNetError::InvalidInput(format!(
                    "duplicate station key '{}'",
                    station.key
                )));
            }
            if !point_lookup.contains_key(&station.point_id) {
                return Err(SurveyNetError::InvalidInput(format!(
                    "station '{}' references unknown point '{}'",
                    station.key, station.point_id
                )));
            }
            if let Some(orientation) = station.orientation
                && !orientation.is_finite()
            {
                return Err(SurveyNetError::InvalidInput(format!(
                    "station '{}' has a non-finite orientation",
                    station.key
                )));
            }
        }

        let dataset = Self {
            controls,
            stations,
            measurements,
            dimension,
            point_lookup,
            station_lookup,
        };
        for measurement in &dataset.measurements {
            dataset.validate_measurement(measurement)?;
        }
        Ok(dataset)
    }

    fn common_dimension(controls: &[ControlPoint]) -> SurveyNetResult<Dimension> {
        let mut dimension: Option<Dimension> = None;
        for point in controls {
            let current = Dimension::from_mask(point.presence_mask()).ok_or_else(|| {
                SurveyNetError::InvalidInput(format!(
                    "control point '{}' has an unsupported coordinate set",
                    point.id
                ))
            })?;
            match dimension {
                None => dimension = Some(current),
                Some(expected) if expected != current => {
                    return Err(SurveyNetError::InvalidInput(format!(
                        "mixed dimensionality: control point '{}' is {current}, expected {expected}",
                        point.id
                    )));
                }
                Some(_) => {}
            }
        }
        dimension.ok_or_else(|| SurveyNetError::InvalidInput("no control points".to_string()))
    }

    fn validate_point(point: &ControlPoint) -> SurveyNetResult<()> {
        for axis in Axis::ALL {
            if let Some(value) = point.coordinate(axis)
                && !value.is_finite()
            {
                return Err(SurveyNetError::InvalidInput(format!(
                    "control point '{}' has a non-finite {axis} coordinate",
                    point.id
                )));
            }
            if let Some(sigma) = point.sigma(axis) {
                if !(sigma.is_finite() && sigma >= 0.0) {
                    return Err(SurveyNetError::InvalidInput(format!(
                        "control point '{}' has an invalid {axis} sigma {sigma}",
                        point.id
                    )));
                }
                if point.coordinate(axis).is_none() {
                    return Err(SurveyNetError::InvalidInput(format!(
                        "control point '{}' has a {axis} sigma without a {axis} coordinate",
                        point.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_measurement(&self, measurement: &Measurement) -> SurveyNetResult<()> {
        let label = measurement.label();
        let station = self.station(&measurement.station_key).ok_or_else(|| {
            SurveyNetError::InvalidInput(format!("{label}: unknown station"))
        })?;
        let target = self.control(&measurement.target_id).ok_or_else(|| {
            SurveyNetError::InvalidInput(format!("{label}: unknown target point"))
        })?;
        if !measurement.value.is_finite() {
            return Err(SurveyNetError::InvalidInput(format!(
                "{label}: non-finite observed value"
            )));
        }
        if let Some(sigma) = measurement.sigma
            && !(sigma.is_finite() && sigma > 0.0)
        {
            return Err(SurveyNetError::InvalidInput(format!(
                "{label}: sigma must be positive, got {sigma}"
            )));
        }
        if !measurement.kind.is_supported_by(self.dimension) {
            return Err(SurveyNetError::InvalidInput(format!(
                "{label}: observation kind not available in a {} network",
                self.dimension
            )));
        }
        if measurement.kind == ObservationKind::Hz && station.orientation.is_none() {
            return Err(SurveyNetError::InvalidInput(format!(
                "{label}: direction observed from a station without orientation"
            )));
        }
        if station.point_id == target.id {
            return Err(SurveyNetError::InvalidInput(format!(
                "{label}: station and target are the same point"
            )));
        }
        if measurement.kind.needs_separation() {
            let from = self.control(&station.point_id).map(|p| p.coordinates);
            let horizontal_gap = from.map(|from| {
                let dx = target.coordinates[0].unwrap_or(0.0) - from[0].unwrap_or(0.0);
                let dy = target.coordinates[1].unwrap_or(0.0) - from[1].unwrap_or(0.0);
                dx.hypot(dy)
            });
            let coincident = match measurement.kind {
                ObservationKind::Sd | ObservationKind::Vz => from.zip(horizontal_gap).is_some_and(
                    |(from, gap)| {
                        let dz = target.coordinates[2].unwrap_or(0.0) - from[2].unwrap_or(0.0);
                        gap.hypot(dz) == 0.0
                    },
                ),
                _ => horizontal_gap == Some(0.0),
            };
            if coincident {
                return Err(SurveyNetError::InvalidInput(format!(
                    "{label}: station and target coordinates coincide"
                )));
            }
        }
        Ok(())
    }

    pub fn controls(&self) -> &[ControlPoint] {
        &self.controls
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn control(&self, id: &str) -> Option<&ControlPoint> {
        self.point_index(id).map(|idx| &self.controls[idx])
    }

    pub fn station(&self, key: &str) -> Option<&Station> {
        self.station_index(key).map(|idx| &self.stations[idx])
    }

    /// Position of a control point inside [`Dataset::controls`].
    pub fn point_index(&self, id: &str) -> Option<usize> {
        if self.point_lookup.is_empty() {
            return self.controls.iter().position(|p| p.id == id);
        }
        self.point_lookup.get(id).copied()
    }

    /// Position of a station inside [`Dataset::stations`].
    pub fn station_index(&self, key: &str) -> Option<usize> {
        if self.station_lookup.is_empty() {
            return self.stations.iter().position(|s| s.key == key);
        }
        self.station_lookup.get(key).copied()
    }
}

/// Fluent construction of a [`Dataset`].
///
/// ```
/// use surveynet::data::{ControlPoint, DatasetBuilder, ObservationKind};
///
/// let dataset = DatasetBuilder::new()
///     .control(ControlPoint::planar("A", 0.0, 0.0).fixed())
///     .control(ControlPoint::planar("P", 10.0, 0.0))
///     .station("A", "A")
///     .observe("A", "P", ObservationKind::Hd, 10.0, Some(0.01))
///     .build()
///     .unwrap();
/// assert_eq!(dataset.measurements().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatasetBuilder {
    controls: Vec<ControlPoint>,
    stations: Vec<Station>,
    measurements: Vec<Measurement>,
}

impl DatasetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn control(mut self, point: ControlPoint) -> Self {
        self.controls.push(point);
        self
    }

    /// Add a station without an orientation unknown.
    pub fn station(mut self, key: impl Into<String>, point_id: impl Into<String>) -> Self {
        self.stations.push(Station::new(key, point_id));
        self
    }

    /// Add a station whose orientation is estimated, starting from `orientation`.
    pub fn oriented_station(
        mut self,
        key: impl Into<String>,
        point_id: impl Into<String>,
        orientation: f64,
    ) -> Self {
        self.stations
            .push(Station::new(key, point_id).with_orientation(orientation));
        self
    }

    pub fn measurement(mut self, measurement: Measurement) -> Self {
        self.measurements.push(measurement);
        self
    }

    pub fn observe(
        self,
        station_key: impl Into<String>,
        target_id: impl Into<String>,
        kind: ObservationKind,
        value: f64,
        sigma: Option<f64>,
    ) -> Self {
        let mut measurement = Measurement::new(station_key, target_id, kind, value);
        measurement.sigma = sigma;
        self.measurement(measurement)
    }

    pub fn build(self) -> SurveyNetResult<Dataset> {
        Dataset::new(self.controls, self.stations, self.measurements)
    }
}
