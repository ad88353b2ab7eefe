//! Column bookkeeping of the design matrix.
//!
//! Coordinate unknowns come first, numbered row-major over the control
//! points (x, y, z of the first point, then the second, ...) skipping fixed or
//! missing components. Orientation unknowns continue the numbering in
//! station order.

use crate::data::{Axis, Dataset};

/// Maps coordinate components and station orientations to design matrix columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIndexer {
    /// Per control point, column of each axis; `None` for fixed or missing values
    coordinate_indices: Vec<[Option<usize>; 3]>,
    /// Per station, column of its orientation unknown
    orientation_indices: Vec<Option<usize>>,
    n_coordinates: usize,
    n_orientations: usize,
}

/// One estimated coordinate component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateUnknown {
    pub point: usize,
    pub axis: Axis,
    pub column: usize,
}

impl UnknownIndexer {
    pub fn new(dataset: &Dataset) -> Self {
        let mut next = 0;
        let coordinate_indices: Vec<[Option<usize>; 3]> = dataset
            .controls()
            .iter()
            .map(|point| {
                let mut indices = [None; 3];
                for axis in Axis::ALL {
                    if point.is_estimated(axis) {
                        indices[axis.index()] = Some(next);
                        next += 1;
                    }
                }
                indices
            })
            .collect();
        let n_coordinates = next;

        let orientation_indices: Vec<Option<usize>> = dataset
            .stations()
            .iter()
            .map(|station| {
                station.orientation.map(|_| {
                    let column = next;
                    next += 1;
                    column
                })
            })
            .collect();

        Self {
            coordinate_indices,
            orientation_indices,
            n_coordinates,
            n_orientations: next - n_coordinates,
        }
    }

    pub fn coordinate_index(&self, point: usize, axis: Axis) -> Option<usize> {
        self.coordinate_indices
            .get(point)
            .and_then(|indices| indices[axis.index()])
    }

    pub fn orientation_index(&self, station: usize) -> Option<usize> {
        self.orientation_indices.get(station).copied().flatten()
    }

    /// Total number of unknowns, the column count of X.
    pub fn len(&self) -> usize {
        self.n_coordinates + self.n_orientations
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn coordinate_count(&self) -> usize {
        self.n_coordinates
    }

    pub fn orientation_count(&self) -> usize {
        self.n_orientations
    }

    /// Estimated coordinate components in column order.
    pub fn coordinate_unknowns(&self) -> impl Iterator<Item = CoordinateUnknown> + '_ {
        self.coordinate_indices
            .iter()
            .enumerate()
            .flat_map(|(point, indices)| {
                Axis::ALL.into_iter().filter_map(move |axis| {
                    indices[axis.index()].map(|column| CoordinateUnknown {
                        point,
                        axis,
                        column,
                    })
                })
            })
    }

    /// Human-readable label of every column, e.g. `P1 (x)` or `S1 (orientation)`.
    pub fn labels(&self, dataset: &Dataset) -> Vec<String> {
        let mut labels = vec![String::new(); self.len()];
        for unknown in self.coordinate_unknowns() {
            labels[unknown.column] =
                format!("{} ({})", dataset.controls()[unknown.point].id, unknown.axis);
        }
        for (station, column) in self.orientation_indices.iter().enumerate() {
            if let Some(column) = column {
                labels[*column] = format!("{} (orientation)", dataset.stations()[station].key);
            }
        }
        labels
    }
}
