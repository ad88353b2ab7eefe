//! In-memory dataset consumed by the adjustment engine.
//!
//! - [`ControlPoint`]: approximate coordinates and a priori sigmas per axis
//! - [`Station`]: instrument setup, optionally carrying an orientation unknown
//! - [`Measurement`]: one scalar observation from a station to a target
//! - [`Dataset`]: validated collection of the above

pub mod controls;
pub mod dataset;
pub mod measurements;

pub use controls::{Axis, ControlPoint, Dimension};
pub use dataset::{Dataset, DatasetBuilder};
pub use measurements::{Measurement, ObservationKind, Station};
