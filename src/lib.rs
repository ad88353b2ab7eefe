//! Least-squares adjustment of surveying control networks.
//!
//! A [`Dataset`] of control points, stations and measurements is adjusted by
//! iteratively reweighted Gauss-Newton with one of the robust weighting
//! methods of [`core::WeightingMethod`]. Free networks are handled either by
//! the pseudoinverse of the normal matrix or by weighted tie point
//! pseudo-observations.

pub mod adjustment;
pub mod basic;
pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod linalg;
pub mod logger;
pub mod optimizer;
pub mod results;

pub use adjustment::{Adjustment, AdjustmentOptions};
pub use config::{ConfigRegistry, SigmaProfile, SolverProfile};
pub use core::{MethodConfig, TiePointSelection, WeightingMethod};
pub use data::{ControlPoint, Dataset, DatasetBuilder, Measurement, ObservationKind, Station};
pub use error::{AdjustmentWarning, SurveyNetError, SurveyNetResult};
pub use logger::{init_logger, init_logger_with_level};
pub use optimizer::{Solver, SolverStatus};
pub use results::{Results, ResultsBundle};
