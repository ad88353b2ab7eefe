//! Core adjustment components for the surveynet library
//!
//! This module contains the building blocks the solver iterates over:
//! - Robust weighting functions and the method table
//! - Unknown indexing (design matrix columns)
//! - Observation equations
//! - Design matrix, observation vector and weight construction

pub mod indexer;
pub mod matrices;
pub mod methods;
pub mod observation;
pub mod weighting;

pub use indexer::{CoordinateUnknown, UnknownIndexer};
pub use matrices::{FreeAdjustment, MatrixBuilder, TiePointSelection};
pub use methods::{MethodConfig, MethodSpec, WeightingMethod};
