//! Input/output helpers.
//!
//! - reflectivity column files (`dataset`)
//! - model configuration JSON (`model`)
//! - fit report JSON and residual CSV exports (`export`)

pub mod dataset;
pub mod export;
pub mod model;

pub use dataset::*;
pub use export::*;
pub use model::*;
