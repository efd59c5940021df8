//! Data sources that are not files: simulated measurements.

pub mod synthetic;

pub use synthetic::*;
