//! Reflectivity model: optical matrix engine, depth profiles and resolution.
//!
//! Everything here is a pure function of its inputs so the objective can call
//! it from any worker thread.

pub mod abeles;
pub mod profile;
pub mod resolution;

pub use abeles::*;
pub use profile::*;
pub use resolution::*;
