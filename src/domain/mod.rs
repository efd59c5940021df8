//! Domain types used throughout the engine.
//!
//! This module defines:
//!
//! - the physical model (`Sld`, `Layer`, `Stack`) and measurements (`Dataset`)
//! - user configuration (`ModelConfig`, `FitSettings`, `Resolution`)
//! - fit outputs (`FitResult`, `ParameterEstimate`, etc.)

pub mod config;
pub mod result;
pub mod types;

pub use config::*;
pub use result::*;
pub use types::*;
