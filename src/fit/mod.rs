//! Fitting core.
//!
//! Responsibilities:
//!
//! - map parameter vectors to models (`params`)
//! - score a model against a dataset (`objective`)
//! - search the parameter space (Nelder–Mead, differential evolution, MCMC)
//! - estimate uncertainties and summarize posteriors
//! - drive a fit through its lifecycle (`session`)

pub mod cancel;
pub mod diagnostics;
pub mod evolution;
pub mod mcmc;
pub mod nelder_mead;
pub mod objective;
pub mod params;
pub mod runner;
pub mod session;
pub mod uncertainty;

#[cfg(test)]
mod testutil;

pub use cancel::CancelToken;
pub use objective::*;
pub use params::*;
pub use runner::*;
pub use session::*;
