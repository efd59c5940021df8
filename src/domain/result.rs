//! Fit outputs.
//!
//! These are serializable so a completed fit can be written to JSON, reloaded
//! for plotting, or compared across runs.

use serde::{Deserialize, Serialize};

use crate::domain::{Method, Stack};
use crate::error::PrecisionWarning;

/// How the search terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConvergenceStatus {
    /// Tolerance met.
    Converged,
    /// Iteration budget exhausted; the best point so far is reported.
    MaxIterations,
    /// Stopped by the caller between iterations; the best point so far is reported.
    Cancelled,
}

impl ConvergenceStatus {
    pub fn display_name(self) -> &'static str {
        match self {
            ConvergenceStatus::Converged => "converged",
            ConvergenceStatus::MaxIterations => "max iterations reached",
            ConvergenceStatus::Cancelled => "cancelled",
        }
    }
}

/// Role of a parameter in the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterRole {
    Free,
    Fixed,
    Tied,
}

/// Histogram of a sampled marginal posterior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marginal {
    /// `counts.len() + 1` bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Posterior summary of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosteriorSummary {
    pub median: f64,
    pub mean: f64,
    pub std: f64,
    /// 15.87th percentile (one sigma below for a Gaussian).
    pub lower: f64,
    /// 84.13th percentile.
    pub upper: f64,
    /// Gelman-Rubin potential scale reduction (walkers treated as chains);
    /// absent when the chains are too short or not finite.
    pub r_hat: Option<f64>,
    pub marginal: Marginal,
}

/// Point estimate and uncertainty of one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEstimate {
    pub name: String,
    pub role: ParameterRole,
    pub value: f64,
    /// One-sigma uncertainty (free parameters only, when available).
    pub uncertainty: Option<f64>,
    /// Bounds; absent when unbounded on that side.
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posterior: Option<PosteriorSummary>,
}

/// Observed vs fitted value at one measured point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualPoint {
    pub q: f64,
    pub r_obs: f64,
    pub dr: f64,
    pub r_fit: f64,
    /// `(r_obs - r_fit) / dr`.
    pub normalized: f64,
}

/// One sample of the SLD depth profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfilePoint {
    /// Depth (Å) below the fronting interface.
    pub z: f64,
    pub sld: f64,
}

/// Ensemble sampler diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingDiagnostics {
    pub walkers: usize,
    pub steps: usize,
    pub burn: usize,
    pub thin: usize,
    /// Samples kept after burn-in and thinning (all walkers).
    pub samples: usize,
    pub acceptance_fraction: f64,
    /// Largest R-hat over free parameters.
    pub max_r_hat: Option<f64>,
}

/// Output of a completed fit session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub method: Method,
    pub status: ConvergenceStatus,
    pub seed: u64,
    pub iterations: usize,
    pub evaluations: usize,

    /// Objective value at the best vector.
    pub cost: f64,
    pub reduced_chi2: f64,
    pub n_points: usize,
    pub n_free: usize,

    pub stack: Stack,
    pub scale: f64,
    pub background: f64,
    /// Best free-parameter vector.
    pub best_vector: Vec<f64>,
    pub parameters: Vec<ParameterEstimate>,

    pub residuals: Vec<ResidualPoint>,
    pub sld_profile: Vec<ProfilePoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingDiagnostics>,
    #[serde(default)]
    pub warnings: Vec<PrecisionWarning>,
}

impl FitResult {
    pub fn parameter(&self, name: &str) -> Option<&ParameterEstimate> {
        self.parameters.iter().find(|p| p.name == name)
    }
}
