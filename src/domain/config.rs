//! Model and fit configuration.
//!
//! A [`ModelConfig`] is the structured description a user hands to the
//! engine: initial layers (value, bounds, free flags, ties), instrument terms,
//! the resolution model and the optimizer settings. It is plain serde data so it
//! can live in a JSON file next to the measurement.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Local simplex minimization (point estimate).
    NelderMead,
    /// Population-based global minimization (point estimate).
    DifferentialEvolution,
    /// Ensemble Markov chain Monte Carlo (posterior sampling).
    Mcmc,
}

impl Method {
    pub fn display_name(self) -> &'static str {
        match self {
            Method::NelderMead => "Nelder-Mead",
            Method::DifferentialEvolution => "Differential evolution",
            Method::Mcmc => "MCMC (ensemble)",
        }
    }
}

/// Space in which residuals are weighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CostSpace {
    /// Residuals of ln R, weighted by the relative uncertainty.
    #[default]
    Log,
    /// Residuals of R, weighted by the absolute uncertainty.
    Linear,
}

/// Instrument resolution model. Widths are Gaussian FWHM.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Resolution {
    /// No smearing.
    #[default]
    None,
    /// Same absolute width (Å⁻¹) at every Q.
    Constant { dq: f64 },
    /// Width proportional to Q (`dq_over_q`, e.g. 0.05 for 5%).
    Fractional { dq_over_q: f64 },
    /// Per-point widths taken from the dataset's dQ column.
    Pointwise,
}

/// Optimizer / sampler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitSettings {
    pub method: Method,
    /// Iterations (Nelder-Mead), generations (DE) or ensemble steps (MCMC).
    pub max_iterations: usize,
    /// Relative cost tolerance for convergence.
    pub tolerance: f64,
    pub seed: u64,
    pub cost_space: CostSpace,

    /// DE population size as a multiple of the free parameter count.
    pub population: usize,
    /// Refine the DE optimum with Nelder-Mead.
    pub polish: bool,
    /// DE stops when the spread of population costs falls below this
    /// fraction of their mean.
    pub spread_tolerance: f64,

    /// Ensemble size (0 = automatic, at least twice the dimension).
    pub walkers: usize,
    /// Initial ensemble steps discarded from the posterior.
    pub burn: usize,
    /// Keep every `thin`-th step after burn-in.
    pub thin: usize,
    /// Start the ensemble around a Nelder-Mead optimum instead of the initial values.
    pub pre_optimize: bool,
    /// Histogram bins for marginal distributions.
    pub bins: usize,

    /// Scale the Hessian covariance by the reduced chi-square.
    pub scale_covariance: bool,

    /// Stencil points per resolution kernel.
    pub kernel_points: usize,
    /// Slabs used to approximate a graded layer.
    pub subdivisions: usize,
    /// When set, rough interfaces are replaced by slabs of this thickness (Å).
    pub microslice: Option<f64>,

    /// Worker threads for parallel evaluation (`None` = rayon's global pool).
    pub workers: Option<usize>,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            method: Method::NelderMead,
            max_iterations: 5_000,
            tolerance: 1e-8,
            seed: 0,
            cost_space: CostSpace::Log,
            population: 15,
            polish: true,
            spread_tolerance: 0.01,
            walkers: 0,
            burn: 200,
            thin: 1,
            pre_optimize: true,
            bins: 30,
            scale_covariance: true,
            kernel_points: 17,
            subdivisions: 10,
            microslice: None,
            workers: None,
        }
    }
}

/// A tie: `value = factor * source + offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TieSpec {
    /// Name of the parameter this one follows (e.g. `"film.roughness"`).
    pub source: String,
    #[serde(default = "one")]
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
}

fn one() -> f64 {
    1.0
}

/// Full parameter description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Starting value; ignored for tied parameters.
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Defaults to `true` when both bounds are given, `false` otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vary: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tie: Option<TieSpec>,
}

/// A bare number (fixed value) or a full [`ParamSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamConfig {
    Fixed(f64),
    Spec(ParamSpec),
}

impl ParamConfig {
    pub fn value(&self) -> f64 {
        match self {
            ParamConfig::Fixed(v) => *v,
            ParamConfig::Spec(s) => s.value,
        }
    }

    /// A free parameter with bounds.
    pub fn free(value: f64, min: f64, max: f64) -> Self {
        ParamConfig::Spec(ParamSpec {
            value,
            min: Some(min),
            max: Some(max),
            vary: Some(true),
            tie: None,
        })
    }

    /// A parameter following another one.
    pub fn tied(source: impl Into<String>, factor: f64, offset: f64) -> Self {
        ParamConfig::Spec(ParamSpec {
            value: 0.0,
            min: None,
            max: None,
            vary: Some(false),
            tie: Some(TieSpec {
                source: source.into(),
                factor,
                offset,
            }),
        })
    }
}

impl Default for ParamConfig {
    fn default() -> Self {
        ParamConfig::Fixed(0.0)
    }
}

impl From<f64> for ParamConfig {
    fn from(v: f64) -> Self {
        ParamConfig::Fixed(v)
    }
}

/// Layer description with per-attribute parameter configs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub thickness: ParamConfig,
    pub sld: ParamConfig,
    #[serde(default)]
    pub isld: ParamConfig,
    #[serde(default)]
    pub roughness: ParamConfig,
    /// Present for graded layers: SLD at the bottom of the layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sld_end: Option<ParamConfig>,
}

/// Everything needed to set up a fit besides the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Fronting medium first, backing medium last.
    pub layers: Vec<LayerConfig>,
    #[serde(default = "unit_scale")]
    pub scale: ParamConfig,
    #[serde(default)]
    pub background: ParamConfig,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub fit: FitSettings,
}

fn unit_scale() -> ParamConfig {
    ParamConfig::Fixed(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_config_parses_mixed_parameter_forms() {
        let json = r#"{
            "layers": [
                {"name": "air", "sld": 0.0},
                {"name": "film",
                 "thickness": {"value": 90.0, "min": 50.0, "max": 150.0},
                 "sld": {"value": 3.5e-6, "min": 1e-6, "max": 6e-6},
                 "roughness": {"value": 0.0, "tie": {"source": "si.roughness"}}},
                {"name": "si", "sld": 2.07e-6, "roughness": 3.0}
            ],
            "background": {"value": 1e-7, "min": 0.0, "max": 1e-5},
            "resolution": {"kind": "fractional", "dq_over_q": 0.05},
            "fit": {"method": "differential-evolution", "seed": 7}
        }"#;

        let cfg: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.layers.len(), 3);
        assert_eq!(cfg.scale, ParamConfig::Fixed(1.0));
        assert_eq!(cfg.resolution, Resolution::Fractional { dq_over_q: 0.05 });
        assert_eq!(cfg.fit.method, Method::DifferentialEvolution);
        assert_eq!(cfg.fit.seed, 7);
        assert_eq!(cfg.fit.max_iterations, FitSettings::default().max_iterations);

        match &cfg.layers[1].roughness {
            ParamConfig::Spec(spec) => {
                let tie = spec.tie.as_ref().unwrap();
                assert_eq!(tie.source, "si.roughness");
                assert_eq!(tie.factor, 1.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(cfg.layers[2].roughness.value(), 3.0);
    }
}
