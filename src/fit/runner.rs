//! One complete fit: search, uncertainties and the assembled [`FitResult`].

use crate::domain::{
    ConvergenceStatus, Dataset, FitResult, FitSettings, Method, ModelConfig, ParameterEstimate, ParameterRole,
    PosteriorSummary, SamplingDiagnostics,
};
use crate::error::{FitError, FitResultOf, PrecisionWarning};
use crate::fit::cancel::CancelToken;
use crate::fit::diagnostics::{sampling_diagnostics, summarize_all};
use crate::fit::evolution::{self, EvolutionOptions};
use crate::fit::mcmc::{self, SamplerOptions, R_HAT_THRESHOLD};
use crate::fit::nelder_mead::{self, NelderMeadOptions};
use crate::fit::objective::{Objective, ObjectiveOptions};
use crate::fit::params::ParameterSpace;
use crate::fit::uncertainty;
use crate::models::sld_profile;

/// Samples of the SLD depth profile stored with a result.
pub const PROFILE_POINTS: usize = 200;

/// Best point and per-parameter error estimates of a search.
struct Estimate {
    x: Vec<f64>,
    cost: f64,
    iterations: usize,
    evaluations: usize,
    status: ConvergenceStatus,
    sigma: Vec<Option<f64>>,
    posterior: Vec<Option<PosteriorSummary>>,
    sampling: Option<SamplingDiagnostics>,
    warnings: Vec<PrecisionWarning>,
}

/// Reject method settings that no search with `dim` free parameters can honour.
pub fn validate_settings(settings: &FitSettings, dim: usize) -> FitResultOf<()> {
    let invalid = |msg: String| Err(FitError::invalid_parameter(msg));
    if !(settings.tolerance.is_finite() && settings.tolerance >= 0.0) {
        return invalid(format!("tolerance must be finite and non-negative, got {}", settings.tolerance));
    }

    match settings.method {
        Method::NelderMead => {}
        Method::DifferentialEvolution => {
            if settings.population == 0 {
                return invalid("population must be at least 1".to_string());
            }
            if !(settings.spread_tolerance.is_finite() && settings.spread_tolerance >= 0.0) {
                return invalid(format!(
                    "spread_tolerance must be finite and non-negative, got {}",
                    settings.spread_tolerance
                ));
            }
        }
        Method::Mcmc => {
            if dim == 0 {
                return invalid("sampling needs at least one free parameter".to_string());
            }
            if settings.thin == 0 {
                return invalid("thin must be at least 1".to_string());
            }
            if settings.burn >= settings.max_iterations {
                return invalid(format!(
                    "burn-in ({}) must be shorter than the run ({} steps)",
                    settings.burn, settings.max_iterations
                ));
            }
            let min_walkers = 2 * dim + 2;
            if settings.walkers != 0 && settings.walkers < min_walkers {
                return invalid(format!(
                    "{} walkers cannot sample {dim} parameters, use at least {min_walkers} (or 0 for automatic)",
                    settings.walkers
                ));
            }
        }
    }
    Ok(())
}

/// Fit `space` to `dataset` with the method and settings of `config`.
///
/// Runs on the current rayon pool.
pub fn run_fit(
    dataset: &Dataset,
    config: &ModelConfig,
    space: &ParameterSpace,
    cancel: &CancelToken,
) -> FitResultOf<FitResult> {
    let settings = &config.fit;
    validate_settings(settings, space.dimension())?;
    let options = ObjectiveOptions::from_settings(settings);
    let objective = Objective::new(dataset, space, &config.resolution, options)?;
    let x0 = space.to_vector();
    let dim = space.dimension();

    tracing::info!(
        method = settings.method.display_name(),
        free = dim,
        points = objective.n_points(),
        seed = settings.seed,
        "starting fit"
    );

    let estimate = match settings.method {
        Method::NelderMead | Method::DifferentialEvolution => {
            let min = if settings.method == Method::NelderMead {
                nelder_mead::minimize(&objective, &x0, &NelderMeadOptions::from_settings(settings), cancel)?
            } else {
                evolution::minimize(&objective, &x0, &EvolutionOptions::from_settings(settings), cancel)?
            };
            let scale = if settings.scale_covariance {
                objective.reduced_chi2(min.cost)
            } else {
                1.0
            };
            let errors = uncertainty::estimate(&objective, &min.x, scale);
            Estimate {
                x: min.x,
                cost: min.cost,
                iterations: min.iterations,
                evaluations: min.evaluations,
                status: min.status,
                sigma: errors.sigma,
                posterior: vec![None; dim],
                sampling: None,
                warnings: errors.warnings,
            }
        }
        Method::Mcmc => {
            let mut evaluations = 0;
            let start = if settings.pre_optimize {
                let min = nelder_mead::minimize(&objective, &x0, &NelderMeadOptions::from_settings(settings), cancel)?;
                evaluations += min.evaluations;
                min.x
            } else {
                x0.clone()
            };
            let sampling = mcmc::sample(&objective, &start, &SamplerOptions::from_settings(settings), cancel)?;
            let posterior = summarize_all(&sampling, dim, settings.bins);
            let diagnostics = sampling_diagnostics(&sampling, dim);

            let mut warnings = Vec::new();
            if sampling.status == ConvergenceStatus::MaxIterations {
                warnings.push(PrecisionWarning::general(match diagnostics.max_r_hat {
                    Some(r) => format!("chains not converged: max R-hat {r:.3} >= {R_HAT_THRESHOLD}"),
                    None => "chains too short to assess convergence".to_string(),
                }));
            }
            Estimate {
                x: sampling.best.clone(),
                cost: sampling.best_cost,
                iterations: sampling.steps,
                evaluations: evaluations + sampling.evaluations,
                status: sampling.status,
                sigma: posterior.iter().map(|p| p.as_ref().map(|s| s.std)).collect(),
                posterior,
                sampling: Some(diagnostics),
                warnings,
            }
        }
    };

    let mut warnings = objective.warnings().to_vec();
    warnings.extend(estimate.warnings.iter().cloned());
    for w in &estimate.warnings {
        tracing::warn!("{w}");
    }

    let model = space.model_from_vector(&estimate.x)?;
    let values = space.values_from_vector(&estimate.x)?;
    let mut free_index = 0;
    let parameters = space
        .parameters()
        .iter()
        .zip(values)
        .map(|(p, value)| {
            let (uncertainty, posterior) = if p.role == ParameterRole::Free {
                let k = free_index;
                free_index += 1;
                (estimate.sigma[k], estimate.posterior[k].clone())
            } else {
                (None, None)
            };
            ParameterEstimate {
                name: p.name.clone(),
                role: p.role,
                value,
                uncertainty,
                lower: Some(p.lower).filter(|v| v.is_finite()),
                upper: Some(p.upper).filter(|v| v.is_finite()),
                posterior,
            }
        })
        .collect();

    let residuals = objective.residuals(&estimate.x)?;
    let profile = sld_profile(&model.stack, &options.engine, PROFILE_POINTS)?;
    let reduced_chi2 = objective.reduced_chi2(estimate.cost);

    tracing::info!(
        cost = estimate.cost,
        reduced_chi2,
        iterations = estimate.iterations,
        status = estimate.status.display_name(),
        "fit finished"
    );

    Ok(FitResult {
        method: settings.method,
        status: estimate.status,
        seed: settings.seed,
        iterations: estimate.iterations,
        evaluations: estimate.evaluations,
        cost: estimate.cost,
        reduced_chi2,
        n_points: objective.n_points(),
        n_free: dim,
        stack: model.stack,
        scale: model.scale,
        background: model.background,
        best_vector: estimate.x,
        parameters,
        residuals,
        sld_profile: profile,
        sampling: estimate.sampling,
        warnings,
    })
}
