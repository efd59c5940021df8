//! Affine-invariant ensemble sampler (Goodman & Weare stretch move).
//!
//! The posterior is `ln p(x) = −cost(x) / 2` inside the parameter bounds and
//! `−∞` outside (uniform priors). The ensemble is split into two halves; each
//! half moves against the other, so the proposals of one half are independent
//! and are evaluated as one parallel batch.
//!
//! A proposal for walker `k` uses a partner `c` from the other half:
//!
//! ```text
//! y = c + z · (x_k − c),   z ~ g(z) ∝ 1/√z on [1/a, a]
//! accept with probability min(1, z^(d−1) · p(y) / p(x_k))
//! ```
//!
//! Random numbers (partners, stretch factors, acceptance draws) are taken
//! sequentially before each batch is evaluated, so a seed fixes the chain
//! independently of the worker count.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use rayon::prelude::*;

use crate::domain::{ConvergenceStatus, FitSettings};
use crate::error::{FitError, FitResultOf};
use crate::fit::cancel::CancelToken;
use crate::fit::objective::{CostFunction, PENALTY_COST};
use crate::fit::params::{from_unit, to_unit};
use crate::math::gelman_rubin;

/// Stretch scale `a`.
const STRETCH: f64 = 2.0;
/// Spread of the initial ensemble around the start point (unit coordinates).
const INITIAL_SPREAD: f64 = 1e-2;
/// R̂ below this counts as converged.
pub const R_HAT_THRESHOLD: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerOptions {
    /// Requested ensemble size; raised to at least `2·d + 2` and made even.
    pub walkers: usize,
    pub steps: usize,
    pub burn: usize,
    pub thin: usize,
    pub seed: u64,
}

impl SamplerOptions {
    pub fn from_settings(settings: &FitSettings) -> Self {
        Self {
            walkers: settings.walkers,
            steps: settings.max_iterations,
            burn: settings.burn,
            thin: settings.thin,
            seed: settings.seed,
        }
    }

    /// Actual ensemble size for a `dim`-dimensional problem.
    pub fn walker_count(&self, dim: usize) -> usize {
        let n = self.walkers.max(2 * dim + 2);
        n + n % 2
    }
}

/// Output of a sampling run.
#[derive(Debug, Clone, PartialEq)]
pub struct Sampling {
    /// `chains[w][s]` is the `s`-th kept state of walker `w` (parameter coordinates).
    pub chains: Vec<Vec<Vec<f64>>>,
    pub walkers: usize,
    /// Ensemble steps actually taken.
    pub steps: usize,
    pub burn: usize,
    pub thin: usize,
    pub accepted: usize,
    pub evaluations: usize,
    /// Lowest-cost state visited.
    pub best: Vec<f64>,
    pub best_cost: f64,
    pub status: ConvergenceStatus,
}

impl Sampling {
    pub fn acceptance_fraction(&self) -> f64 {
        let proposals = self.walkers * self.steps;
        if proposals == 0 {
            0.0
        } else {
            self.accepted as f64 / proposals as f64
        }
    }

    /// Kept samples per walker.
    pub fn kept(&self) -> usize {
        self.chains.first().map_or(0, Vec::len)
    }

    /// Parameter `j` of every kept sample, one chain per walker.
    pub fn marginal_chains(&self, j: usize) -> Vec<Vec<f64>> {
        self.chains
            .iter()
            .map(|chain| chain.iter().map(|x| x[j]).collect())
            .collect()
    }

    /// Gelman-Rubin R̂ of parameter `j`, walkers treated as chains.
    pub fn r_hat(&self, j: usize) -> Option<f64> {
        gelman_rubin(&self.marginal_chains(j)).filter(|r| r.is_finite())
    }

    /// Largest R̂ over all parameters; `None` if any is unavailable.
    pub fn max_r_hat(&self, dim: usize) -> Option<f64> {
        let mut max: Option<f64> = None;
        for j in 0..dim {
            let r = self.r_hat(j)?;
            max = Some(max.map_or(r, |m: f64| m.max(r)));
        }
        max
    }
}

/// Draw posterior samples starting from a ball around `x0`.
pub fn sample<F>(f: &F, x0: &[f64], opts: &SamplerOptions, cancel: &CancelToken) -> FitResultOf<Sampling>
where
    F: CostFunction + ?Sized,
{
    let bounds = f.bounds();
    let dim = bounds.len();
    if dim == 0 {
        return Err(FitError::invalid_parameter("sampling needs at least one free parameter"));
    }
    if x0.len() != dim {
        return Err(FitError::invalid_parameter(format!(
            "start vector has {} entries, the cost has {dim} dimensions",
            x0.len()
        )));
    }
    if opts.thin == 0 {
        return Err(FitError::invalid_parameter("thin must be at least 1"));
    }
    if opts.burn >= opts.steps {
        return Err(FitError::invalid_parameter(format!(
            "burn-in ({}) must be shorter than the run ({} steps)",
            opts.burn, opts.steps
        )));
    }

    let start_cost = f.cost(x0);
    if !start_cost.is_finite() || start_cost >= PENALTY_COST {
        return Err(FitError::invalid_parameter(
            "the sampler start point lies outside the model domain",
        ));
    }

    let walkers = opts.walker_count(dim);
    let half = walkers / 2;
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| FitError::invalid_parameter(e.to_string()))?;

    let u0 = to_unit(&bounds, x0);
    let mut ensemble: Vec<Vec<f64>> = Vec::with_capacity(walkers);
    ensemble.push(u0.clone());
    while ensemble.len() < walkers {
        let u: Vec<f64> = u0
            .iter()
            .map(|c| (c + INITIAL_SPREAD * normal.sample(&mut rng)).clamp(0.0, 1.0))
            .collect();
        ensemble.push(u);
    }
    let initial = log_probs(f, &bounds, &ensemble, 0, None)?;
    let mut evaluations = walkers;
    // Walkers that start outside the domain restart from the start point.
    let mut lp = Vec::with_capacity(walkers);
    for (k, l) in initial.into_iter().enumerate() {
        if l.is_finite() {
            lp.push(l);
        } else {
            ensemble[k] = u0.clone();
            lp.push(-0.5 * start_cost);
        }
    }

    let (mut best_k, mut best_lp) = argmax(&lp);
    let mut best = ensemble[best_k].clone();

    let mut chains: Vec<Vec<Vec<f64>>> = vec![Vec::new(); walkers];
    let mut accepted = 0;
    let mut steps = 0;
    let mut status = ConvergenceStatus::MaxIterations;

    while steps < opts.steps {
        if cancel.is_cancelled() {
            status = ConvergenceStatus::Cancelled;
            break;
        }

        for (moving, partners) in [(0..half, half..walkers), (half..walkers, 0..half)] {
            let draws: Vec<(usize, f64, f64)> = moving
                .clone()
                .map(|_| {
                    let partner = rng.gen_range(partners.clone());
                    let z = ((STRETCH - 1.0) * rng.r#gen::<f64>() + 1.0).powi(2) / STRETCH;
                    let ln_u = rng.r#gen::<f64>().ln();
                    (partner, z, ln_u)
                })
                .collect();

            let proposals: Vec<Vec<f64>> = moving
                .clone()
                .zip(&draws)
                .map(|(k, &(c, z, _))| {
                    ensemble[c]
                        .iter()
                        .zip(&ensemble[k])
                        .map(|(a, b)| a + z * (b - a))
                        .collect()
                })
                .collect();
            let proposed = log_probs(f, &bounds, &proposals, steps + 1, Some(&best))?;
            evaluations += proposals.len();

            for ((k, y), (l, &(_, z, ln_u))) in moving.zip(proposals).zip(proposed.into_iter().zip(&draws)) {
                let ln_ratio = (dim as f64 - 1.0) * z.ln() + l - lp[k];
                if l.is_finite() && ln_u < ln_ratio {
                    ensemble[k] = y;
                    lp[k] = l;
                    accepted += 1;
                    if l > best_lp {
                        best_lp = l;
                        best_k = k;
                        best = ensemble[k].clone();
                    }
                }
            }
        }

        if steps >= opts.burn && (steps - opts.burn) % opts.thin == 0 {
            for (chain, u) in chains.iter_mut().zip(&ensemble) {
                chain.push(from_unit(&bounds, u));
            }
        }
        steps += 1;

        if steps % 100 == 0 {
            tracing::debug!(
                steps,
                acceptance = accepted as f64 / (walkers * steps) as f64,
                "ensemble sampler progress"
            );
        }
    }

    let mut sampling = Sampling {
        chains,
        walkers,
        steps,
        burn: opts.burn,
        thin: opts.thin,
        accepted,
        evaluations,
        best: from_unit(&bounds, &best),
        best_cost: -2.0 * best_lp,
        status,
    };
    if status != ConvergenceStatus::Cancelled {
        sampling.status = match sampling.max_r_hat(dim) {
            Some(r) if r < R_HAT_THRESHOLD => ConvergenceStatus::Converged,
            _ => ConvergenceStatus::MaxIterations,
        };
    }
    tracing::debug!(
        walkers,
        steps,
        best_walker = best_k,
        acceptance = sampling.acceptance_fraction(),
        status = sampling.status.display_name(),
        "ensemble sampler finished"
    );
    Ok(sampling)
}

/// Log posterior of unit-cube points; `−∞` outside the cube or the model domain.
fn log_probs<F>(
    f: &F,
    bounds: &[(f64, f64)],
    points: &[Vec<f64>],
    step: usize,
    best: Option<&Vec<f64>>,
) -> FitResultOf<Vec<f64>>
where
    F: CostFunction + ?Sized,
{
    let costs: Vec<f64> = points
        .par_iter()
        .map(|u| {
            if u.iter().all(|t| (0.0..=1.0).contains(t)) {
                f.cost(&from_unit(bounds, u))
            } else {
                PENALTY_COST
            }
        })
        .collect();

    let mut out = Vec::with_capacity(costs.len());
    for (u, c) in points.iter().zip(costs) {
        if !c.is_finite() {
            return Err(FitError::Optimization {
                reason: "non-finite cost".to_string(),
                iteration: step,
                vector: from_unit(bounds, u),
                last_valid: best.map(|b| from_unit(bounds, b)),
            });
        }
        out.push(if c >= PENALTY_COST { f64::NEG_INFINITY } else { -0.5 * c });
    }
    Ok(out)
}

fn argmax(values: &[f64]) -> (usize, f64) {
    let mut best = (0, values[0]);
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > best.1 {
            best = (i, v);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{mean, variance};

    /// Independent Gaussians: cost = Σ ((x − μ)/σ)².
    struct Gaussian {
        mu: [f64; 2],
        sigma: [f64; 2],
    }

    impl CostFunction for Gaussian {
        fn dimension(&self) -> usize {
            2
        }
        fn bounds(&self) -> Vec<(f64, f64)> {
            vec![(-10.0, 10.0), (-10.0, 10.0)]
        }
        fn cost(&self, x: &[f64]) -> f64 {
            (0..2).map(|j| ((x[j] - self.mu[j]) / self.sigma[j]).powi(2)).sum()
        }
    }

    fn target() -> Gaussian {
        Gaussian {
            mu: [1.0, -2.0],
            sigma: [0.5, 1.5],
        }
    }

    fn options(seed: u64) -> SamplerOptions {
        SamplerOptions {
            walkers: 16,
            steps: 3_000,
            burn: 500,
            thin: 2,
            seed,
        }
    }

    #[test]
    fn recovers_gaussian_moments() {
        let s = sample(&target(), &[1.0, -2.0], &options(5), &CancelToken::new()).unwrap();
        assert_eq!(s.walkers, 16);
        assert_eq!(s.kept(), 1_250);
        let acc = s.acceptance_fraction();
        assert!(acc > 0.2 && acc < 0.9, "acceptance {acc}");
        assert_eq!(s.status, ConvergenceStatus::Converged);

        for (j, (mu, sigma)) in [(1.0, 0.5), (-2.0, 1.5)].into_iter().enumerate() {
            let all: Vec<f64> = s.marginal_chains(j).concat();
            let m = mean(&all).unwrap();
            let sd = variance(&all).unwrap().sqrt();
            assert!((m - mu).abs() < 0.2 * sigma, "mean {m} vs {mu}");
            assert!((sd / sigma - 1.0).abs() < 0.15, "std {sd} vs {sigma}");
        }
    }

    #[test]
    fn seeded_runs_are_identical() {
        let opts = SamplerOptions {
            steps: 200,
            burn: 50,
            ..options(9)
        };
        let a = sample(&target(), &[0.0, 0.0], &opts, &CancelToken::new()).unwrap();
        let b = sample(&target(), &[0.0, 0.0], &opts, &CancelToken::new()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn walker_count_is_even_and_large_enough() {
        let opts = SamplerOptions {
            walkers: 0,
            ..options(0)
        };
        assert_eq!(opts.walker_count(3), 8);
        let opts = SamplerOptions {
            walkers: 11,
            ..options(0)
        };
        assert_eq!(opts.walker_count(2), 12);
    }

    #[test]
    fn burn_in_must_leave_samples() {
        let opts = SamplerOptions {
            steps: 100,
            burn: 100,
            ..options(0)
        };
        let err = sample(&target(), &[0.0, 0.0], &opts, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, FitError::InvalidParameter { .. }));
    }

    #[test]
    fn cancelled_before_the_first_step() {
        let token = CancelToken::new();
        token.cancel();
        let s = sample(&target(), &[0.0, 0.0], &options(1), &token).unwrap();
        assert_eq!(s.status, ConvergenceStatus::Cancelled);
        assert_eq!(s.steps, 0);
        assert_eq!(s.kept(), 0);
        assert_eq!(s.acceptance_fraction(), 0.0);
    }

    #[test]
    fn samples_stay_inside_bounds() {
        struct Edge;
        impl CostFunction for Edge {
            fn dimension(&self) -> usize {
                1
            }
            fn bounds(&self) -> Vec<(f64, f64)> {
                vec![(0.0, 1.0)]
            }
            fn cost(&self, x: &[f64]) -> f64 {
                // Density piles up against the lower bound.
                4.0 * x[0]
            }
        }
        let opts = SamplerOptions {
            steps: 400,
            burn: 100,
            ..options(3)
        };
        let s = sample(&Edge, &[0.1], &opts, &CancelToken::new()).unwrap();
        assert!(s.chains.iter().flatten().all(|x| (0.0..=1.0).contains(&x[0])));
    }
}
