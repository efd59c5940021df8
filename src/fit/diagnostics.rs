//! Posterior summaries from sampled chains.

use crate::domain::{PosteriorSummary, SamplingDiagnostics};
use crate::fit::mcmc::Sampling;
use crate::math::{gelman_rubin, histogram, mean, percentile_sorted, variance};

/// Percentiles bracketing one standard deviation of a Gaussian.
pub const ONE_SIGMA_PERCENTILES: (f64, f64) = (15.87, 84.13);

/// Summary of one parameter given its per-walker chains.
///
/// Returns `None` when no samples were kept.
pub fn summarize(chains: &[Vec<f64>], bins: usize) -> Option<PosteriorSummary> {
    let mut all: Vec<f64> = chains.iter().flatten().copied().collect();
    if all.is_empty() {
        return None;
    }
    let m = mean(&all)?;
    let std = variance(&all).map_or(0.0, f64::sqrt);
    let marginal = histogram(&all, bins);

    all.sort_by(f64::total_cmp);
    let median = percentile_sorted(&all, 50.0)?;
    let lower = percentile_sorted(&all, ONE_SIGMA_PERCENTILES.0)?;
    let upper = percentile_sorted(&all, ONE_SIGMA_PERCENTILES.1)?;

    Some(PosteriorSummary {
        median,
        mean: m,
        std,
        lower,
        upper,
        r_hat: gelman_rubin(chains).filter(|r| r.is_finite()),
        marginal,
    })
}

/// Summaries for every free parameter of a run, in vector order.
pub fn summarize_all(sampling: &Sampling, dim: usize, bins: usize) -> Vec<Option<PosteriorSummary>> {
    (0..dim)
        .map(|j| summarize(&sampling.marginal_chains(j), bins))
        .collect()
}

pub fn sampling_diagnostics(sampling: &Sampling, dim: usize) -> SamplingDiagnostics {
    SamplingDiagnostics {
        walkers: sampling.walkers,
        steps: sampling.steps,
        burn: sampling.burn,
        thin: sampling.thin,
        samples: sampling.kept() * sampling.walkers,
        acceptance_fraction: sampling.acceptance_fraction(),
        max_r_hat: sampling.max_r_hat(dim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn summary_of_a_uniform_grid() {
        let a: Vec<f64> = (0..=50).map(|i| i as f64).collect();
        let b: Vec<f64> = (50..=100).map(|i| i as f64).collect();
        let s = summarize(&[a, b], 10).unwrap();
        assert_relative_eq!(s.median, 50.0);
        assert_relative_eq!(s.mean, 50.0);
        assert!(s.lower < s.median && s.median < s.upper);
        assert_relative_eq!(s.lower, 15.87 * 101.0 / 100.0, epsilon = 0.05);
        assert_eq!(s.marginal.counts.iter().sum::<usize>(), 102);
        // Disjoint halves: the walkers clearly disagree.
        assert!(s.r_hat.unwrap() > 1.5);
    }

    #[test]
    fn empty_chains_have_no_summary() {
        assert!(summarize(&[Vec::new(), Vec::new()], 10).is_none());
    }
}
