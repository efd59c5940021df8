//! Reporting utilities: outlier rankings, goodness of fit and formatted terminal output.

pub mod format;

pub use format::*;

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::domain::{FitResult, ResidualPoint};

/// Points with the largest normalized residuals (top-N each side).
#[derive(Debug, Clone)]
pub struct Outliers {
    /// Measured above the model.
    pub high: Vec<ResidualPoint>,
    /// Measured below the model.
    pub low: Vec<ResidualPoint>,
}

/// Rank points by normalized residual.
pub fn rank_outliers(residuals: &[ResidualPoint], top_n: usize) -> Outliers {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| b.normalized.total_cmp(&a.normalized));

    let high = sorted.iter().filter(|r| r.normalized > 0.0).take(top_n).copied().collect();
    let low = sorted
        .iter()
        .rev()
        .filter(|r| r.normalized < 0.0)
        .take(top_n)
        .copied()
        .collect();

    Outliers { high, low }
}

/// Probability of a chi-square at least this large if the model were exact.
///
/// Only meaningful for a linear-space cost with Gaussian errors; `None` when
/// there are no degrees of freedom left.
pub fn chi2_p_value(result: &FitResult) -> Option<f64> {
    let dof = result.n_points.checked_sub(result.n_free).filter(|d| *d > 0)?;
    let dist = ChiSquared::new(dof as f64).ok()?;
    Some(1.0 - dist.cdf(result.cost))
}
