//! Summary statistics for sampled chains.

use crate::domain::Marginal;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased sample variance (`n - 1` denominator).
pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (values.len() as f64 - 1.0))
}

/// Percentile (`p` in `[0, 100]`) with linear interpolation between order statistics.
///
/// `sorted` must be sorted ascending.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !p.is_finite() {
        return None;
    }
    let p = p.clamp(0.0, 100.0);
    let pos = p / 100.0 * (sorted.len() as f64 - 1.0);
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Equal-width histogram over the sample range.
pub fn histogram(values: &[f64], bins: usize) -> Marginal {
    let bins = bins.max(1);
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &v in values.iter().filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !(lo.is_finite() && hi.is_finite()) {
        return Marginal {
            edges: Vec::new(),
            counts: Vec::new(),
        };
    }
    if hi <= lo {
        // Degenerate sample: one bin centred on the value.
        let pad = lo.abs().max(1.0) * 1e-9;
        lo -= pad;
        hi += pad;
    }

    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();
    let mut counts = vec![0usize; bins];
    for &v in values.iter().filter(|v| v.is_finite()) {
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Marginal { edges, counts }
}

/// Gelman-Rubin potential scale reduction factor.
///
/// Each inner slice is one chain. Requires at least 2 chains of equal length >= 2.
/// Values close to 1 indicate the chains sample the same distribution.
pub fn gelman_rubin(chains: &[Vec<f64>]) -> Option<f64> {
    let m = chains.len();
    if m < 2 {
        return None;
    }
    let n = chains[0].len();
    if n < 2 || chains.iter().any(|c| c.len() != n) {
        return None;
    }

    let chain_means: Vec<f64> = chains.iter().map(|c| mean(c)).collect::<Option<_>>()?;
    let chain_vars: Vec<f64> = chains.iter().map(|c| variance(c)).collect::<Option<_>>()?;
    let grand_mean = mean(&chain_means)?;

    let n_f = n as f64;
    let w = mean(&chain_vars)?;
    let b = n_f / (m as f64 - 1.0)
        * chain_means
            .iter()
            .map(|cm| (cm - grand_mean) * (cm - grand_mean))
            .sum::<f64>();

    if w <= 0.0 {
        return Some(if b <= 0.0 { 1.0 } else { f64::INFINITY });
    }

    let var_hat = (n_f - 1.0) / n_f * w + b / n_f;
    Some((var_hat / w).sqrt())
}
