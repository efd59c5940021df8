//! Instrument resolution smearing.
//!
//! The theory curve is computed on a fine Q grid and folded onto the measured
//! points with a Gaussian of standard deviation σ(Q). Widths in the
//! configuration are FWHM; they are converted once, here.
//!
//! A [`ConvolutionPlan`] holds one sparse row of weights per measured point:
//! trapezoid quadrature over the fine points within `±3.5σ`, multiplied by the
//! Gaussian and normalized to sum 1. Normalizing per row is what renormalizes
//! kernels truncated at the edge of the fine grid (typically at Q = 0), so a
//! constant curve stays constant everywhere.

use crate::domain::Resolution;
use crate::error::{FitError, FitResultOf, PrecisionWarning};

/// `1 / (2 √(2 ln 2))`: Gaussian FWHM to standard deviation.
pub const FWHM_TO_SIGMA: f64 = 0.424_660_900_144_009_5;

/// Kernel support in units of σ.
pub const KERNEL_HALF_WIDTH: f64 = 3.5;

/// Below this σ (Å⁻¹) a point is treated as unsmeared.
const MIN_SIGMA: f64 = 1e-12;

/// Per-point Gaussian σ for a resolution model, or `None` when there is no smearing.
///
/// `dq` is the dataset's FWHM column, required by [`Resolution::Pointwise`].
pub fn kernel_sigmas(resolution: &Resolution, q: &[f64], dq: Option<&[f64]>) -> FitResultOf<Option<Vec<f64>>> {
    match *resolution {
        Resolution::None => Ok(None),
        Resolution::Constant { dq } => {
            check_width("dq", dq)?;
            Ok(Some(vec![dq * FWHM_TO_SIGMA; q.len()]))
        }
        Resolution::Fractional { dq_over_q } => {
            check_width("dq_over_q", dq_over_q)?;
            Ok(Some(q.iter().map(|&qq| qq * dq_over_q * FWHM_TO_SIGMA).collect()))
        }
        Resolution::Pointwise => {
            let dq = dq.ok_or_else(|| {
                FitError::invalid_resolution("pointwise resolution needs a dQ column in the dataset")
            })?;
            if dq.len() != q.len() {
                return Err(FitError::invalid_resolution(format!(
                    "{} dQ values for {} Q points",
                    dq.len(),
                    q.len()
                )));
            }
            for &w in dq {
                check_width("dQ", w)?;
            }
            Ok(Some(dq.iter().map(|w| w * FWHM_TO_SIGMA).collect()))
        }
    }
}

fn check_width(what: &str, width: f64) -> FitResultOf<()> {
    if width.is_finite() && width > 0.0 {
        Ok(())
    } else {
        Err(FitError::invalid_resolution(format!(
            "{what} must be finite and > 0, got {width}"
        )))
    }
}

/// Fine evaluation grid: every target point plus `points_per_kernel` evenly
/// spaced stencil points across each kernel. Negative Q values are dropped.
pub fn fine_grid(target_q: &[f64], sigmas: &[f64], points_per_kernel: usize) -> FitResultOf<Vec<f64>> {
    if points_per_kernel < 3 {
        return Err(FitError::invalid_resolution(format!(
            "at least 3 points per kernel are needed, got {points_per_kernel}"
        )));
    }
    if sigmas.len() != target_q.len() {
        return Err(FitError::invalid_resolution("one width per Q point is required"));
    }

    let span = 2.0 * KERNEL_HALF_WIDTH / (points_per_kernel as f64 - 1.0);
    let mut grid = Vec::with_capacity(target_q.len() * points_per_kernel);
    for (&q, &sigma) in target_q.iter().zip(sigmas) {
        grid.push(q);
        if sigma < MIN_SIGMA {
            continue;
        }
        for k in 0..points_per_kernel {
            let u = -KERNEL_HALF_WIDTH + span * k as f64;
            let x = q + sigma * u;
            if x >= 0.0 {
                grid.push(x);
            }
        }
    }
    grid.sort_by(f64::total_cmp);
    grid.dedup();
    Ok(grid)
}

/// Precomputed smearing weights from a fine grid onto target points.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionPlan {
    fine_q: Vec<f64>,
    rows: Vec<Vec<(usize, f64)>>,
    warnings: Vec<PrecisionWarning>,
}

impl ConvolutionPlan {
    /// No smearing: the fine grid is the target grid.
    pub fn identity(target_q: &[f64]) -> Self {
        Self {
            fine_q: target_q.to_vec(),
            rows: (0..target_q.len()).map(|i| vec![(i, 1.0)]).collect(),
            warnings: Vec::new(),
        }
    }

    pub fn new(fine_q: Vec<f64>, target_q: &[f64], sigmas: &[f64]) -> FitResultOf<Self> {
        if fine_q.is_empty() {
            return Err(FitError::invalid_resolution("the fine grid is empty"));
        }
        if fine_q.iter().any(|q| !q.is_finite()) || fine_q.windows(2).any(|w| w[1] <= w[0]) {
            return Err(FitError::invalid_resolution(
                "the fine grid must be finite and strictly increasing",
            ));
        }
        if sigmas.len() != target_q.len() {
            return Err(FitError::invalid_resolution("one width per Q point is required"));
        }
        if let Some(bad) = sigmas.iter().find(|s| !(s.is_finite() && **s >= 0.0)) {
            return Err(FitError::invalid_resolution(format!(
                "kernel width must be finite and >= 0, got {bad}"
            )));
        }

        let mut rows = Vec::with_capacity(target_q.len());
        let mut warnings = Vec::new();
        for (i, (&q, &sigma)) in target_q.iter().zip(sigmas).enumerate() {
            let row = if sigma < MIN_SIGMA {
                None
            } else {
                gaussian_row(&fine_q, q, sigma, i, &mut warnings)
            };
            let row = match row {
                Some(row) => row,
                None => interpolation_row(&fine_q, q, i, &mut warnings),
            };
            rows.push(row);
        }

        Ok(Self {
            fine_q,
            rows,
            warnings,
        })
    }

    /// Plan for a resolution model on the given measured points.
    pub fn for_resolution(
        resolution: &Resolution,
        target_q: &[f64],
        dq: Option<&[f64]>,
        points_per_kernel: usize,
    ) -> FitResultOf<Self> {
        match kernel_sigmas(resolution, target_q, dq)? {
            None => Ok(Self::identity(target_q)),
            Some(sigmas) => {
                let fine = fine_grid(target_q, &sigmas, points_per_kernel)?;
                Self::new(fine, target_q, &sigmas)
            }
        }
    }

    /// Q values the theory curve must be evaluated on.
    pub fn fine_q(&self) -> &[f64] {
        &self.fine_q
    }

    /// Points whose kernel had to be truncated or replaced.
    pub fn warnings(&self) -> &[PrecisionWarning] {
        &self.warnings
    }

    /// Smear a curve sampled on [`fine_q`](Self::fine_q) onto the target points.
    pub fn apply(&self, fine_r: &[f64]) -> FitResultOf<Vec<f64>> {
        if fine_r.len() != self.fine_q.len() {
            return Err(FitError::invalid_resolution(format!(
                "curve has {} points, the plan expects {}",
                fine_r.len(),
                self.fine_q.len()
            )));
        }
        Ok(self
            .rows
            .iter()
            .map(|row| row.iter().map(|&(j, w)| w * fine_r[j]).sum())
            .collect())
    }
}

fn gaussian_row(
    fine_q: &[f64],
    q: f64,
    sigma: f64,
    index: usize,
    warnings: &mut Vec<PrecisionWarning>,
) -> Option<Vec<(usize, f64)>> {
    let slack = 1e-9 * sigma;
    let lo = q - KERNEL_HALF_WIDTH * sigma;
    let hi = q + KERNEL_HALF_WIDTH * sigma;
    let start = fine_q.partition_point(|&x| x < lo - slack);
    let end = fine_q.partition_point(|&x| x <= hi + slack);
    if end < start + 3 {
        return None;
    }

    let mut row = Vec::with_capacity(end - start);
    let mut total = 0.0;
    for j in start..end {
        let left = if j > start { fine_q[j] - fine_q[j - 1] } else { 0.0 };
        let right = if j + 1 < end { fine_q[j + 1] - fine_q[j] } else { 0.0 };
        let z = (fine_q[j] - q) / sigma;
        let w = (-0.5 * z * z).exp() * 0.5 * (left + right);
        total += w;
        row.push((j, w));
    }
    if !(total.is_finite() && total > 0.0) {
        return None;
    }
    for entry in &mut row {
        entry.1 /= total;
    }

    let last = fine_q.len() - 1;
    if lo + slack < fine_q[0] || hi - slack > fine_q[last] {
        warnings.push(PrecisionWarning::at(
            index,
            q,
            "resolution kernel truncated at the edge of the model grid; weights renormalized",
        ));
    }
    Some(row)
}

/// Zero-width limit: linear interpolation of the fine curve at `q`.
fn interpolation_row(fine_q: &[f64], q: f64, index: usize, warnings: &mut Vec<PrecisionWarning>) -> Vec<(usize, f64)> {
    let n = fine_q.len();
    let k = fine_q.partition_point(|&x| x < q);
    if k < n && fine_q[k] == q {
        return vec![(k, 1.0)];
    }
    if k == 0 || k == n {
        warnings.push(PrecisionWarning::at(
            index,
            q,
            "point lies outside the model grid; nearest model value used",
        ));
        return vec![(k.min(n - 1), 1.0)];
    }
    let (q0, q1) = (fine_q[k - 1], fine_q[k]);
    let u = (q - q0) / (q1 - q0);
    vec![(k - 1, 1.0 - u), (k, u)]
}
