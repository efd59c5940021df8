//! Point-estimate uncertainties from the curvature of the cost.
//!
//! The Hessian is taken by central differences in unit-cube coordinates, so a
//! single step suits every parameter. All stencil points are evaluated as one
//! parallel batch. The covariance `2·H⁺` is mapped back to parameter units by
//! the bound widths.

use nalgebra::DMatrix;
use rayon::prelude::*;

use crate::error::PrecisionWarning;
use crate::fit::objective::{CostFunction, PENALTY_COST};
use crate::fit::params::{from_unit, to_unit};
use crate::math::covariance_from_chi2_hessian;

/// Finite-difference step in unit coordinates.
pub const HESSIAN_STEP: f64 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct Uncertainties {
    /// One-sigma error per free parameter; `None` when undetermined.
    pub sigma: Vec<Option<f64>>,
    /// Parameter-space covariance, when the stencil could be evaluated.
    pub covariance: Option<DMatrix<f64>>,
    pub warnings: Vec<PrecisionWarning>,
}

impl Uncertainties {
    fn unavailable(dim: usize, message: &str) -> Self {
        Self {
            sigma: vec![None; dim],
            covariance: None,
            warnings: vec![PrecisionWarning::general(message)],
        }
    }
}

/// Uncertainties at `x`, with the covariance multiplied by `scale`
/// (the reduced chi-square, or 1).
pub fn estimate<F>(f: &F, x: &[f64], scale: f64) -> Uncertainties
where
    F: CostFunction + ?Sized,
{
    let bounds = f.bounds();
    let n = bounds.len();
    if n == 0 {
        return Uncertainties {
            sigma: Vec::new(),
            covariance: None,
            warnings: Vec::new(),
        };
    }
    let h = HESSIAN_STEP;
    let center: Vec<f64> = to_unit(&bounds, x)
        .into_iter()
        .map(|u| u.clamp(2.0 * h, 1.0 - 2.0 * h))
        .collect();

    let stencil = stencil(&center, h);
    let costs: Vec<f64> = stencil
        .par_iter()
        .map(|(_, u)| f.cost(&from_unit(&bounds, u)))
        .collect();
    if costs.iter().any(|c| !c.is_finite() || *c >= PENALTY_COST) {
        return Uncertainties::unavailable(
            n,
            "uncertainties unavailable: the Hessian stencil leaves the model domain",
        );
    }

    let at = |key: Key| -> f64 {
        stencil
            .iter()
            .position(|(k, _)| *k == key)
            .map_or(f64::NAN, |p| costs[p])
    };
    let c0 = at(Key::Center);
    let mut hess = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        hess[(i, i)] = (at(Key::Plus(i)) - 2.0 * c0 + at(Key::Minus(i))) / (h * h);
        for j in 0..i {
            let v = (at(Key::Pair(i, j, 1, 1)) - at(Key::Pair(i, j, 1, -1)) - at(Key::Pair(i, j, -1, 1))
                + at(Key::Pair(i, j, -1, -1)))
                / (4.0 * h * h);
            hess[(i, j)] = v;
            hess[(j, i)] = v;
        }
    }

    let (cov_unit, dropped) = covariance_from_chi2_hessian(&hess);
    let widths: Vec<f64> = bounds.iter().map(|(lo, hi)| hi - lo).collect();
    let cov = DMatrix::from_fn(n, n, |i, j| cov_unit[(i, j)] * widths[i] * widths[j] * scale);

    let sigma: Vec<Option<f64>> = (0..n)
        .map(|i| {
            let v = cov[(i, i)];
            (v.is_finite() && v > 0.0).then(|| v.sqrt())
        })
        .collect();

    let mut warnings = Vec::new();
    if dropped > 0 {
        warnings.push(PrecisionWarning::general(format!(
            "{dropped} flat or concave direction(s) in the cost; correlated parameters are poorly determined"
        )));
    }
    Uncertainties {
        sigma,
        covariance: Some(cov),
        warnings,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Key {
    Center,
    Plus(usize),
    Minus(usize),
    Pair(usize, usize, i8, i8),
}

fn stencil(center: &[f64], h: f64) -> Vec<(Key, Vec<f64>)> {
    let n = center.len();
    let shifted = |moves: &[(usize, f64)]| {
        let mut u = center.to_vec();
        for &(i, d) in moves {
            u[i] += d;
        }
        u
    };
    let mut points = vec![(Key::Center, center.to_vec())];
    for i in 0..n {
        points.push((Key::Plus(i), shifted(&[(i, h)])));
        points.push((Key::Minus(i), shifted(&[(i, -h)])));
        for j in 0..i {
            for (si, sj) in [(1i8, 1i8), (1, -1), (-1, 1), (-1, -1)] {
                let u = shifted(&[(i, si as f64 * h), (j, sj as f64 * h)]);
                points.push((Key::Pair(i, j, si, sj), u));
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Correlated quadratic chi-square with known covariance.
    struct Quadratic;

    impl CostFunction for Quadratic {
        fn dimension(&self) -> usize {
            2
        }
        fn bounds(&self) -> Vec<(f64, f64)> {
            vec![(0.0, 200.0), (0.0, 1.0e-5)]
        }
        fn cost(&self, x: &[f64]) -> f64 {
            let a = (x[0] - 100.0) / 2.0;
            let b = (x[1] - 4.0e-6) / 1.0e-7;
            a * a + b * b
        }
    }

    #[test]
    fn recovers_sigmas_in_parameter_units() {
        let u = estimate(&Quadratic, &[100.0, 4.0e-6], 1.0);
        assert!(u.warnings.is_empty());
        assert_relative_eq!(u.sigma[0].unwrap(), 2.0, max_relative = 1e-4);
        assert_relative_eq!(u.sigma[1].unwrap(), 1.0e-7, max_relative = 1e-4);
        let cov = u.covariance.unwrap();
        assert!(cov[(0, 1)].abs() < 1e-6 * (2.0 * 1.0e-7));
    }

    #[test]
    fn scaling_multiplies_the_variance() {
        let u = estimate(&Quadratic, &[100.0, 4.0e-6], 4.0);
        assert_relative_eq!(u.sigma[0].unwrap(), 4.0, max_relative = 1e-4);
    }

    #[test]
    fn flat_directions_are_undetermined() {
        struct Flat;
        impl CostFunction for Flat {
            fn dimension(&self) -> usize {
                2
            }
            fn bounds(&self) -> Vec<(f64, f64)> {
                vec![(-1.0, 1.0); 2]
            }
            fn cost(&self, x: &[f64]) -> f64 {
                x[0] * x[0]
            }
        }
        let u = estimate(&Flat, &[0.0, 0.3], 1.0);
        assert!(u.sigma[0].is_some());
        assert!(u.sigma[1].is_none());
        assert_eq!(u.warnings.len(), 1);
    }

    #[test]
    fn penalty_in_the_stencil_gives_no_uncertainty() {
        struct Wall;
        impl CostFunction for Wall {
            fn dimension(&self) -> usize {
                1
            }
            fn bounds(&self) -> Vec<(f64, f64)> {
                vec![(0.0, 1.0)]
            }
            fn cost(&self, x: &[f64]) -> f64 {
                if x[0] > 0.5 { PENALTY_COST } else { (x[0] - 0.5).powi(2) }
            }
        }
        let u = estimate(&Wall, &[0.5], 1.0);
        assert_eq!(u.sigma, vec![None]);
        assert!(u.covariance.is_none());
    }
}
