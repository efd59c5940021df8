//! Nelder–Mead simplex minimization.
//!
//! The search runs in unit-cube coordinates (`0..1` per parameter between its
//! bounds) so one step size suits thicknesses in Å and SLDs in 1e-6 Å⁻²
//! alike. Vertices that leave the cube are not clipped; the objective prices
//! them at the penalty cost and the simplex walks back.
//!
//! Convergence needs both a small cost spread across the simplex and a small
//! simplex (`√tolerance` in unit coordinates).

use rayon::prelude::*;

use crate::domain::{ConvergenceStatus, FitSettings};
use crate::error::{FitError, FitResultOf};
use crate::fit::cancel::CancelToken;
use crate::fit::objective::{CostFunction, Minimum};
use crate::fit::params::{from_unit, to_unit};

const REFLECT: f64 = 1.0;
const EXPAND: f64 = 2.0;
const CONTRACT: f64 = 0.5;
const SHRINK: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Initial simplex edge in unit coordinates.
    pub initial_step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 5_000,
            tolerance: 1e-8,
            initial_step: 0.1,
        }
    }
}

impl NelderMeadOptions {
    pub fn from_settings(settings: &FitSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            tolerance: settings.tolerance,
            ..Self::default()
        }
    }
}

/// Minimize `f` starting from `x0` (parameter coordinates).
pub fn minimize<F>(f: &F, x0: &[f64], opts: &NelderMeadOptions, cancel: &CancelToken) -> FitResultOf<Minimum>
where
    F: CostFunction + ?Sized,
{
    let bounds = f.bounds();
    let n = bounds.len();
    if x0.len() != n {
        return Err(FitError::invalid_parameter(format!(
            "start vector has {} entries, the cost has {n} dimensions",
            x0.len()
        )));
    }

    let eval = |u: &[f64]| f.cost(&from_unit(&bounds, u));
    let fail = |reason: &str, iteration: usize, u: &[f64], best: Option<&[f64]>| FitError::Optimization {
        reason: reason.to_string(),
        iteration,
        vector: from_unit(&bounds, u),
        last_valid: best.map(|b| from_unit(&bounds, b)),
    };

    if n == 0 {
        let cost = f.cost(&[]);
        if !cost.is_finite() {
            return Err(fail("non-finite cost", 0, x0, None));
        }
        return Ok(Minimum {
            x: Vec::new(),
            cost,
            iterations: 0,
            evaluations: 1,
            status: ConvergenceStatus::Converged,
        });
    }

    let u0 = to_unit(&bounds, x0);
    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(u0.clone());
    for i in 0..n {
        let mut v = u0.clone();
        v[i] += if u0[i] + opts.initial_step <= 1.0 {
            opts.initial_step
        } else {
            -opts.initial_step
        };
        simplex.push(v);
    }
    let mut costs: Vec<f64> = simplex.par_iter().map(|u| eval(u)).collect();
    let mut evaluations = n + 1;
    if let Some(k) = costs.iter().position(|c| !c.is_finite()) {
        return Err(fail("non-finite cost in the initial simplex", 0, &simplex[k], None));
    }

    let mut iterations = 0;
    let mut status = ConvergenceStatus::MaxIterations;
    loop {
        sort_simplex(&mut simplex, &mut costs);
        if converged(&simplex, &costs, opts.tolerance) {
            status = ConvergenceStatus::Converged;
            break;
        }
        if iterations >= opts.max_iterations {
            break;
        }
        if cancel.is_cancelled() {
            status = ConvergenceStatus::Cancelled;
            break;
        }
        iterations += 1;

        let worst = n;
        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v[j]).sum::<f64>() / n as f64)
            .collect();
        let towards = |from: &[f64], coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(from)
                .map(|(c, x)| c + coef * (x - c))
                .collect()
        };

        let reflected = towards(&simplex[worst], -REFLECT);
        let f_reflected = eval(&reflected);
        evaluations += 1;
        if !f_reflected.is_finite() {
            return Err(fail("non-finite cost", iterations, &reflected, Some(simplex[0].as_slice())));
        }

        if f_reflected < costs[0] {
            let expanded = towards(&reflected, EXPAND);
            let f_expanded = eval(&expanded);
            evaluations += 1;
            if !f_expanded.is_finite() {
                return Err(fail("non-finite cost", iterations, &expanded, Some(simplex[0].as_slice())));
            }
            if f_expanded < f_reflected {
                simplex[worst] = expanded;
                costs[worst] = f_expanded;
            } else {
                simplex[worst] = reflected;
                costs[worst] = f_reflected;
            }
            continue;
        }

        if f_reflected < costs[n - 1] {
            simplex[worst] = reflected;
            costs[worst] = f_reflected;
            continue;
        }

        let (contracted, bar) = if f_reflected < costs[worst] {
            (towards(&reflected, CONTRACT), f_reflected)
        } else {
            (towards(&simplex[worst], CONTRACT), costs[worst])
        };
        let f_contracted = eval(&contracted);
        evaluations += 1;
        if !f_contracted.is_finite() {
            return Err(fail("non-finite cost", iterations, &contracted, Some(simplex[0].as_slice())));
        }
        if f_contracted < bar {
            simplex[worst] = contracted;
            costs[worst] = f_contracted;
            continue;
        }

        // Shrink towards the best vertex.
        let best = simplex[0].clone();
        for v in simplex.iter_mut().skip(1) {
            for (x, b) in v.iter_mut().zip(&best) {
                *x = b + SHRINK * (*x - b);
            }
        }
        let shrunk: Vec<f64> = simplex[1..].par_iter().map(|u| eval(u)).collect();
        evaluations += n;
        for (k, c) in shrunk.into_iter().enumerate() {
            if !c.is_finite() {
                return Err(fail("non-finite cost", iterations, &simplex[k + 1], Some(best.as_slice())));
            }
            costs[k + 1] = c;
        }
    }

    tracing::debug!(
        iterations,
        evaluations,
        cost = costs[0],
        status = status.display_name(),
        "nelder-mead finished"
    );
    Ok(Minimum {
        x: from_unit(&bounds, &simplex[0]),
        cost: costs[0],
        iterations,
        evaluations,
        status,
    })
}

/// Order vertices by cost; ties keep their previous order.
fn sort_simplex(simplex: &mut Vec<Vec<f64>>, costs: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..costs.len()).collect();
    order.sort_by(|&a, &b| costs[a].total_cmp(&costs[b]));
    *simplex = order.iter().map(|&i| simplex[i].clone()).collect();
    *costs = order.iter().map(|&i| costs[i]).collect();
}

fn converged(simplex: &[Vec<f64>], costs: &[f64], tolerance: f64) -> bool {
    let best = costs[0];
    let spread = costs[costs.len() - 1] - best;
    if spread > tolerance * best.abs().max(1.0) {
        return false;
    }
    let extent = simplex[1..]
        .iter()
        .flat_map(|v| v.iter().zip(&simplex[0]).map(|(x, b)| (x - b).abs()))
        .fold(0.0_f64, f64::max);
    extent <= tolerance.sqrt()
}
