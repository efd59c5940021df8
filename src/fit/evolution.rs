//! Differential evolution (`best/1/bin` with dither).
//!
//! Each generation builds one trial per member:
//!
//! - mutant `b + F · (r1 − r2)` around the current best `b`, with `F` drawn
//!   from `[0.5, 1)` once per generation
//! - binomial crossover with the member (rate `CR`, one forced component)
//! - components that leave the unit cube are redrawn uniformly
//!
//! Every random number is drawn sequentially from one seeded `StdRng` before
//! the trials are evaluated; the evaluation itself is a parallel map that
//! consumes no randomness. A run is therefore bit-identical for a given seed
//! regardless of the worker count.
//!
//! The search stops when the standard deviation of the population costs falls
//! below `spread_tolerance` times their mean. The optimum can then be refined
//! by Nelder–Mead.

use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::domain::{ConvergenceStatus, FitSettings};
use crate::error::{FitError, FitResultOf};
use crate::fit::cancel::CancelToken;
use crate::fit::nelder_mead::{self, NelderMeadOptions};
use crate::fit::objective::{CostFunction, Minimum};
use crate::fit::params::{from_unit, to_unit};
use crate::math::{mean, variance};

const CROSSOVER: f64 = 0.7;
const DITHER: (f64, f64) = (0.5, 1.0);
const MIN_POPULATION: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionOptions {
    /// Population size as a multiple of the dimension.
    pub population: usize,
    pub max_generations: usize,
    pub spread_tolerance: f64,
    pub seed: u64,
    pub polish: bool,
    /// Settings of the polishing run.
    pub polish_options: NelderMeadOptions,
}

impl EvolutionOptions {
    pub fn from_settings(settings: &FitSettings) -> Self {
        Self {
            population: settings.population,
            max_generations: settings.max_iterations,
            spread_tolerance: settings.spread_tolerance,
            seed: settings.seed,
            polish: settings.polish,
            polish_options: NelderMeadOptions::from_settings(settings),
        }
    }
}

/// Minimize `f` over its bounds. `x0` seeds one population member.
pub fn minimize<F>(f: &F, x0: &[f64], opts: &EvolutionOptions, cancel: &CancelToken) -> FitResultOf<Minimum>
where
    F: CostFunction + ?Sized,
{
    let bounds = f.bounds();
    let dim = bounds.len();
    if x0.len() != dim {
        return Err(FitError::invalid_parameter(format!(
            "start vector has {} entries, the cost has {dim} dimensions",
            x0.len()
        )));
    }
    if dim == 0 {
        return nelder_mead::minimize(f, x0, &opts.polish_options, cancel);
    }

    let mut rng = StdRng::seed_from_u64(opts.seed);
    let size = (opts.population * dim).max(MIN_POPULATION);

    let mut members: Vec<Vec<f64>> = Vec::with_capacity(size);
    members.push(to_unit(&bounds, x0));
    while members.len() < size {
        members.push((0..dim).map(|_| rng.r#gen::<f64>()).collect());
    }
    let mut costs = evaluate(f, &bounds, &members, 0, None)?;
    let mut evaluations = size;

    let mut generation = 0;
    let mut status = ConvergenceStatus::MaxIterations;
    loop {
        if spread_converged(&costs, opts.spread_tolerance) {
            status = ConvergenceStatus::Converged;
            break;
        }
        if generation >= opts.max_generations {
            break;
        }
        if cancel.is_cancelled() {
            status = ConvergenceStatus::Cancelled;
            break;
        }
        generation += 1;

        let best = best_index(&costs);
        let scale = rng.gen_range(DITHER.0..DITHER.1);
        let trials: Vec<Vec<f64>> = (0..size)
            .map(|i| {
                let (r1, r2) = pick_two(&mut rng, size, i, best);
                let forced = rng.gen_range(0..dim);
                (0..dim)
                    .map(|j| {
                        let cross = rng.r#gen::<f64>() < CROSSOVER || j == forced;
                        if !cross {
                            return members[i][j];
                        }
                        let v = members[best][j] + scale * (members[r1][j] - members[r2][j]);
                        if (0.0..=1.0).contains(&v) { v } else { rng.r#gen::<f64>() }
                    })
                    .collect()
            })
            .collect();

        let trial_costs = evaluate(f, &bounds, &trials, generation, Some(&members[best]))?;
        evaluations += size;
        for (i, (trial, cost)) in trials.into_iter().zip(trial_costs).enumerate() {
            if cost <= costs[i] {
                members[i] = trial;
                costs[i] = cost;
            }
        }

        if generation % 50 == 0 {
            tracing::debug!(generation, best = costs[best_index(&costs)], "differential evolution progress");
        }
    }

    let best = best_index(&costs);
    let mut minimum = Minimum {
        x: from_unit(&bounds, &members[best]),
        cost: costs[best],
        iterations: generation,
        evaluations,
        status,
    };
    tracing::debug!(
        generations = generation,
        cost = minimum.cost,
        status = status.display_name(),
        "differential evolution finished"
    );

    if opts.polish && status != ConvergenceStatus::Cancelled {
        let polished = nelder_mead::minimize(f, &minimum.x, &opts.polish_options, cancel)?;
        minimum.evaluations += polished.evaluations;
        if polished.cost < minimum.cost {
            minimum.x = polished.x;
            minimum.cost = polished.cost;
        }
        if polished.status == ConvergenceStatus::Cancelled {
            minimum.status = ConvergenceStatus::Cancelled;
        }
    }
    Ok(minimum)
}

fn evaluate<F>(
    f: &F,
    bounds: &[(f64, f64)],
    members: &[Vec<f64>],
    generation: usize,
    best: Option<&Vec<f64>>,
) -> FitResultOf<Vec<f64>>
where
    F: CostFunction + ?Sized,
{
    let costs: Vec<f64> = members.par_iter().map(|u| f.cost(&from_unit(bounds, u))).collect();
    if let Some(k) = costs.iter().position(|c| !c.is_finite()) {
        return Err(FitError::Optimization {
            reason: "non-finite cost".to_string(),
            iteration: generation,
            vector: from_unit(bounds, &members[k]),
            last_valid: best.map(|b| from_unit(bounds, b)),
        });
    }
    Ok(costs)
}

/// Lowest cost; the first member wins ties.
fn best_index(costs: &[f64]) -> usize {
    let mut best = 0;
    for (i, c) in costs.iter().enumerate().skip(1) {
        if *c < costs[best] {
            best = i;
        }
    }
    best
}

/// Two distinct members different from `i` and, when possible, from `best`.
fn pick_two(rng: &mut StdRng, size: usize, i: usize, best: usize) -> (usize, usize) {
    let avoid_best = size > 3 && best != i;
    let pick = |rng: &mut StdRng, taken: &[usize]| loop {
        let r = rng.gen_range(0..size);
        if !taken.contains(&r) {
            return r;
        }
    };
    let mut taken = vec![i];
    if avoid_best {
        taken.push(best);
    }
    let r1 = pick(rng, &taken);
    taken.push(r1);
    let r2 = pick(rng, &taken);
    (r1, r2)
}

fn spread_converged(costs: &[f64], tolerance: f64) -> bool {
    match (mean(costs), variance(costs)) {
        (Some(m), Some(v)) => v.sqrt() <= tolerance * m.abs(),
        _ => true,
    }
}
