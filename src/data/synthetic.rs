//! Synthetic reflectivity curves.
//!
//! A curve is the model's starting point evaluated on a Q grid, smeared with
//! the configured resolution and, optionally, perturbed with multiplicative
//! log-normal noise. Error bars are the requested fraction of the noiseless
//! curve. The noise is mean-corrected so `E[R_obs] = R`.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Dataset, ModelConfig, Resolution};
use crate::error::{FitError, FitResultOf};
use crate::fit::ParameterSpace;
use crate::math::{lin_space, log_space};
use crate::models::{reflectivity, ConvolutionPlan, EngineOptions};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulateOptions {
    pub q_min: f64,
    pub q_max: f64,
    pub points: usize,
    /// Logarithmic instead of linear Q spacing.
    pub log_grid: bool,
    /// Relative one-sigma error bar (`dR / R`).
    pub relative_error: f64,
    /// Add noise consistent with the error bars.
    pub noise: bool,
    pub seed: u64,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            q_min: 0.005,
            q_max: 0.3,
            points: 200,
            log_grid: false,
            relative_error: 0.05,
            noise: false,
            seed: 0,
        }
    }
}

/// Simulate a measurement of `config`'s starting model.
///
/// Constant and fractional resolutions are written to the dQ column so the
/// dataset can be refitted with [`Resolution::Pointwise`].
pub fn simulate(config: &ModelConfig, opts: &SimulateOptions) -> FitResultOf<Dataset> {
    if !(opts.q_min.is_finite() && opts.q_min > 0.0) {
        return Err(FitError::invalid_dataset(format!("q_min must be > 0, got {}", opts.q_min)));
    }
    if !(opts.relative_error.is_finite() && opts.relative_error > 0.0) {
        return Err(FitError::invalid_dataset(format!(
            "relative error must be > 0, got {}",
            opts.relative_error
        )));
    }
    if config.resolution == Resolution::Pointwise {
        return Err(FitError::invalid_resolution(
            "pointwise resolution needs measured dQ values; simulate with a constant or fractional width",
        ));
    }
    let q = if opts.log_grid {
        log_space(opts.q_min, opts.q_max, opts.points)?
    } else {
        lin_space(opts.q_min, opts.q_max, opts.points)?
    };

    let dq: Option<Vec<f64>> = match config.resolution {
        Resolution::None | Resolution::Pointwise => None,
        Resolution::Constant { dq } => Some(vec![dq; q.len()]),
        Resolution::Fractional { dq_over_q } => Some(q.iter().map(|v| v * dq_over_q).collect()),
    };

    let space = ParameterSpace::from_config(config)?;
    let model = space.initial_model()?;
    let engine = EngineOptions {
        subdivisions: config.fit.subdivisions,
        microslice: config.fit.microslice,
    };
    let plan = ConvolutionPlan::for_resolution(&config.resolution, &q, dq.as_deref(), config.fit.kernel_points)?;
    let ideal: Vec<f64> = plan
        .apply(&reflectivity(&model.stack, plan.fine_q(), &engine)?)?
        .into_iter()
        .map(|r| model.scale * r + model.background)
        .collect();

    let dr: Vec<f64> = ideal.iter().map(|r| opts.relative_error * r.abs().max(f64::MIN_POSITIVE)).collect();
    let r = if opts.noise {
        let mut rng = StdRng::seed_from_u64(opts.seed);
        let normal = Normal::new(0.0, 1.0).map_err(|e| FitError::invalid_dataset(format!("noise distribution: {e}")))?;
        let s = opts.relative_error;
        ideal
            .iter()
            .map(|r| {
                let z = normal.sample(&mut rng);
                r * (s * z - 0.5 * s * s).exp()
            })
            .collect()
    } else {
        ideal
    };

    tracing::debug!(points = q.len(), noise = opts.noise, seed = opts.seed, "simulated dataset");
    Dataset::from_columns(&q, &r, &dr, dq.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LayerConfig, ParamConfig};

    fn config() -> ModelConfig {
        ModelConfig {
            layers: vec![
                LayerConfig {
                    name: Some("air".to_string()),
                    sld: 0.0.into(),
                    roughness: 2.0.into(),
                    ..Default::default()
                },
                LayerConfig {
                    name: Some("film".to_string()),
                    thickness: 150.0.into(),
                    sld: 3.0e-6.into(),
                    roughness: 4.0.into(),
                    ..Default::default()
                },
                LayerConfig {
                    name: Some("si".to_string()),
                    sld: 2.07e-6.into(),
                    ..Default::default()
                },
            ],
            scale: ParamConfig::Fixed(1.0),
            background: ParamConfig::Fixed(1e-7),
            resolution: Resolution::Fractional { dq_over_q: 0.05 },
            fit: Default::default(),
        }
    }

    #[test]
    fn noiseless_curve_carries_resolution_and_error_bars() {
        let data = simulate(&config(), &SimulateOptions::default()).unwrap();
        assert_eq!(data.len(), 200);
        let p = data.points()[10];
        assert_eq!(p.dq, Some(p.q * 0.05));
        approx::assert_relative_eq!(p.dr, 0.05 * p.r, max_relative = 1e-12);
        // Total reflection below the critical edge of silicon.
        assert!(data.points()[0].r > 0.9);
    }

    #[test]
    fn noise_is_seeded() {
        let opts = SimulateOptions {
            noise: true,
            seed: 5,
            ..SimulateOptions::default()
        };
        let a = simulate(&config(), &opts).unwrap();
        let b = simulate(&config(), &opts).unwrap();
        assert_eq!(a, b);
        let c = simulate(&config(), &SimulateOptions { seed: 6, ..opts }).unwrap();
        assert_ne!(a, c);
        let clean = simulate(&config(), &SimulateOptions::default()).unwrap();
        assert_ne!(a.r(), clean.r());
    }

    #[test]
    fn log_grid_and_bad_range() {
        let opts = SimulateOptions {
            log_grid: true,
            points: 50,
            ..SimulateOptions::default()
        };
        let data = simulate(&config(), &opts).unwrap();
        let q = data.q();
        approx::assert_relative_eq!(q[1] / q[0], q[49] / q[48], max_relative = 1e-9);

        let bad = SimulateOptions {
            q_min: 0.0,
            ..SimulateOptions::default()
        };
        assert!(matches!(simulate(&config(), &bad), Err(FitError::InvalidDataset { .. })));
    }
}
