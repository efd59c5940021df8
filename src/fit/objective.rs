//! Goodness-of-fit between a measured curve and the model.
//!
//! For a free-parameter vector the objective rebuilds the model, evaluates
//! the matrix engine on the convolution plan's fine grid, smears onto the
//! measured points and applies the instrument terms:
//!
//! ```text
//! M_i = scale · (G ∗ R)(Q_i) + background
//! ```
//!
//! The cost is a weighted chi-square, by default in log space where a point
//! contributes `((ln R_i − ln M_i) · R_i / dR_i)²` (the first-order
//! propagation of `dR_i` through the logarithm). Reflectivity spans many
//! decades, so this keeps the low-Q plateau from dominating the fit.
//!
//! Evaluation is a pure function of the vector: the objective holds only
//! read-only references and precomputed tables and is shared across worker
//! threads.

use crate::domain::{ConvergenceStatus, CostSpace, Dataset, FitSettings, Resolution, ResidualPoint};
use crate::error::{FitError, FitResultOf, PrecisionWarning};
use crate::fit::params::ParameterSpace;
use crate::models::{reflectivity, ConvolutionPlan, EngineOptions};

/// Cost reported for vectors outside the model domain (out of bounds or an
/// unphysical stack). Large but finite so population methods keep going.
pub const PENALTY_COST: f64 = 1e100;

/// Black-box cost over a bounded box, as seen by the optimizers.
pub trait CostFunction: Sync {
    fn dimension(&self) -> usize;

    /// `(lower, upper)` per dimension; all finite.
    fn bounds(&self) -> Vec<(f64, f64)>;

    /// Cost of a vector. Domain violations return [`PENALTY_COST`]; any other
    /// non-finite result is a numerical failure the caller must surface.
    fn cost(&self, x: &[f64]) -> f64;
}

/// Best point found by a minimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub status: ConvergenceStatus,
}

/// Settings that shape the cost, independent of the search method.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectiveOptions {
    pub cost_space: CostSpace,
    pub engine: EngineOptions,
    pub kernel_points: usize,
}

impl Default for ObjectiveOptions {
    fn default() -> Self {
        Self {
            cost_space: CostSpace::Log,
            engine: EngineOptions::default(),
            kernel_points: 17,
        }
    }
}

impl ObjectiveOptions {
    pub fn from_settings(settings: &FitSettings) -> Self {
        Self {
            cost_space: settings.cost_space,
            engine: EngineOptions {
                subdivisions: settings.subdivisions,
                microslice: settings.microslice,
            },
            kernel_points: settings.kernel_points,
        }
    }
}

/// Chi-square objective bound to one dataset and parameter space.
#[derive(Debug, Clone)]
pub struct Objective<'a> {
    dataset: &'a Dataset,
    space: &'a ParameterSpace,
    plan: ConvolutionPlan,
    options: ObjectiveOptions,
    /// Indices of the points entering the cost.
    used: Vec<usize>,
    warnings: Vec<PrecisionWarning>,
}

impl<'a> Objective<'a> {
    pub fn new(
        dataset: &'a Dataset,
        space: &'a ParameterSpace,
        resolution: &Resolution,
        options: ObjectiveOptions,
    ) -> FitResultOf<Self> {
        let q = dataset.q();
        let dq = dataset.dq();
        let plan = ConvolutionPlan::for_resolution(resolution, &q, dq.as_deref(), options.kernel_points)?;
        let mut warnings = plan.warnings().to_vec();

        let used: Vec<usize> = match options.cost_space {
            CostSpace::Linear => (0..dataset.len()).collect(),
            CostSpace::Log => {
                let mut used = Vec::with_capacity(dataset.len());
                for (i, p) in dataset.points().iter().enumerate() {
                    if p.r > 0.0 {
                        used.push(i);
                    } else {
                        warnings.push(PrecisionWarning::at(
                            i,
                            p.q,
                            "non-positive reflectivity excluded from the log-space cost",
                        ));
                    }
                }
                used
            }
        };
        if used.is_empty() {
            return Err(FitError::invalid_dataset(
                "no point has R > 0, the log-space cost is undefined",
            ));
        }

        for w in &warnings {
            tracing::warn!("{w}");
        }

        Ok(Self {
            dataset,
            space,
            plan,
            options,
            used,
            warnings,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        self.dataset
    }

    pub fn space(&self) -> &ParameterSpace {
        self.space
    }

    pub fn options(&self) -> &ObjectiveOptions {
        &self.options
    }

    /// Points that contribute to the cost.
    pub fn n_points(&self) -> usize {
        self.used.len()
    }

    pub fn warnings(&self) -> &[PrecisionWarning] {
        &self.warnings
    }

    /// Model reflectivity at every measured point.
    pub fn model_curve(&self, v: &[f64]) -> FitResultOf<Vec<f64>> {
        let model = self.space.model_from_vector(v)?;
        let fine = reflectivity(&model.stack, self.plan.fine_q(), &self.options.engine)?;
        let smeared = self.plan.apply(&fine)?;
        Ok(smeared
            .into_iter()
            .map(|r| model.scale * r + model.background)
            .collect())
    }

    /// Strict cost: domain violations (bounds, unphysical stack, a model value
    /// with no logarithm in log space) are returned as errors.
    pub fn evaluate(&self, v: &[f64]) -> FitResultOf<f64> {
        let curve = self.model_curve(v)?;
        let points = self.dataset.points();
        let chi2: f64 = match self.options.cost_space {
            CostSpace::Log => {
                let mut chi2 = 0.0;
                for &i in &self.used {
                    let p = &points[i];
                    let m = curve[i];
                    if m <= 0.0 {
                        return Err(FitError::NonPositiveModel { q: p.q, value: m });
                    }
                    let d = (p.r.ln() - m.ln()) * p.r / p.dr;
                    chi2 += d * d;
                }
                chi2
            }
            CostSpace::Linear => self
                .used
                .iter()
                .map(|&i| {
                    let p = &points[i];
                    let d = (p.r - curve[i]) / p.dr;
                    d * d
                })
                .sum(),
        };
        Ok(chi2)
    }

    /// `ln L = −χ²/2` up to a constant.
    pub fn log_likelihood(&self, v: &[f64]) -> FitResultOf<f64> {
        Ok(-0.5 * self.evaluate(v)?)
    }

    /// Observed vs model at every measured point (including points excluded
    /// from a log-space cost).
    pub fn residuals(&self, v: &[f64]) -> FitResultOf<Vec<ResidualPoint>> {
        let curve = self.model_curve(v)?;
        Ok(self
            .dataset
            .points()
            .iter()
            .zip(curve)
            .map(|(p, m)| ResidualPoint {
                q: p.q,
                r_obs: p.r,
                dr: p.dr,
                r_fit: m,
                normalized: (p.r - m) / p.dr,
            })
            .collect())
    }

    /// χ² per degree of freedom, `N − n_free` floored at 1.
    pub fn reduced_chi2(&self, chi2: f64) -> f64 {
        let dof = self.n_points().saturating_sub(self.space.dimension()).max(1);
        chi2 / dof as f64
    }
}

impl CostFunction for Objective<'_> {
    fn dimension(&self) -> usize {
        self.space.dimension()
    }

    fn bounds(&self) -> Vec<(f64, f64)> {
        self.space.bounds()
    }

    fn cost(&self, x: &[f64]) -> f64 {
        match self.evaluate(x) {
            Ok(c) => c,
            Err(e) if e.is_recoverable() => PENALTY_COST,
            Err(e) => {
                tracing::debug!(error = %e, "cost evaluation failed");
                f64::NAN
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DataPoint, ParamConfig};
    use crate::fit::testutil::{film_config, noiseless};

    fn space() -> ParameterSpace {
        ParameterSpace::from_config(&film_config(
            ParamConfig::free(100.0, 50.0, 150.0),
            ParamConfig::free(4.0e-6, 1.0e-6, 7.0e-6),
        ))
        .unwrap()
    }

    #[test]
    fn cost_is_minimal_at_generating_parameters() {
        let space = space();
        let data = noiseless(&space, 80);
        let obj = Objective::new(&data, &space, &Resolution::None, ObjectiveOptions::default()).unwrap();

        let truth = obj.evaluate(&[100.0, 4.0e-6]).unwrap();
        assert!(truth < 1e-18, "cost at truth = {truth:e}");
        for v in [[99.0, 4.0e-6], [101.0, 4.0e-6], [100.0, 3.9e-6], [100.0, 4.1e-6]] {
            assert!(obj.evaluate(&v).unwrap() > truth + 1.0);
        }
        assert_eq!(obj.log_likelihood(&[100.0, 4.0e-6]).unwrap(), -0.5 * truth);
    }

    #[test]
    fn domain_violations_become_the_penalty() {
        let space = space();
        let data = noiseless(&space, 40);
        let obj = Objective::new(&data, &space, &Resolution::None, ObjectiveOptions::default()).unwrap();

        assert!(matches!(obj.evaluate(&[200.0, 4.0e-6]), Err(FitError::OutOfBounds { .. })));
        assert_eq!(obj.cost(&[200.0, 4.0e-6]), PENALTY_COST);
        assert!(obj.cost(&[1.0]).is_nan());
    }

    #[test]
    fn log_space_excludes_non_positive_points() {
        let space = space();
        let data = noiseless(&space, 20);
        let mut points = data.points().to_vec();
        points[5].r = 0.0;
        points[9].r = -1e-7;
        let data = Dataset::new(points).unwrap();

        let obj = Objective::new(&data, &space, &Resolution::None, ObjectiveOptions::default()).unwrap();
        assert_eq!(obj.n_points(), 18);
        let flagged: Vec<usize> = obj.warnings().iter().filter_map(|w| w.index).collect();
        assert_eq!(flagged, vec![5, 9]);
        assert!(obj.evaluate(&[100.0, 4.0e-6]).unwrap().is_finite());

        let linear = ObjectiveOptions {
            cost_space: CostSpace::Linear,
            ..ObjectiveOptions::default()
        };
        let obj = Objective::new(&data, &space, &Resolution::None, linear).unwrap();
        assert_eq!(obj.n_points(), 20);
        assert!(obj.warnings().is_empty());
    }

    #[test]
    fn non_positive_model_in_log_space_is_penalized() {
        let mut cfg = film_config(
            ParamConfig::free(100.0, 50.0, 150.0),
            ParamConfig::free(4.0e-6, 1.0e-6, 7.0e-6),
        );
        cfg.background = ParamConfig::free(0.0, -1e-5, 1e-5);
        let space = ParameterSpace::from_config(&cfg).unwrap();
        let data = noiseless(&space, 40);
        let obj = Objective::new(&data, &space, &Resolution::None, ObjectiveOptions::default()).unwrap();

        let below_zero = [100.0, 4.0e-6, -1e-5];
        assert!(matches!(obj.evaluate(&below_zero), Err(FitError::NonPositiveModel { .. })));
        assert_eq!(obj.cost(&below_zero), PENALTY_COST);
        assert!(obj.cost(&[100.0, 4.0e-6, 0.0]) < 1e-18);

        let linear = ObjectiveOptions {
            cost_space: CostSpace::Linear,
            ..ObjectiveOptions::default()
        };
        let obj = Objective::new(&data, &space, &Resolution::None, linear).unwrap();
        assert!(obj.evaluate(&below_zero).unwrap().is_finite());
    }

    #[test]
    fn all_negative_data_cannot_be_fitted_in_log_space() {
        let space = space();
        let data = Dataset::new(vec![DataPoint {
            q: 0.05,
            r: -1.0,
            dr: 0.1,
            dq: None,
        }])
        .unwrap();
        let err = Objective::new(&data, &space, &Resolution::None, ObjectiveOptions::default()).unwrap_err();
        assert!(matches!(err, FitError::InvalidDataset { .. }));
    }

    #[test]
    fn residuals_are_normalized_by_uncertainty() {
        let space = space();
        let data = noiseless(&space, 30);
        let obj = Objective::new(&data, &space, &Resolution::None, ObjectiveOptions::default()).unwrap();
        let res = obj.residuals(&[105.0, 4.0e-6]).unwrap();
        assert_eq!(res.len(), 30);
        for r in &res {
            approx::assert_relative_eq!(r.normalized, (r.r_obs - r.r_fit) / r.dr);
        }
    }

    #[test]
    fn resolution_setup_errors_surface_at_construction() {
        let space = space();
        let data = noiseless(&space, 30);
        let err = Objective::new(&data, &space, &Resolution::Pointwise, ObjectiveOptions::default()).unwrap_err();
        assert!(matches!(err, FitError::InvalidResolution { .. }));
    }

    #[test]
    fn reduced_chi2_uses_degrees_of_freedom() {
        let space = space();
        let data = noiseless(&space, 12);
        let obj = Objective::new(&data, &space, &Resolution::None, ObjectiveOptions::default()).unwrap();
        assert_eq!(obj.reduced_chi2(50.0), 5.0);
    }

    #[test]
    fn objective_is_shareable_across_threads() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<Objective<'static>>();
    }
}
