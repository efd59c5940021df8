//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{CostSpace, Dataset, FitResult, ModelConfig, ParameterEstimate, ParameterRole, ResidualPoint};
use crate::report::{chi2_p_value, Outliers};

/// Format the full run summary (dataset, fit diagnostics, parameters).
pub fn format_run_summary(dataset: &Dataset, config: &ModelConfig, result: &FitResult) -> String {
    let mut out = String::new();

    out.push_str("=== rose - reflectivity fit ===\n");
    let (q_min, q_max) = dataset.q_range();
    out.push_str(&format!(
        "Data: n={} | Q=[{q_min:.4}, {q_max:.4}] 1/A | cost points={}\n",
        dataset.len(),
        result.n_points
    ));
    out.push_str(&format!(
        "Method: {} | seed={} | status: {}\n",
        result.method.display_name(),
        result.seed,
        result.status.display_name()
    ));
    out.push_str(&format!(
        "Iterations: {} | evaluations: {}\n",
        result.iterations, result.evaluations
    ));

    let space = match config.fit.cost_space {
        CostSpace::Log => "log",
        CostSpace::Linear => "linear",
    };
    out.push_str(&format!(
        "Chi2 ({space}) = {:.4} | reduced = {:.4} | free = {}\n",
        result.cost, result.reduced_chi2, result.n_free
    ));
    let stack = &result.stack;
    out.push_str(&format!(
        "Stack: {} layer(s), {} A | fronting SLD={} | backing SLD={} | scale={} | background={}\n",
        stack.interior().len(),
        fmt_num(stack.total_thickness()),
        fmt_num(stack.fronting().sld.real),
        fmt_num(stack.backing().sld.real),
        fmt_num(result.scale),
        fmt_num(result.background)
    ));
    if config.fit.cost_space == CostSpace::Linear {
        if let Some(p) = chi2_p_value(result) {
            out.push_str(&format!("P(chi2 >= observed) = {p:.4}\n"));
        }
    }
    if let Some(s) = &result.sampling {
        out.push_str(&format!(
            "Sampling: walkers={} steps={} burn={} thin={} samples={} acceptance={:.3} max R-hat={}\n",
            s.walkers,
            s.steps,
            s.burn,
            s.thin,
            s.samples,
            s.acceptance_fraction,
            s.max_r_hat.map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}"))
        ));
    }

    out.push_str("\nParameters:\n");
    out.push_str(&format_parameters(&result.parameters));

    if !result.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &result.warnings {
            out.push_str(&format!("- {w}\n"));
        }
    }
    out.push('\n');

    out
}

/// Parameter table: value, uncertainty, bounds and role.
pub fn format_parameters(params: &[ParameterEstimate]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<24} {:>13} {:>11} {:>13} {:>13} {:<6}\n",
            "name", "value", "+/-", "min", "max", "role"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<24} {:-<13} {:-<11} {:-<13} {:-<13} {:-<6}\n", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for p in params {
        let role = match p.role {
            ParameterRole::Free => "free",
            ParameterRole::Fixed => "fixed",
            ParameterRole::Tied => "tied",
        };
        out.push_str(
            format!(
                "{:<24} {:>13} {:>11} {:>13} {:>13} {:<6}\n",
                truncate(&p.name, 24),
                fmt_num(p.value),
                p.uncertainty.map_or_else(|| "-".to_string(), fmt_num),
                p.lower.map_or_else(|| "-".to_string(), fmt_num),
                p.upper.map_or_else(|| "-".to_string(), fmt_num),
                role,
            )
            .trim_end(),
        );
        out.push('\n');

        if let Some(post) = &p.posterior {
            out.push_str(&format!(
                "{:<24} median={} 68%=[{}, {}] R-hat={}\n",
                "",
                fmt_num(post.median),
                fmt_num(post.lower),
                fmt_num(post.upper),
                post.r_hat.map_or_else(|| "n/a".to_string(), |r| format!("{r:.3}"))
            ));
        }
    }

    out
}

/// Format the outlier tables.
pub fn format_outliers(outliers: &Outliers) -> String {
    let mut out = String::new();

    out.push_str("Largest positive residuals (data above model):\n");
    out.push_str(&format_table(&outliers.high));
    out.push('\n');

    out.push_str("Largest negative residuals (data below model):\n");
    out.push_str(&format_table(&outliers.low));

    out
}

fn format_table(rows: &[ResidualPoint]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:>10} {:>12} {:>12} {:>12} {:>10}\n", "Q", "R_obs", "R_fit", "dR", "z").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<10} {:-<12} {:-<12} {:-<12} {:-<10}\n", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in rows {
        out.push_str(
            format!(
                "{:>10.5} {:>12.4e} {:>12.4e} {:>12.4e} {:>10.3}\n",
                r.q, r.r_obs, r.r_fit, r.dr, r.normalized
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Fixed notation for ordinary magnitudes, scientific for SLDs and backgrounds.
fn fmt_num(v: f64) -> String {
    let a = v.abs();
    if v == 0.0 || (1e-3..1e5).contains(&a) {
        format!("{v:.4}")
    } else {
        format!("{v:.4e}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConvergenceStatus, DataPoint, Layer, Method, Sld, Stack};

    fn estimate(name: &str, value: f64, uncertainty: Option<f64>, role: ParameterRole) -> ParameterEstimate {
        ParameterEstimate {
            name: name.to_string(),
            role,
            value,
            uncertainty,
            lower: Some(0.0),
            upper: None,
            posterior: None,
        }
    }

    #[test]
    fn numbers_switch_to_scientific_for_small_values() {
        assert_eq!(fmt_num(100.0), "100.0000");
        assert_eq!(fmt_num(4.0e-6), "4.0000e-6");
        assert_eq!(fmt_num(0.0), "0.0000");
    }

    #[test]
    fn parameter_table_marks_missing_values() {
        let table = format_parameters(&[
            estimate("film.thickness", 100.2, Some(0.8), ParameterRole::Free),
            estimate("film.roughness", 3.0, None, ParameterRole::Tied),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains("100.2000") && lines[2].contains("0.8000") && lines[2].ends_with("free"));
        assert!(lines[3].contains(" - ") && lines[3].ends_with("tied"));
    }

    #[test]
    fn run_summary_describes_the_fitted_stack() {
        let dataset = Dataset::new(vec![
            DataPoint {
                q: 0.01,
                r: 0.9,
                dr: 0.01,
                dq: None,
            },
            DataPoint {
                q: 0.2,
                r: 1e-6,
                dr: 1e-7,
                dq: None,
            },
        ])
        .unwrap();
        let stack = Stack::new(vec![
            Layer::medium(Sld::real(0.0), 3.0),
            Layer::new(100.0, Sld::real(4.0e-6), 3.0),
            Layer::new(15.0, Sld::real(3.47e-6), 2.0),
            Layer::medium(Sld::real(2.07e-6), 0.0),
        ])
        .unwrap();
        let result = FitResult {
            method: Method::NelderMead,
            status: ConvergenceStatus::Converged,
            seed: 7,
            iterations: 120,
            evaluations: 260,
            cost: 3.5,
            reduced_chi2: 1.75,
            n_points: 2,
            n_free: 0,
            stack,
            scale: 1.0,
            background: 1e-7,
            best_vector: Vec::new(),
            parameters: vec![estimate("film.thickness", 100.0, Some(0.5), ParameterRole::Free)],
            residuals: Vec::new(),
            sld_profile: Vec::new(),
            sampling: None,
            warnings: Vec::new(),
        };
        let config: ModelConfig = serde_json::from_str(r#"{"layers": [{"sld": 0.0}, {"sld": 2.07e-6}]}"#).unwrap();

        let summary = format_run_summary(&dataset, &config, &result);
        let stack_line = summary.lines().find(|l| l.starts_with("Stack:")).unwrap();
        assert_eq!(
            stack_line,
            "Stack: 2 layer(s), 115.0000 A | fronting SLD=0.0000 | backing SLD=2.0700e-6 | scale=1.0000 | background=1.0000e-7"
        );
        assert!(summary.contains("Method: Nelder-Mead | seed=7"), "{summary}");
        assert!(summary.contains("film.thickness"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
