//! Fit exports.
//!
//! - the report JSON: the fit result wrapped with the model it came from and
//!   run metadata, readable again by `rose plot`
//! - a residual CSV that is easy to consume in spreadsheets or scripts

use std::fs::File;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{FitResult, ModelConfig, ResidualPoint};
use crate::error::AppError;

/// Portable record of one fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub tool: String,
    pub version: String,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
    pub model: ModelConfig,
    pub result: FitResult,
}

impl FitReport {
    pub fn new(model: ModelConfig, result: FitResult, data_file: Option<&Path>) -> Self {
        Self {
            tool: "rose".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created: Utc::now(),
            data_file: data_file.map(|p| p.display().to_string()),
            model,
            result,
        }
    }
}

/// Write a report JSON file.
pub fn write_report_json(path: &Path, report: &FitReport) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create report JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(2, format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

/// Read a report JSON file.
pub fn read_report_json(path: &Path) -> Result<FitReport, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open report JSON '{}': {e}", path.display())))?;
    let report: FitReport =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid report JSON: {e}")))?;
    Ok(report)
}

/// Write per-point residuals to a CSV file.
pub fn write_residuals_csv(path: &Path, residuals: &[ResidualPoint]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writeln!(file, "q,r_obs,dr,r_fit,normalized_residual")
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for r in residuals {
        writeln!(
            file,
            "{:.8},{:.8e},{:.8e},{:.8e},{:.6}",
            r.q, r.r_obs, r.dr, r.r_fit, r.normalized
        )
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConvergenceStatus, Layer, Method, Sld, Stack};

    fn result() -> FitResult {
        FitResult {
            method: Method::NelderMead,
            status: ConvergenceStatus::Converged,
            seed: 1,
            iterations: 10,
            evaluations: 30,
            cost: 12.5,
            reduced_chi2: 1.1,
            n_points: 2,
            n_free: 0,
            stack: Stack::new(vec![Layer::medium(Sld::real(0.0), 0.0), Layer::medium(Sld::real(2.07e-6), 0.0)])
                .unwrap(),
            scale: 1.0,
            background: 0.0,
            best_vector: Vec::new(),
            parameters: Vec::new(),
            residuals: vec![
                ResidualPoint {
                    q: 0.01,
                    r_obs: 0.9,
                    dr: 0.01,
                    r_fit: 0.95,
                    normalized: -5.0,
                },
                ResidualPoint {
                    q: 0.02,
                    r_obs: 0.1,
                    dr: 0.01,
                    r_fit: 0.1,
                    normalized: 0.0,
                },
            ],
            sld_profile: Vec::new(),
            sampling: None,
            warnings: Vec::new(),
        }
    }

    fn model() -> ModelConfig {
        serde_json::from_str(r#"{"layers": [{"sld": 0.0}, {"sld": 2.07e-6}]}"#).unwrap()
    }

    #[test]
    fn report_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        let report = FitReport::new(model(), result(), Some(Path::new("data.dat")));
        write_report_json(&path, &report).unwrap();
        let back = read_report_json(&path).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.tool, "rose");
    }

    #[test]
    fn residual_csv_has_one_row_per_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("residuals.csv");
        write_residuals_csv(&path, &result().residuals).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("q,r_obs"));
        assert!(lines[1].ends_with("-5.000000"));
    }
}
